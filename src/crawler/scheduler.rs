//! Batch scheduler for walking the source list
//!
//! This module handles:
//! - Resolving the working index range
//! - Partitioning pending indices into fixed-size windows
//! - Driving fetch, extract and validate for each item
//! - Applying the retry policy at window boundaries
//! - Flushing output and persisting the checkpoint after every pass
//! - Pacing requests and honoring the stop signal

use crate::config::{FetchConfig, RunConfig};
use crate::crawler::fetcher::{FetchError, Fetcher};
use crate::extract::{extract, ExtractError, SelectorRegistry};
use crate::input::CrawlTarget;
use crate::output::ResultSink;
use crate::record::{CrawlRecord, RecordStatus, RecordValidator};
use crate::state::{Checkpoint, ItemState};
use crate::storage::CheckpointStore;
use crate::Result;
use rand::Rng;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// How a scheduler run ended (fatal errors are returned as `Err`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerOutcome {
    /// Every index in range is done or skipped
    Completed,

    /// The stop token was cancelled; progress up to the last item is persisted
    Interrupted,
}

/// Why a single attempt did not produce an accepted record
#[derive(Debug, Error)]
enum ItemFailure {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("{0}")]
    Extract(#[from] ExtractError),

    #[error("record is {0}")]
    Rejected(RecordStatus),
}

/// Random pauses between items and between windows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pacing {
    /// `[min, max]` milliseconds between two items
    pub item_delay_ms: [u64; 2],

    /// `[min, max]` milliseconds between two windows
    pub batch_delay_ms: [u64; 2],
}

impl Pacing {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            item_delay_ms: config.item_delay_ms,
            batch_delay_ms: config.batch_delay_ms,
        }
    }

    /// Draws a delay from a `[min, max]` range
    fn draw(range: [u64; 2]) -> Option<Duration> {
        let [min, max] = range;
        if max == 0 || min > max {
            return None;
        }
        let millis = rand::rng().random_range(min..=max);
        Some(Duration::from_millis(millis))
    }

    async fn item_pause(&self, stop: &CancellationToken) {
        if let Some(delay) = Self::draw(self.item_delay_ms) {
            Self::sleep(delay, stop).await;
        }
    }

    async fn batch_pause(&self, stop: &CancellationToken) {
        if let Some(delay) = Self::draw(self.batch_delay_ms) {
            tracing::debug!("Pausing {:?} before next batch", delay);
            Self::sleep(delay, stop).await;
        }
    }

    /// Sleeps for `delay`, returning early once a stop is requested
    async fn sleep(delay: Duration, stop: &CancellationToken) {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = stop.cancelled() => {}
        }
    }
}

/// Resolves the working index range over a source list of `len` targets
///
/// An explicit end past the list is clamped to the last index. Returns `None`
/// when the range selects nothing.
pub fn resolve_range(
    len: usize,
    start: Option<usize>,
    end: Option<usize>,
) -> Option<RangeInclusive<usize>> {
    let last = len.checked_sub(1)?;
    let start = start.unwrap_or(0);
    let end = end.map_or(last, |e| e.min(last));
    (start <= end).then_some(start..=end)
}

/// Drives the crawl over a range of targets
///
/// The scheduler is the only writer of item states. Items run one at a time in
/// ascending index order; per-item failures become state transitions and only
/// checkpoint/output failures (or a state machine violation) end the run with
/// an error.
pub struct BatchScheduler {
    fetcher: Arc<dyn Fetcher>,
    registry: SelectorRegistry,
    validator: RecordValidator,
    config: RunConfig,
    fetch_timeout: Duration,
    pacing: Pacing,
    stop: CancellationToken,
}

impl BatchScheduler {
    /// Creates a scheduler
    ///
    /// # Arguments
    ///
    /// * `fetcher` - The fetch capability
    /// * `registry` - Field rules; also supplies the validator's field lists
    /// * `config` - The effective run configuration
    pub fn new(fetcher: Arc<dyn Fetcher>, registry: SelectorRegistry, config: RunConfig) -> Self {
        let validator = RecordValidator::from_registry(&registry, config.validate_enabled);
        Self {
            fetcher,
            registry,
            validator,
            config,
            fetch_timeout: Duration::from_secs(30),
            pacing: Pacing::default(),
            stop: CancellationToken::new(),
        }
    }

    /// Sets the per-fetch timeout
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Shares an externally owned stop token
    pub fn with_stop_token(mut self, stop: CancellationToken) -> Self {
        self.stop = stop;
        self
    }

    /// Token that, once cancelled, stops the run at the next item boundary
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    fn stop_requested(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Runs the crawl over `targets`
    ///
    /// # Arguments
    ///
    /// * `targets` - The full source list; `targets[i].index` must equal `i`
    /// * `checkpoint` - Progress so far; updated in place
    /// * `store` - Where the checkpoint is persisted after every pass
    /// * `sink` - Where accepted records go
    ///
    /// # Returns
    ///
    /// * `Ok(SchedulerOutcome)` - The run completed or was stopped
    /// * `Err(HarvestError)` - A fatal error; nothing after the last
    ///   successful save is persisted
    pub async fn run(
        &self,
        targets: &[CrawlTarget],
        checkpoint: &mut Checkpoint,
        store: &mut dyn CheckpointStore,
        sink: &mut dyn ResultSink,
    ) -> Result<SchedulerOutcome> {
        let Some(range) = resolve_range(
            targets.len(),
            self.config.start_index,
            self.config.end_index,
        ) else {
            tracing::warn!(
                "Index range selects nothing ({} targets, start {:?}, end {:?})",
                targets.len(),
                self.config.start_index,
                self.config.end_index
            );
            return Ok(SchedulerOutcome::Completed);
        };

        checkpoint.recover_interrupted();

        // Failures left by an earlier run cross the retry boundary first
        let carried: Vec<usize> = checkpoint
            .failed_in(&range)
            .into_iter()
            .map(|(index, _)| index)
            .collect();
        self.retry_boundary(checkpoint, &carried)?;

        let remaining: Vec<usize> = range
            .clone()
            .filter(|index| !checkpoint.is_settled(*index))
            .collect();

        tracing::info!(
            "Crawling {} of {} item(s) in range {}..={} (batch size {})",
            remaining.len(),
            range.clone().count(),
            range.start(),
            range.end(),
            self.config.batch_size
        );
        if !self.validator.is_enabled() {
            tracing::info!("Record validation disabled, every readable page is accepted");
        }

        if remaining.is_empty() {
            self.persist(checkpoint, store, sink)?;
            return Ok(SchedulerOutcome::Completed);
        }

        let windows: Vec<&[usize]> = remaining.chunks(self.config.batch_size).collect();
        for (number, window) in windows.iter().enumerate() {
            if number > 0 {
                self.pacing.batch_pause(&self.stop).await;
            }

            tracing::info!(
                "Batch {}/{}: indices {}..={}",
                number + 1,
                windows.len(),
                window[0],
                window[window.len() - 1]
            );

            if self.run_window(window, targets, checkpoint, store, sink).await?
                == SchedulerOutcome::Interrupted
            {
                return Ok(SchedulerOutcome::Interrupted);
            }
        }

        Ok(SchedulerOutcome::Completed)
    }

    /// Processes one window until none of its items is retryable
    async fn run_window(
        &self,
        window: &[usize],
        targets: &[CrawlTarget],
        checkpoint: &mut Checkpoint,
        store: &mut dyn CheckpointStore,
        sink: &mut dyn ResultSink,
    ) -> Result<SchedulerOutcome> {
        let mut queue = window.to_vec();
        let mut pass = 1;

        loop {
            for (position, index) in queue.iter().enumerate() {
                if position > 0 {
                    self.pacing.item_pause(&self.stop).await;
                }
                if self.stop_requested() {
                    tracing::warn!("Stop requested, halting before index {}", index);
                    self.persist(checkpoint, store, sink)?;
                    return Ok(SchedulerOutcome::Interrupted);
                }
                self.process_item(&targets[*index], checkpoint, sink).await?;
            }

            let failed: Vec<usize> = queue
                .iter()
                .copied()
                .filter(|index| matches!(checkpoint.state(*index), ItemState::Failed { .. }))
                .collect();
            let requeued = self.retry_boundary(checkpoint, &failed)?;

            self.persist(checkpoint, store, sink)?;

            if requeued.is_empty() {
                return Ok(SchedulerOutcome::Completed);
            }

            pass += 1;
            tracing::warn!(
                "Retrying {} item(s), pass {}: {:?}",
                requeued.len(),
                pass,
                requeued
            );
            queue = requeued;
        }
    }

    /// Requeues failed items below the attempt limit and skips the rest
    ///
    /// Returns the requeued indices.
    fn retry_boundary(&self, checkpoint: &mut Checkpoint, failed: &[usize]) -> Result<Vec<usize>> {
        let max_attempts = self.config.effective_max_attempts();
        let mut requeued = Vec::new();

        for &index in failed {
            let attempts = checkpoint.attempts(index);
            if attempts < max_attempts {
                checkpoint.mark(index, ItemState::Pending)?;
                requeued.push(index);
            } else {
                tracing::warn!(
                    "Skipping index {} after {} attempt(s)",
                    index,
                    attempts
                );
                checkpoint.mark(index, ItemState::Skipped)?;
            }
        }

        Ok(requeued)
    }

    /// Runs one attempt for a target and records its outcome
    async fn process_item(
        &self,
        target: &CrawlTarget,
        checkpoint: &mut Checkpoint,
        sink: &mut dyn ResultSink,
    ) -> Result<()> {
        let index = target.index;
        checkpoint.mark(index, ItemState::InProgress)?;
        let attempt = checkpoint.attempts(index) + 1;
        tracing::debug!("Index {} attempt {}: {}", index, attempt, target.url);

        match self.attempt(target).await {
            Ok(record) => {
                tracing::debug!("Index {} done ({})", index, record.status);
                sink.append(record)?;
                checkpoint.mark(index, ItemState::Done)?;
            }
            Err(failure) if self.stop_requested() => {
                // The attempt may have been cut short by the stop; it does not count
                tracing::debug!("Index {} abandoned on stop: {}", index, failure);
                checkpoint.mark(index, ItemState::Pending)?;
            }
            Err(failure) => {
                tracing::warn!(
                    "Index {} attempt {} failed: {}",
                    index,
                    attempt,
                    failure
                );
                checkpoint.mark(index, ItemState::Failed { attempts: attempt })?;
            }
        }

        Ok(())
    }

    /// Fetch, extract and validate one target
    async fn attempt(&self, target: &CrawlTarget) -> std::result::Result<CrawlRecord, ItemFailure> {
        let page = match tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(target)).await {
            Ok(result) => result?,
            Err(_) => return Err(FetchError::Timeout.into()),
        };

        let fields = extract(&page, &self.registry)?;

        let status = self.validator.validate(&fields);
        let accepted = match status {
            RecordStatus::Valid => true,
            RecordStatus::Partial => self.config.accept_partial,
            RecordStatus::Invalid => false,
        };
        if !accepted {
            return Err(ItemFailure::Rejected(status));
        }

        Ok(CrawlRecord::new(target, fields, status))
    }

    /// Flushes the sink, then saves the checkpoint
    ///
    /// The order keeps the checkpoint from ever claiming `Done` for a record
    /// that is not yet in the output.
    fn persist(
        &self,
        checkpoint: &mut Checkpoint,
        store: &mut dyn CheckpointStore,
        sink: &mut dyn ResultSink,
    ) -> Result<()> {
        checkpoint.output_offset = sink.flush()?;
        store.save(checkpoint)?;
        tracing::info!(
            "Checkpoint saved to {} (output rows {})",
            store.location(),
            checkpoint.output_offset
        );
        Ok(())
    }
}
