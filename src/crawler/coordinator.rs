//! Run controller - top-level crawl orchestration
//!
//! This module ties the pieces of a run together:
//! - Taking the run lock on the checkpoint
//! - Loading targets, building the registry and the output sink
//! - Loading (or clearing) the checkpoint and checking it belongs to the input
//! - Invoking the batch scheduler
//! - Summarizing the result

use crate::config::{Config, RunConfig};
use crate::crawler::fetcher::{Fetcher, HttpFetcher};
use crate::crawler::scheduler::{resolve_range, BatchScheduler, Pacing, SchedulerOutcome};
use crate::extract::SelectorRegistry;
use crate::input::{hash_input, load_targets};
use crate::output::{CsvSink, RunSummary};
use crate::state::{Checkpoint, InputFingerprint};
use crate::storage::{CheckpointStore, JsonCheckpointStore, RunLock};
use crate::{HarvestError, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Switches that change how a run treats existing state
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Delete the checkpoint and output before starting
    pub fresh: bool,

    /// Remove a leftover run lock before acquiring it
    pub break_lock: bool,
}

/// How a run finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every index in range ended done
    Complete,

    /// Every index in range ended done or skipped, at least one skipped
    CompleteWithSkipped,

    /// Stopped by the operator before finishing
    Interrupted,
}

/// Result of a run that did not abort
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,

    /// `None` when the resolved range selected no targets
    pub summary: Option<RunSummary>,
}

impl RunOutcome {
    /// Process exit code for this outcome
    ///
    /// Fatal errors never produce a `RunOutcome`; the binary maps them to 1.
    pub fn exit_code(&self) -> u8 {
        match self.status {
            RunStatus::Complete => 0,
            RunStatus::CompleteWithSkipped => 2,
            RunStatus::Interrupted => 130,
        }
    }
}

/// Main run controller structure
pub struct RunController {
    config: Config,
    run: RunConfig,
    config_hash: Option<String>,
    fetcher: Arc<dyn Fetcher>,
    options: RunOptions,
    stop: CancellationToken,
}

impl RunController {
    /// Creates a controller fetching over HTTP
    ///
    /// # Arguments
    ///
    /// * `config` - The parsed configuration file
    /// * `run` - Effective run settings (file values with overrides applied)
    ///
    /// # Returns
    ///
    /// * `Ok(RunController)` - Ready to run
    /// * `Err(HarvestError)` - The HTTP client could not be built
    pub fn new(config: Config, run: RunConfig) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(&config.fetch)?);
        Ok(Self::with_fetcher(config, run, fetcher))
    }

    /// Creates a controller using a caller-supplied fetcher
    pub fn with_fetcher(config: Config, run: RunConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            config,
            run,
            config_hash: None,
            fetcher,
            options: RunOptions::default(),
            stop: CancellationToken::new(),
        }
    }

    /// Records the hash of the config file, stored in the checkpoint
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Token that stops the run at the next item boundary once cancelled
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Runs the crawl to completion, interruption or a fatal error
    ///
    /// # Returns
    ///
    /// * `Ok(RunOutcome)` - The run completed or was stopped
    /// * `Err(HarvestError)` - Startup failed, or the run aborted; an abort
    ///   is reported as `HarvestError::Aborted` naming the last checkpoint
    ///   that reached disk
    pub async fn run(&self) -> Result<RunOutcome> {
        let checkpoint_path = &self.run.checkpoint_path;

        if self.options.break_lock {
            RunLock::break_stale(checkpoint_path)?;
        }
        let _lock = RunLock::acquire(checkpoint_path)?;

        let registry = SelectorRegistry::from_config(&self.config.fields)?;
        let targets = load_targets(
            &self.run.input_path,
            &self.config.input.url_column,
            &self.config.input.carry_columns,
        )?;
        let input = InputFingerprint {
            path: self.run.input_path.display().to_string(),
            sha256: hash_input(&self.run.input_path)?,
        };

        let mut store = JsonCheckpointStore::new(checkpoint_path);
        let mut sink = CsvSink::new(
            &self.run.output_path,
            self.config.input.carry_columns.clone(),
            registry.field_names().map(str::to_string).collect(),
        );

        if self.options.fresh {
            tracing::info!("Starting fresh: removing checkpoint and output");
            store.clear()?;
            sink.clear()?;
        }

        let mut checkpoint = store.load()?;
        if let (Some(previous), Some(current)) = (&checkpoint.config_hash, &self.config_hash) {
            if previous != current {
                tracing::warn!(
                    "Config changed since the checkpoint was written (hash {} -> {})",
                    previous,
                    current
                );
            }
        }
        if self.config_hash.is_some() {
            checkpoint.config_hash = self.config_hash.clone();
        }
        check_input(&checkpoint, &input, &store)?;
        checkpoint.input = Some(input);

        let scheduler = BatchScheduler::new(Arc::clone(&self.fetcher), registry, self.run.clone())
            .with_fetch_timeout(Duration::from_secs(self.config.fetch.timeout_secs))
            .with_pacing(Pacing::from_config(&self.config.fetch))
            .with_stop_token(self.stop.clone());

        let outcome = match scheduler
            .run(&targets, &mut checkpoint, &mut store, &mut sink)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                let last_checkpoint = describe_last_checkpoint(&store);
                tracing::error!("Run aborted: {}", e);
                tracing::error!("Last persisted checkpoint: {}", last_checkpoint);
                return Err(HarvestError::Aborted {
                    source: Box::new(e),
                    last_checkpoint,
                });
            }
        };

        let summary = resolve_range(targets.len(), self.run.start_index, self.run.end_index)
            .map(|range| RunSummary::from_checkpoint(&checkpoint, &range));

        let status = match outcome {
            SchedulerOutcome::Interrupted => RunStatus::Interrupted,
            SchedulerOutcome::Completed if summary.as_ref().is_some_and(RunSummary::has_skipped) => {
                RunStatus::CompleteWithSkipped
            }
            SchedulerOutcome::Completed => RunStatus::Complete,
        };

        match status {
            RunStatus::Interrupted => tracing::warn!("Run interrupted; resume with the same checkpoint"),
            _ => tracing::info!("Run complete"),
        }

        Ok(RunOutcome { status, summary })
    }
}

/// Summary of the checkpoint saved at `checkpoint_path`, for `--stats`
///
/// Returns `None` if no checkpoint exists or it has no recorded items.
pub fn load_summary(checkpoint_path: &Path) -> Result<Option<RunSummary>> {
    let store = JsonCheckpointStore::new(checkpoint_path);
    Ok(store
        .peek()?
        .and_then(|checkpoint| RunSummary::from_recorded(&checkpoint)))
}

/// Rejects resuming a checkpoint that was built from a different input
///
/// Indices only mean something relative to the source list that produced
/// them. A checkpoint with no recorded items, or one written before inputs
/// were fingerprinted, is adopted as is.
fn check_input(
    checkpoint: &Checkpoint,
    current: &InputFingerprint,
    store: &JsonCheckpointStore,
) -> Result<()> {
    let Some(recorded) = &checkpoint.input else {
        return Ok(());
    };
    if checkpoint.recorded_range().is_none() {
        return Ok(());
    }

    if !recorded.matches(current) {
        return Err(HarvestError::InputMismatch {
            checkpoint: store.location(),
            recorded: recorded.path.clone(),
            current: current.path.clone(),
        });
    }
    if recorded.path != current.path {
        tracing::warn!(
            "Input moved since the checkpoint was written ({} -> {}), content unchanged",
            recorded.path,
            current.path
        );
    }
    Ok(())
}

/// Describes what the checkpoint file currently holds
fn describe_last_checkpoint(store: &JsonCheckpointStore) -> String {
    match store.peek() {
        Ok(Some(saved)) => format!(
            "{} saved at {} with {} output row(s)",
            store.location(),
            saved
                .updated_at
                .map_or_else(|| "unknown time".to_string(), |t| t.to_rfc3339()),
            saved.output_offset
        ),
        Ok(None) => format!("none ({} was never written)", store.location()),
        Err(e) => format!("unreadable ({})", e),
    }
}
