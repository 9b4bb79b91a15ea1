//! Shared fixtures for the integration tests

use async_trait::async_trait;
use harvest::config::{FieldConfig, RuleKind, RunConfig};
use harvest::crawler::{FetchError, Fetcher};
use harvest::extract::{Page, SelectorRegistry};
use harvest::output::{OutputResult, ResultSink};
use harvest::record::CrawlRecord;
use harvest::state::Checkpoint;
use harvest::storage::{CheckpointError, CheckpointResult, CheckpointStore};
use harvest::CrawlTarget;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A product page carrying a name and a price
pub fn product_page(name: &str, price: &str) -> String {
    format!(
        r#"<html><body>
        <h1 class="name">{}</h1>
        <div class="price"><strong>{}원</strong></div>
        </body></html>"#,
        name, price
    )
}

/// A page with neither of the required fields
pub fn empty_page() -> String {
    "<html><body><p>Nothing here</p></body></html>".to_string()
}

/// A page with the name but no price
pub fn name_only_page(name: &str) -> String {
    format!(r#"<html><body><h1 class="name">{}</h1></body></html>"#, name)
}

pub fn field_configs() -> Vec<FieldConfig> {
    vec![
        FieldConfig {
            name: "name".to_string(),
            kind: RuleKind::Text,
            selectors: vec!["h1.name".to_string()],
            attribute: None,
            fallback: None,
            required: true,
            numeric: false,
        },
        FieldConfig {
            name: "price".to_string(),
            kind: RuleKind::Number,
            selectors: vec![".price strong".to_string()],
            attribute: None,
            fallback: None,
            required: true,
            numeric: true,
        },
    ]
}

pub fn registry() -> SelectorRegistry {
    SelectorRegistry::from_config(&field_configs()).unwrap()
}

pub fn run_config(batch_size: usize, max_attempts: u32) -> RunConfig {
    RunConfig {
        batch_size,
        start_index: None,
        end_index: None,
        restart_enabled: true,
        validate_enabled: true,
        accept_partial: true,
        max_attempts,
        input_path: "urls.csv".into(),
        output_path: "products.csv".into(),
        checkpoint_path: "checkpoint.json".into(),
    }
}

pub fn targets(count: usize) -> Vec<CrawlTarget> {
    (0..count)
        .map(|i| CrawlTarget::new(i, format!("https://shop.test/p/{}", i)))
        .collect()
}

/// Behaviour of the scripted fetcher for one index
#[derive(Debug, Clone)]
pub enum Script {
    /// Always serve this body
    Page(String),

    /// Fail the first `n` fetches with the error, then serve the body
    FailTimes(u32, FetchError, String),

    /// Always fail with the error
    Fail(FetchError),

    /// Always serve this exact page, whatever its content type
    Raw(Page),

    /// Never answer
    Hang,
}

/// In-process fetcher driven by a per-index script
///
/// Indices without a script get a valid product page.
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: HashMap<usize, Script>,
    log: Mutex<Vec<usize>>,
    stop_after: Option<(usize, CancellationToken)>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, index: usize, script: Script) -> Self {
        self.scripts.insert(index, script);
        self
    }

    /// Cancels `stop` once `fetches` fetches have been made
    pub fn stop_after(mut self, fetches: usize, stop: CancellationToken) -> Self {
        self.stop_after = Some((fetches, stop));
        self
    }

    /// Indices fetched so far, in call order
    pub fn fetched(&self) -> Vec<usize> {
        self.log.lock().unwrap().clone()
    }

    pub fn fetch_count(&self, index: usize) -> usize {
        self.fetched().iter().filter(|i| **i == index).count()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, target: &CrawlTarget) -> Result<Page, FetchError> {
        let previous = {
            let mut log = self.log.lock().unwrap();
            let previous = log.iter().filter(|i| **i == target.index).count() as u32;
            log.push(target.index);
            if let Some((limit, stop)) = &self.stop_after {
                if log.len() >= *limit {
                    stop.cancel();
                }
            }
            previous
        };

        let default_body = || product_page(&format!("Item {}", target.index), "12,900");
        match self.scripts.get(&target.index) {
            None => Ok(Page::html(&target.url, default_body())),
            Some(Script::Page(body)) => Ok(Page::html(&target.url, body.clone())),
            Some(Script::FailTimes(n, error, body)) => {
                if previous < *n {
                    Err(error.clone())
                } else {
                    Ok(Page::html(&target.url, body.clone()))
                }
            }
            Some(Script::Fail(error)) => Err(error.clone()),
            Some(Script::Raw(page)) => Ok(page.clone()),
            Some(Script::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(FetchError::Timeout)
            }
        }
    }
}

/// Checkpoint store keeping every saved snapshot in memory
#[derive(Default)]
pub struct MemoryStore {
    pub saved: Vec<Checkpoint>,
    /// Saves allowed before every further save fails
    pub fail_after: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_after(saves: usize) -> Self {
        Self {
            saved: Vec::new(),
            fail_after: Some(saves),
        }
    }

    /// What a new process would load: the last snapshot, crash-recovered
    pub fn load_last(&self) -> Checkpoint {
        let mut checkpoint = self.saved.last().cloned().unwrap_or_default();
        checkpoint.recover_interrupted();
        checkpoint
    }
}

impl CheckpointStore for MemoryStore {
    fn load(&mut self) -> CheckpointResult<Checkpoint> {
        Ok(self.load_last())
    }

    fn save(&mut self, checkpoint: &Checkpoint) -> CheckpointResult<()> {
        if self.fail_after.is_some_and(|limit| self.saved.len() >= limit) {
            return Err(CheckpointError::Unavailable("disk full".to_string()));
        }
        self.saved.push(checkpoint.clone());
        Ok(())
    }

    fn clear(&mut self) -> CheckpointResult<()> {
        self.saved.clear();
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

/// Result sink keeping flushed records in memory
#[derive(Default)]
pub struct MemorySink {
    pub buffered: BTreeMap<usize, CrawlRecord>,
    pub flushed: BTreeMap<usize, CrawlRecord>,
    pub appends: usize,
    pub flushes: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultSink for MemorySink {
    fn append(&mut self, record: CrawlRecord) -> OutputResult<()> {
        self.appends += 1;
        self.buffered.insert(record.index, record);
        Ok(())
    }

    fn flush(&mut self) -> OutputResult<usize> {
        self.flushes += 1;
        self.flushed.append(&mut self.buffered);
        Ok(self.flushed.len())
    }

    fn buffered(&self) -> usize {
        self.buffered.len()
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
