use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure for Harvest
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub run: RunSection,
    pub input: InputConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(rename = "field", default)]
    pub fields: Vec<FieldConfig>,
}

/// Batch and retry policy as written in the config file
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunSection {
    /// Number of source indices processed between checkpoint flushes
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Attempts per index before it is skipped
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Requeue failed items (false behaves like `max-attempts = 1`)
    #[serde(default = "default_true")]
    pub restart_enabled: bool,

    /// Run the record validator (false marks every record valid)
    #[serde(default = "default_true")]
    pub validate_enabled: bool,

    /// Treat partial records as finished instead of retrying them
    #[serde(default = "default_true")]
    pub accept_partial: bool,

    /// First source index to process (inclusive)
    #[serde(default)]
    pub start_index: Option<usize>,

    /// Last source index to process (inclusive)
    #[serde(default)]
    pub end_index: Option<usize>,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            restart_enabled: true,
            validate_enabled: true,
            accept_partial: true,
            start_index: None,
            end_index: None,
        }
    }
}

/// Source spreadsheet configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct InputConfig {
    /// Path to the CSV file listing product URLs
    pub path: PathBuf,

    /// Header of the column holding the URL
    #[serde(default = "default_url_column")]
    pub url_column: String,

    /// Input columns copied verbatim into every output row
    #[serde(default)]
    pub carry_columns: Vec<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the CSV file receiving extracted records
    pub path: PathBuf,

    /// Path to the JSON checkpoint file
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: PathBuf,
}

/// Fetch behaviour and pacing
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FetchConfig {
    pub user_agent: String,

    /// Whole-request timeout, applied per fetch
    pub timeout_secs: u64,

    pub connect_timeout_secs: u64,

    /// Random pause between items, `[min, max]` milliseconds
    pub item_delay_ms: [u64; 2],

    /// Random pause between batches, `[min, max]` milliseconds
    pub batch_delay_ms: [u64; 2],

    /// Status codes that indicate the site refused to serve the page
    pub blocked_statuses: Vec<u16>,

    /// Case-insensitive phrases that mark a block/captcha page
    pub block_phrases: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("harvest/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 30,
            connect_timeout_secs: 10,
            item_delay_ms: [0, 0],
            batch_delay_ms: [0, 0],
            blocked_statuses: vec![403, 429, 503],
            block_phrases: vec!["access denied".to_string()],
        }
    }
}

/// Kind of extraction applied to a field's matched element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleKind {
    Text,
    Attribute,
    Number,
    Presence,
}

/// One `[[field]]` entry
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct FieldConfig {
    pub name: String,

    pub kind: RuleKind,

    /// CSS selectors tried in order; the first match wins
    pub selectors: Vec<String>,

    /// Attribute read by `kind = "attribute"`
    #[serde(default)]
    pub attribute: Option<String>,

    /// Field whose value is used when this one is absent
    #[serde(default)]
    pub fallback: Option<String>,

    #[serde(default)]
    pub required: bool,

    /// Value must parse as a number when present
    #[serde(default)]
    pub numeric: bool,
}

/// Effective, immutable settings for one run
///
/// Built from the config file with command-line overrides applied on top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub batch_size: usize,
    pub start_index: Option<usize>,
    pub end_index: Option<usize>,
    pub restart_enabled: bool,
    pub validate_enabled: bool,
    pub accept_partial: bool,
    pub max_attempts: u32,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub checkpoint_path: PathBuf,
}

impl RunConfig {
    /// Attempts an index gets before being skipped, after the restart policy
    pub fn effective_max_attempts(&self) -> u32 {
        if self.restart_enabled {
            self.max_attempts
        } else {
            1
        }
    }
}

/// Command-line values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub input_path: Option<PathBuf>,
    pub batch_size: Option<usize>,
    pub start_index: Option<usize>,
    pub end_index: Option<usize>,
    pub disable_restart: bool,
    pub disable_validate: bool,
    pub output_path: Option<PathBuf>,
    pub checkpoint_path: Option<PathBuf>,
}

fn default_batch_size() -> usize {
    15
}

fn default_max_attempts() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_url_column() -> String {
    "url".to_string()
}

fn default_checkpoint_path() -> PathBuf {
    PathBuf::from("harvest-checkpoint.json")
}
