//! Configuration module for Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and resolving the effective run settings once command-line overrides are known.
//!
//! # Example
//!
//! ```no_run
//! use harvest::config::{load_config, resolve_run_config, RunOverrides};
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! let run = resolve_run_config(&config, &RunOverrides::default()).unwrap();
//! println!("Batches of {} URLs", run.batch_size);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, FetchConfig, FieldConfig, InputConfig, OutputConfig, RuleKind, RunConfig,
    RunOverrides, RunSection,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, parse_config, resolve_run_config,
};
