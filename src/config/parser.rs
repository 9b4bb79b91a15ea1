use crate::config::types::{Config, RunConfig, RunOverrides};
use crate::config::validation::{validate, validate_run_config};
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use harvest::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("Batch size: {}", config.run.batch_size);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// This is stored in the checkpoint to detect a config change between the
/// interrupted run and the one resuming it.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Resolves the effective run settings
///
/// Explicit command-line values win over the config file.
pub fn resolve_run_config(
    config: &Config,
    overrides: &RunOverrides,
) -> Result<RunConfig, ConfigError> {
    let run = RunConfig {
        batch_size: overrides.batch_size.unwrap_or(config.run.batch_size),
        start_index: overrides.start_index.or(config.run.start_index),
        end_index: overrides.end_index.or(config.run.end_index),
        restart_enabled: config.run.restart_enabled && !overrides.disable_restart,
        validate_enabled: config.run.validate_enabled && !overrides.disable_validate,
        accept_partial: config.run.accept_partial,
        max_attempts: config.run.max_attempts,
        input_path: overrides
            .input_path
            .clone()
            .unwrap_or_else(|| config.input.path.clone()),
        output_path: overrides
            .output_path
            .clone()
            .unwrap_or_else(|| config.output.path.clone()),
        checkpoint_path: overrides
            .checkpoint_path
            .clone()
            .unwrap_or_else(|| config.output.checkpoint_path.clone()),
    };

    validate_run_config(&run)?;
    Ok(run)
}
