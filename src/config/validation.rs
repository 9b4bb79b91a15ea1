use crate::config::types::{
    Config, FetchConfig, FieldConfig, InputConfig, OutputConfig, RuleKind, RunConfig, RunSection,
};
use crate::ConfigError;
use std::collections::HashSet;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_run_section(&config.run)?;
    validate_input_config(&config.input)?;
    validate_output_config(&config.output)?;
    validate_fetch_config(&config.fetch)?;
    validate_fields(&config.fields)?;
    Ok(())
}

/// Validates the effective run settings after overrides have been applied
pub fn validate_run_config(config: &RunConfig) -> Result<(), ConfigError> {
    if config.batch_size == 0 {
        return Err(ConfigError::Validation(
            "batch_size must be greater than 0".to_string(),
        ));
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    validate_index_range(config.start_index, config.end_index)?;

    if config.input_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "input path cannot be empty".to_string(),
        ));
    }

    if config.output_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output path cannot be empty".to_string(),
        ));
    }

    if config.output_path == config.checkpoint_path {
        return Err(ConfigError::Validation(
            "output path and checkpoint path must differ".to_string(),
        ));
    }

    Ok(())
}

fn validate_run_section(run: &RunSection) -> Result<(), ConfigError> {
    if run.batch_size == 0 {
        return Err(ConfigError::Validation(
            "batch-size must be greater than 0".to_string(),
        ));
    }

    if run.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be >= 1, got {}",
            run.max_attempts
        )));
    }

    validate_index_range(run.start_index, run.end_index)
}

fn validate_index_range(start: Option<usize>, end: Option<usize>) -> Result<(), ConfigError> {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(ConfigError::Validation(format!(
                "end-index ({}) must be >= start-index ({})",
                end, start
            )));
        }
    }
    Ok(())
}

fn validate_input_config(config: &InputConfig) -> Result<(), ConfigError> {
    if config.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "input path cannot be empty".to_string(),
        ));
    }

    if config.url_column.trim().is_empty() {
        return Err(ConfigError::Validation(
            "url-column cannot be empty".to_string(),
        ));
    }

    if config.carry_columns.iter().any(|c| c == &config.url_column) {
        return Err(ConfigError::Validation(format!(
            "carry-columns must not repeat the url column '{}'",
            config.url_column
        )));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output path cannot be empty".to_string(),
        ));
    }

    if config.checkpoint_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "checkpoint-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout-secs must be greater than 0".to_string(),
        ));
    }

    if config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "connect-timeout-secs must be greater than 0".to_string(),
        ));
    }

    for (name, [min, max]) in [
        ("item-delay-ms", config.item_delay_ms),
        ("batch-delay-ms", config.batch_delay_ms),
    ] {
        if min > max {
            return Err(ConfigError::Validation(format!(
                "{} must be [min, max] with min <= max, got [{}, {}]",
                name, min, max
            )));
        }
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates field entries
///
/// References between fields (fallbacks) are checked later, when the
/// selector registry resolves them.
fn validate_fields(fields: &[FieldConfig]) -> Result<(), ConfigError> {
    if fields.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[field]] must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for field in fields {
        if field.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "field name cannot be empty".to_string(),
            ));
        }

        if !seen.insert(field.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "field '{}' is configured more than once",
                field.name
            )));
        }

        if field.selectors.is_empty() {
            return Err(ConfigError::Validation(format!(
                "field '{}' must have at least one selector",
                field.name
            )));
        }

        if field.kind == RuleKind::Attribute
            && field.attribute.as_deref().map_or(true, |a| a.trim().is_empty())
        {
            return Err(ConfigError::Validation(format!(
                "field '{}' has kind = \"attribute\" but no attribute name",
                field.name
            )));
        }

        if field.fallback.as_deref() == Some(field.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "field '{}' cannot fall back to itself",
                field.name
            )));
        }
    }

    Ok(())
}
