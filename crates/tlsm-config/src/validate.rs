//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Longest accepted approval timeout, in seconds.
const MAX_APPROVAL_TIMEOUT_SECS: u64 = 3600;

/// Validate a fully merged configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_engine(config)?;
    validate_approvers(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn validate_engine(config: &Config) -> ConfigResult<()> {
    let e = &config.engine;

    if !(1..=MAX_APPROVAL_TIMEOUT_SECS).contains(&e.approval_timeout_secs) {
        return Err(invalid(
            "engine.approval_timeout_secs",
            format!("must be between 1 and {MAX_APPROVAL_TIMEOUT_SECS}"),
        ));
    }
    if e.initial_score == 0 {
        return Err(invalid("engine.initial_score", "must be greater than 0"));
    }
    if e.max_rules == 0 {
        return Err(invalid("engine.max_rules", "must be greater than 0"));
    }
    if e.max_pending == 0 {
        return Err(invalid("engine.max_pending", "must be greater than 0"));
    }
    Ok(())
}

fn validate_approvers(config: &Config) -> ConfigResult<()> {
    if let Some(bad) = config
        .approvers
        .trusted
        .iter()
        .find(|p| !p.starts_with('/'))
    {
        return Err(invalid(
            "approvers.trusted",
            format!("'{bad}' is not an absolute program path"),
        ));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.as_str()) {
        return Err(invalid(
            "logging.level",
            format!(
                "unsupported log level '{}'; expected one of: {}",
                config.logging.level,
                valid_levels.join(", ")
            ),
        ));
    }

    let valid_formats = ["pretty", "compact", "json"];
    if !valid_formats.contains(&config.logging.format.as_str()) {
        return Err(invalid(
            "logging.format",
            format!(
                "unsupported log format '{}'; expected one of: {}",
                config.logging.format,
                valid_formats.join(", ")
            ),
        ));
    }

    Ok(())
}
