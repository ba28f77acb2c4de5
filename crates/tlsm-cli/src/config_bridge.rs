//! Bridge from `tlsm_config::Config` to engine and telemetry types.

use std::time::Duration;

use tlsm_config::Config;
use tlsm_engine::EngineSettings;
use tlsm_telemetry::{LogConfig, LogFormat};

/// Convert the `[engine]` section to [`EngineSettings`].
pub(crate) fn to_engine_settings(cfg: &Config) -> EngineSettings {
    EngineSettings {
        approval_timeout: Duration::from_secs(cfg.engine.approval_timeout_secs),
        deny_penalty: cfg.engine.deny_penalty,
        initial_score: cfg.engine.initial_score,
        max_rules: cfg.engine.max_rules,
        max_pending: cfg.engine.max_pending,
    }
}

/// Convert the `[logging]` section to a [`LogConfig`].
///
/// The section is validated on load, so a conversion failure only happens
/// for hand-built configs; those fall back to compact stderr output.
pub(crate) fn to_log_config(cfg: &Config) -> LogConfig {
    LogConfig::from_section(&cfg.logging).unwrap_or_else(|e| {
        eprintln!("Invalid logging configuration: {e}");
        LogConfig::new(&cfg.logging.level).with_format(LogFormat::Compact)
    })
}
