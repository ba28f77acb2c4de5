//! Configuration types.
//!
//! These types have no dependencies on other TLSM crates. Every struct
//! implements [`Default`] with the same values as the embedded
//! `defaults.toml`, so a bare `[section]` header produces a working
//! configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Decision engine tunables.
    pub engine: EngineSection,
    /// Approver endpoint registration.
    pub approvers: ApproversSection,
    /// Startup rule file.
    pub policies: PoliciesSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// EngineSection
// ---------------------------------------------------------------------------

/// Decision engine tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Seconds an approver has to answer an interactive request.
    pub approval_timeout_secs: u64,
    /// Score subtracted on every `deny` match.
    pub deny_penalty: u32,
    /// Score every subject starts with.
    pub initial_score: u32,
    /// Rule store capacity.
    pub max_rules: usize,
    /// Maximum simultaneously pending requests.
    pub max_pending: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            approval_timeout_secs: 20,
            deny_penalty: 10,
            initial_score: 100,
            max_rules: 4096,
            max_pending: 1024,
        }
    }
}

// ---------------------------------------------------------------------------
// ApproversSection
// ---------------------------------------------------------------------------

/// Approver endpoint registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApproversSection {
    /// Program paths allowed to register and unregister endpoints.
    pub trusted: Vec<String>,
}

impl Default for ApproversSection {
    fn default() -> Self {
        Self {
            trusted: vec!["/usr/bin/tlsmd".to_owned(), "/usr/local/bin/tlsmd".to_owned()],
        }
    }
}

// ---------------------------------------------------------------------------
// PoliciesSection
// ---------------------------------------------------------------------------

/// Rules loaded at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoliciesSection {
    /// Path of a `policies.conf` file; a missing file is not an error.
    pub file: Option<PathBuf>,
}

impl Default for PoliciesSection {
    fn default() -> Self {
        Self {
            file: Some(PathBuf::from("/etc/tlsm/policies.conf")),
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"` or `"json"`.
    pub format: String,
    /// Write logs to this file instead of stderr.
    pub file: Option<PathBuf>,
    /// Per-crate tracing directives (e.g. `["tlsm_approval=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "pretty".to_owned(),
            file: None,
            directives: Vec::new(),
        }
    }
}
