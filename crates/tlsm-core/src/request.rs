//! Access requests and verdicts.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::operation::Operation;

/// Subject used when the caller's executable path cannot be resolved.
pub const UNKNOWN_SUBJECT: &str = "unknown";

/// Identity of a monitored task, as assigned by the host.
///
/// Used as the key of the trust ledger side table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task:{}", self.0)
    }
}

/// One intercepted operation, alive until the engine returns a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    /// What the caller is trying to do.
    pub operation: Operation,
    /// Resolved executable path of the caller.
    pub subject: String,
    /// Operation-specific target: a path, an address, or empty.
    pub object: String,
    /// Set while the request is routed through interactive adjudication.
    pub supervised: bool,
    /// Snapshot of the caller's trust score at request time.
    pub score: u32,
    /// Adjustment to apply to the score once adjudicated.
    pub score_delta: i64,
}

impl AccessRequest {
    /// Create a request as the interception boundary supplies it.
    ///
    /// The subject starts as [`UNKNOWN_SUBJECT`] until resolved.
    #[must_use]
    pub fn new(operation: Operation, object: impl Into<String>) -> Self {
        Self {
            operation,
            subject: UNKNOWN_SUBJECT.to_owned(),
            object: object.into(),
            supervised: false,
            score: 0,
            score_delta: 0,
        }
    }

    /// Set the resolved subject path.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Set the score snapshot.
    #[must_use]
    pub fn with_score(mut self, score: u32) -> Self {
        self.score = score;
        self
    }
}

impl fmt::Display for AccessRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.operation, self.object)
    }
}

/// The final answer handed back to the enforcement boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// The operation proceeds.
    Allow,
    /// The operation is refused with permission denied.
    Deny,
}

impl Verdict {
    /// Check if this verdict lets the operation proceed.
    #[must_use]
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Check if this verdict refuses the operation.
    #[must_use]
    pub fn is_denied(self) -> bool {
        matches!(self, Self::Deny)
    }

    /// Build a verdict from an allow flag.
    #[must_use]
    pub fn from_allowed(allowed: bool) -> Self {
        if allowed { Self::Allow } else { Self::Deny }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("allow"),
            Self::Deny => f.write_str("deny"),
        }
    }
}
