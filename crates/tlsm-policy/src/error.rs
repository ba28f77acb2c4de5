use thiserror::Error;

/// Errors that can occur while parsing or storing rules.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Rule text is malformed.
    #[error("cannot parse rule '{input}': {reason}")]
    Parse {
        /// The offending rule text.
        input: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The store refuses new rules.
    #[error("rule store is full ({capacity} rules)")]
    StoreFull {
        /// Maximum number of rules the store admits.
        capacity: usize,
    },

    /// No rule exists at the requested index.
    #[error("no rule at index {index}")]
    NotFound {
        /// The requested index.
        index: usize,
    },

    /// A policy file line is malformed.
    #[error("policy file line {line}: {reason}")]
    Conf {
        /// 1-based line number.
        line: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// A policy file could not be read.
    #[error("cannot read policy file {path}: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl PolicyError {
    pub(crate) fn parse(input: &str, reason: impl Into<String>) -> Self {
        Self::Parse {
            input: input.trim_end().to_owned(),
            reason: reason.into(),
        }
    }
}

/// Result type for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;
