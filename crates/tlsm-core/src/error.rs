use thiserror::Error;

/// Errors raised while parsing core vocabulary from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The word does not name a known operation.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// The word does not name a known policy category.
    #[error("unknown category: {0}")]
    UnknownCategory(String),
}

/// Result type for core parsing.
pub type CoreResult<T> = Result<T, CoreError>;
