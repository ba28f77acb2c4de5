use thiserror::Error;

use tlsm_approval::{ApprovalError, EndpointHandle};
use tlsm_policy::PolicyError;

/// Errors reported to the writer of a control command.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The command line is malformed.
    #[error("invalid command '{input}': {reason}")]
    Parse {
        /// The offending line.
        input: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The writer may not run this command.
    #[error("unauthorized: {reason}")]
    Unauthorized {
        /// Why the writer was rejected.
        reason: String,
    },

    /// No approver endpoint has this handle.
    #[error("{handle} is not registered")]
    UnknownEndpoint {
        /// The requested endpoint.
        handle: EndpointHandle,
    },

    /// A rule administration command failed.
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// An approval protocol command failed.
    #[error(transparent)]
    Approval(#[from] ApprovalError),
}

impl ControlError {
    pub(crate) fn parse(input: &str, reason: impl Into<String>) -> Self {
        Self::Parse {
            input: input.trim_end().to_owned(),
            reason: reason.into(),
        }
    }
}

/// Result type for control commands.
pub type ControlResult<T> = Result<T, ControlError>;
