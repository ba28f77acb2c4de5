use thiserror::Error;

use crate::pending::RequestId;
use crate::registry::EndpointHandle;

/// Errors that can occur in the interactive approval protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApprovalError {
    /// The answer channel is not accepting new requests.
    #[error("answer channel is closed")]
    ChannelClosed,

    /// Too many requests are already pending.
    #[error("too many pending requests ({capacity})")]
    Exhausted {
        /// Maximum number of pending requests.
        capacity: usize,
    },

    /// No pending request has this id.
    #[error("no pending request {id}")]
    UnknownRequest {
        /// The requested id.
        id: RequestId,
    },

    /// The request already received its answer.
    #[error("{id} was already answered")]
    AlreadyAnswered {
        /// The request id.
        id: RequestId,
    },

    /// The waiting caller gave up before the answer arrived.
    #[error("{id} expired before the answer arrived")]
    Expired {
        /// The request id.
        id: RequestId,
    },

    /// Answer text is not `allow|deny [score_delta]`.
    #[error("malformed answer '{input}'")]
    MalformedAnswer {
        /// The offending text.
        input: String,
    },

    /// The caller may not act on this request or endpoint.
    #[error("unauthorized: {reason}")]
    Unauthorized {
        /// Why the caller was rejected.
        reason: String,
    },

    /// The approver could not be woken.
    #[error("cannot notify approver {handle}: {reason}")]
    Notify {
        /// The endpoint that failed.
        handle: EndpointHandle,
        /// What went wrong.
        reason: String,
    },
}

/// Result type for approval operations.
pub type ApprovalResult<T> = Result<T, ApprovalError>;
