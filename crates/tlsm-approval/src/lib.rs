//! TLSM Approval - Interactive adjudication of access requests.
//!
//! When the matched rule is `ask` or `analyze`, the engine hands the request
//! to a human-operated approver and waits, bounded, for an answer:
//!
//! 1. The [`Adjudicator`] files a [`RequestSnapshot`] in the [`PendingTable`]
//!    under a fresh, strictly increasing [`RequestId`].
//! 2. It looks up a live [`ApproverEndpoint`] for the caller's owner in the
//!    [`ApproverRegistry`], pruning dead endpoints on the way, and wakes it
//!    through an [`ApproverNotifier`].
//! 3. The approver reads the snapshot and writes an [`Answer`]
//!    (`allow|deny <score_delta>`) back through the [`PendingTable`].
//! 4. The waiting caller resumes with the answer, or with a zero-delta deny
//!    when the timeout expires first. The pending entry is reclaimed on
//!    every exit path.
//!
//! # Example
//!
//! ```
//! use tlsm_approval::Answer;
//!
//! let answer: Answer = "deny -20".parse().unwrap();
//! assert!(!answer.allow);
//! assert_eq!(answer.score_delta, -20);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adjudicator;
/// Error types and results for the approval protocol.
pub mod error;
pub mod notifier;
pub mod pending;
pub mod registry;

pub use adjudicator::{Adjudication, AdjudicationOutcome, Adjudicator, DEFAULT_APPROVAL_TIMEOUT};
pub use error::{ApprovalError, ApprovalResult};
#[cfg(unix)]
pub use notifier::SignalNotifier;
pub use notifier::{ApproverNotifier, ChannelNotifier};
pub use pending::{
    Answer, DEFAULT_MAX_PENDING, PendingInfo, PendingState, PendingTable, RequestId,
    RequestSnapshot,
};
pub use registry::{ApproverEndpoint, ApproverRegistry, EndpointHandle};
