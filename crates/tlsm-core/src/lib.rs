//! TLSM Core - Shared vocabulary for the access-control decision engine.
//!
//! This crate holds the types every other TLSM crate speaks in:
//!
//! - [`Operation`] and [`Category`]: the closed sets of intercepted operation
//!   kinds and policy outcomes, with their wire names.
//! - [`AccessRequest`] and [`Verdict`]: one intercepted operation and its
//!   final answer.
//! - [`StatsTable`]: per-operation `total`/`deny` counters kept for every
//!   subject.
//! - [`IdentityResolver`]: the boundary through which the engine learns who
//!   is calling (executable path, owning uid).
//!
//! # Example
//!
//! ```
//! use tlsm_core::{AccessRequest, Operation, Verdict};
//!
//! let request = AccessRequest::new(Operation::FileOpen, "/etc/shadow")
//!     .with_subject("/bin/cat");
//! assert_eq!(request.operation.as_str(), "open");
//! assert!(Verdict::Allow.is_allowed());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

/// Error types for parsing core vocabulary.
pub mod error;
pub mod identity;
pub mod operation;
pub mod request;
pub mod stats;

pub use error::{CoreError, CoreResult};
pub use identity::{IdentityResolver, ROOT_UID, Uid};
pub use operation::{Category, Operation};
pub use request::{AccessRequest, TaskId, UNKNOWN_SUBJECT, Verdict};
pub use stats::{OperationStats, StatsTable};
