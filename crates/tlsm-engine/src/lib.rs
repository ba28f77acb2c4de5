//! TLSM Engine - Decision orchestration for intercepted operations.
//!
//! This crate ties the rule store, the interactive approval protocol and the
//! trust ledger together:
//!
//! - [`DecisionEngine`]: `authorize(task, request) -> Verdict`, the single
//!   entry point of the enforcement boundary.
//! - [`TrustLedger`]: per-task trust score and per-operation counters.
//! - [`ControlInterface`]: the line-oriented administration protocol for
//!   rules, approver endpoints and pending answers.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tlsm_engine::{ControlInterface, DecisionEngine, EngineSettings, Writer};
//!
//! let engine = Arc::new(DecisionEngine::new(identity, notifier, EngineSettings::default()));
//! let control = ControlInterface::new(Arc::clone(&engine), ["/usr/bin/tlsmd"]);
//! control.execute(&Writer::new(0, "/bin/sh"), "add /bin/nc deny connect any")?;
//!
//! let verdict = engine.authorize(task, request).await;
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod control;
/// Error types for the control interface.
pub mod error;
pub mod ledger;
pub mod orchestrator;

pub use control::{ControlCommand, ControlInterface, Writer};
pub use error::{ControlError, ControlResult};
pub use ledger::{INITIAL_SCORE, TrustEntry, TrustLedger, score_update};
pub use orchestrator::{
    DEFAULT_DENY_PENALTY, Decision, DecisionEngine, DecisionReason, EngineSettings, MatchedRule,
};
