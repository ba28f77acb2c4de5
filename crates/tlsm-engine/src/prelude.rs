//! Prelude module - commonly used types for convenient import.
//!
//! Use `use tlsm_engine::prelude::*;` to import the engine and its
//! collaborators' essential types.

// Engine
pub use crate::{Decision, DecisionEngine, DecisionReason, EngineSettings};

// Administration
pub use crate::{ControlError, ControlInterface, ControlResult, Writer};

// Ledger
pub use crate::{TrustEntry, TrustLedger};

// Collaborators
pub use tlsm_approval::{ApproverNotifier, ChannelNotifier, EndpointHandle, RequestId};
pub use tlsm_core::{AccessRequest, IdentityResolver, Operation, TaskId, Verdict};
pub use tlsm_policy::{Policy, RuleStore};
