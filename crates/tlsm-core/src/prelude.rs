//! Prelude module - commonly used types for convenient import.
//!
//! Use `use tlsm_core::prelude::*;` to import all essential types.

// Errors
pub use crate::{CoreError, CoreResult};

// Vocabulary
pub use crate::{AccessRequest, Category, Operation, TaskId, Verdict};

// Bookkeeping
pub use crate::{OperationStats, StatsTable};

// Identity boundary
pub use crate::{IdentityResolver, ROOT_UID, Uid};
