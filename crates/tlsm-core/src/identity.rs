//! Caller identity boundary.
//!
//! The engine never inspects processes itself. The host supplies an
//! [`IdentityResolver`] that maps a [`TaskId`] to the caller's executable
//! path and owning uid.

use crate::request::TaskId;

/// Numeric user id.
pub type Uid = u32;

/// The privileged user id.
pub const ROOT_UID: Uid = 0;

/// Resolves callers to the identity facts the engine needs.
pub trait IdentityResolver: Send + Sync {
    /// Resolved executable path of the task, or `None` if it cannot be read.
    ///
    /// The engine substitutes [`crate::UNKNOWN_SUBJECT`] for `None`.
    fn subject_path(&self, task: TaskId) -> Option<String>;

    /// Owning user id of the task, or `None` if it cannot be read.
    fn owner_uid(&self, task: TaskId) -> Option<Uid>;

    /// Whether `uid` is the privileged identity that bypasses interactive
    /// rules.
    fn is_privileged(&self, uid: Uid) -> bool {
        uid == ROOT_UID
    }
}
