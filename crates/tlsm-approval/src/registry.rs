//! Registered approver endpoints.

use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tlsm_core::Uid;

use crate::notifier::ApproverNotifier;

/// Opaque handle the notifier uses to reach an approver.
///
/// For signal delivery this is the approver's process id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointHandle(pub u32);

impl fmt::Display for EndpointHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "endpoint:{}", self.0)
    }
}

/// One registered approver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApproverEndpoint {
    /// How to reach the approver.
    pub handle: EndpointHandle,
    /// The user whose requests this approver answers.
    pub owner_uid: Uid,
}

/// Approvers in registration order.
///
/// Several endpoints may serve the same user; lookup prefers the earliest
/// registered one that is still alive.
#[derive(Default)]
pub struct ApproverRegistry {
    endpoints: RwLock<Vec<ApproverEndpoint>>,
}

impl ApproverRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<ApproverEndpoint>> {
        self.endpoints.read().unwrap_or_else(|e| {
            tracing::warn!("ApproverRegistry read lock poisoned, recovering");
            PoisonError::into_inner(e)
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<ApproverEndpoint>> {
        self.endpoints.write().unwrap_or_else(|e| {
            tracing::warn!("ApproverRegistry write lock poisoned, recovering");
            PoisonError::into_inner(e)
        })
    }

    /// Register an endpoint for `owner_uid`.
    ///
    /// Registering the same handle again rebinds it to the new owner.
    pub fn register(&self, handle: EndpointHandle, owner_uid: Uid) {
        let mut endpoints = self.write();
        endpoints.retain(|e| e.handle != handle);
        endpoints.push(ApproverEndpoint { handle, owner_uid });
        tracing::info!(%handle, owner_uid, "approver registered");
    }

    /// Remove the endpoint with `handle`. Returns whether one was removed.
    pub fn remove(&self, handle: EndpointHandle) -> bool {
        let mut endpoints = self.write();
        let before = endpoints.len();
        endpoints.retain(|e| e.handle != handle);
        let removed = endpoints.len() != before;
        if removed {
            tracing::info!(%handle, "approver unregistered");
        }
        removed
    }

    /// The owner of `handle`, if registered.
    #[must_use]
    pub fn owner_of(&self, handle: EndpointHandle) -> Option<Uid> {
        self.read()
            .iter()
            .find(|e| e.handle == handle)
            .map(|e| e.owner_uid)
    }

    /// Find the first live endpoint serving `uid`.
    ///
    /// Endpoints found dead along the way are removed, so each lookup
    /// visits every stale entry at most once.
    pub fn find_live(&self, uid: Uid, notifier: &dyn ApproverNotifier) -> Option<ApproverEndpoint> {
        loop {
            let candidate = self.read().iter().find(|e| e.owner_uid == uid).copied()?;
            if notifier.is_alive(candidate.handle) {
                return Some(candidate);
            }
            tracing::warn!(handle = %candidate.handle, owner_uid = uid, "pruning dead approver");
            self.write().retain(|e| e.handle != candidate.handle);
        }
    }

    /// Number of registered endpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no endpoint is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl fmt::Debug for ApproverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApproverRegistry")
            .field("endpoints", &self.len())
            .finish()
    }
}
