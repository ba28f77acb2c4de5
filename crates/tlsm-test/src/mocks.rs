//! Mock implementations for testing.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use tlsm_approval::{ApprovalError, ApprovalResult, ApproverNotifier, EndpointHandle, RequestId};
use tlsm_core::{IdentityResolver, TaskId, Uid};

/// Identity resolver backed by a fixed table.
///
/// Unknown tasks resolve to no subject and no owner.
#[derive(Debug, Clone, Default)]
pub struct MockIdentity {
    tasks: HashMap<TaskId, (Option<String>, Option<Uid>)>,
    privileged: HashSet<Uid>,
}

impl MockIdentity {
    /// Create a resolver that knows no tasks; only uid 0 is privileged.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
            privileged: HashSet::from([tlsm_core::ROOT_UID]),
        }
    }

    /// Map `task` to `subject` owned by `uid`.
    #[must_use]
    pub fn with_task(mut self, task: TaskId, subject: impl Into<String>, uid: Uid) -> Self {
        self.tasks.insert(task, (Some(subject.into()), Some(uid)));
        self
    }

    /// Map `task` to `subject` with an unresolvable owner.
    #[must_use]
    pub fn with_ownerless_task(mut self, task: TaskId, subject: impl Into<String>) -> Self {
        self.tasks.insert(task, (Some(subject.into()), None));
        self
    }

    /// Treat `uid` as privileged as well.
    #[must_use]
    pub fn with_privileged(mut self, uid: Uid) -> Self {
        self.privileged.insert(uid);
        self
    }
}

impl IdentityResolver for MockIdentity {
    fn subject_path(&self, task: TaskId) -> Option<String> {
        self.tasks.get(&task).and_then(|(subject, _)| subject.clone())
    }

    fn owner_uid(&self, task: TaskId) -> Option<Uid> {
        self.tasks.get(&task).and_then(|(_, uid)| *uid)
    }

    fn is_privileged(&self, uid: Uid) -> bool {
        self.privileged.contains(&uid)
    }
}

/// Notifier that records every wake-up and forwards it to a listener.
///
/// Every handle is alive unless marked dead.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    notified: Arc<Mutex<Vec<(EndpointHandle, RequestId)>>>,
    dead: Arc<Mutex<HashSet<EndpointHandle>>>,
    listener: Arc<Mutex<Option<mpsc::UnboundedSender<RequestId>>>>,
}

impl RecordingNotifier {
    /// Create a notifier with every endpoint alive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `handle` as dead.
    pub fn kill(&self, handle: EndpointHandle) {
        self.dead
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle);
    }

    /// Receive a copy of every notified request id.
    pub fn listen(&self) -> mpsc::UnboundedReceiver<RequestId> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        rx
    }

    /// Wake-ups sent so far, in order.
    #[must_use]
    pub fn notified(&self) -> Vec<(EndpointHandle, RequestId)> {
        self.notified
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ApproverNotifier for RecordingNotifier {
    fn is_alive(&self, handle: EndpointHandle) -> bool {
        !self
            .dead
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&handle)
    }

    fn notify(&self, handle: EndpointHandle, id: RequestId) -> ApprovalResult<()> {
        if !self.is_alive(handle) {
            return Err(ApprovalError::Notify {
                handle,
                reason: "endpoint is dead".to_owned(),
            });
        }
        self.notified
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((handle, id));
        if let Some(tx) = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            let _ = tx.send(id);
        }
        Ok(())
    }
}
