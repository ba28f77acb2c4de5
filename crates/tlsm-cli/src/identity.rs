//! Caller identity for requests evaluated from the command line.

use tlsm_core::{IdentityResolver, TaskId, Uid};

/// The only task a CLI invocation evaluates.
pub(crate) const CLI_TASK: TaskId = TaskId(1);

/// Resolves [`CLI_TASK`] to a fixed subject and owner.
///
/// Other tasks are unknown.
#[derive(Debug, Clone)]
pub(crate) struct FixedIdentity {
    subject: String,
    uid: Uid,
}

impl FixedIdentity {
    pub(crate) fn new(subject: impl Into<String>, uid: Uid) -> Self {
        Self {
            subject: subject.into(),
            uid,
        }
    }
}

impl IdentityResolver for FixedIdentity {
    fn subject_path(&self, task: TaskId) -> Option<String> {
        (task == CLI_TASK).then(|| self.subject.clone())
    }

    fn owner_uid(&self, task: TaskId) -> Option<Uid> {
        (task == CLI_TASK).then_some(self.uid)
    }
}

/// Real uid of this process.
pub(crate) fn current_uid() -> Uid {
    nix::unistd::getuid().as_raw()
}

/// Path of the running executable, used as the writer's program identity.
pub(crate) fn current_program() -> String {
    std::env::current_exe()
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}
