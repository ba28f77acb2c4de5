//! Shared setup for the end-to-end tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tlsm_core::TaskId;
use tlsm_engine::{ControlInterface, DecisionEngine, EngineSettings, Writer};
use tlsm_test::{MockIdentity, RecordingNotifier};

pub const APPROVER: &str = "/usr/bin/tlsmd";

pub const CAT: TaskId = TaskId(10);
pub const NC: TaskId = TaskId(11);
pub const PYTHON: TaskId = TaskId(12);
pub const ROOT_SHELL: TaskId = TaskId(13);
pub const SERVER: TaskId = TaskId(14);

/// Tasks owned by uid 1000, plus one root task.
pub fn identity() -> MockIdentity {
    MockIdentity::new()
        .with_task(CAT, "/bin/cat", 1000)
        .with_task(NC, "/bin/nc", 1000)
        .with_task(PYTHON, "/usr/bin/python3", 1000)
        .with_task(ROOT_SHELL, "/bin/cat", 0)
        .with_task(SERVER, "/opt/app/server", 1000)
}

pub struct Harness {
    pub engine: Arc<DecisionEngine>,
    pub control: ControlInterface,
    pub notifier: RecordingNotifier,
}

impl Harness {
    pub fn new(timeout: Duration) -> Self {
        tlsm_test::init_test_logging();
        let notifier = RecordingNotifier::new();
        let settings = EngineSettings {
            approval_timeout: timeout,
            ..EngineSettings::default()
        };
        let engine = Arc::new(DecisionEngine::new(
            Arc::new(identity()),
            Arc::new(notifier.clone()),
            settings,
        ));
        let control = ControlInterface::new(Arc::clone(&engine), [APPROVER]);
        Self {
            engine,
            control,
            notifier,
        }
    }

    /// Run `line` as an administrator shell, panicking on rejection.
    pub fn admin(&self, line: &str) -> String {
        self.control
            .execute(&Writer::new(0, "/bin/sh"), line)
            .unwrap_or_else(|e| panic!("{line:?} rejected: {e}"))
    }
}

/// The approver daemon running for `uid`.
pub fn approver(uid: u32) -> Writer {
    Writer::new(uid, APPROVER)
}
