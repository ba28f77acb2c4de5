//! Line-oriented administration protocol.
//!
//! One command per line, words separated by whitespace:
//!
//! ```text
//! add <subject> <category> [operation [object]]   -> added rule #<i>
//! delete <index>                                  -> deleted rule #<i>
//! list                                            -> one line per rule
//! apply <path>                                    -> applied <n> rules
//! register <endpoint_id> <owner_uid>              -> registered endpoint:<id> for uid <uid>
//! unregister <endpoint_id>                        -> unregistered endpoint:<id>
//! pending                                         -> user_<uid>/request_<id> per line
//! read <id>                                       -> request snapshot
//! answer <id> allow|deny [score_delta]            -> answered request_<id>
//! ```
//!
//! A rejected command never changes engine state, with one exception: a
//! malformed `answer` still resolves the waiting request to a deny.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use tlsm_approval::{EndpointHandle, RequestId};
use tlsm_core::Uid;
use tlsm_policy::{Policy, load_policy_file};

use crate::error::{ControlError, ControlResult};
use crate::orchestrator::DecisionEngine;

/// Identity of whoever issued a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Writer {
    /// The writer's user id.
    pub uid: Uid,
    /// Executable path of the writing program.
    pub program: String,
}

impl Writer {
    /// Create a writer identity.
    #[must_use]
    pub fn new(uid: Uid, program: impl Into<String>) -> Self {
        Self {
            uid,
            program: program.into(),
        }
    }
}

/// A parsed control command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Append a rule.
    Add(Policy),
    /// Delete the rule at an index.
    Delete(usize),
    /// List all rules.
    List,
    /// Load a `policies.conf` file.
    Apply(PathBuf),
    /// Register an approver endpoint.
    Register {
        /// The endpoint.
        handle: EndpointHandle,
        /// User it answers for.
        owner_uid: Uid,
    },
    /// Remove an approver endpoint.
    Unregister(EndpointHandle),
    /// List the writer's pending requests.
    Pending,
    /// Read a pending request.
    Read(RequestId),
    /// Answer a pending request with the raw answer text.
    Answer {
        /// The request.
        id: RequestId,
        /// `allow|deny [score_delta]`, validated on delivery.
        text: String,
    },
}

impl ControlCommand {
    /// Parse one command line.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Parse`] for unknown commands or bad arguments,
    /// and [`ControlError::Policy`] for malformed `add` rules.
    pub fn parse(line: &str) -> ControlResult<Self> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&verb, args)) = words.split_first() else {
            return Err(ControlError::parse(line, "empty command"));
        };

        match (verb, args) {
            ("add", rule) if !rule.is_empty() => Ok(Self::Add(Policy::parse(&rule.join(" "))?)),
            ("delete", [index]) => Ok(Self::Delete(number(line, index)?)),
            ("list", []) => Ok(Self::List),
            ("apply", [path]) => Ok(Self::Apply(PathBuf::from(*path))),
            ("register", [handle, owner]) => Ok(Self::Register {
                handle: EndpointHandle(number(line, handle)?),
                owner_uid: number(line, owner)?,
            }),
            ("unregister", [handle]) => Ok(Self::Unregister(EndpointHandle(number(line, handle)?))),
            ("pending", []) => Ok(Self::Pending),
            ("read", [id]) => Ok(Self::Read(request_id(line, id)?)),
            ("answer", [id, answer @ ..]) if !answer.is_empty() => Ok(Self::Answer {
                id: request_id(line, id)?,
                text: answer.join(" "),
            }),
            (
                "add" | "delete" | "list" | "apply" | "register" | "unregister" | "pending"
                | "read" | "answer",
                _,
            ) => Err(ControlError::parse(line, format!("wrong arguments for '{verb}'"))),
            _ => Err(ControlError::parse(line, format!("unknown command '{verb}'"))),
        }
    }
}

fn number<T: FromStr>(line: &str, word: &str) -> ControlResult<T> {
    word.parse()
        .map_err(|_| ControlError::parse(line, format!("'{word}' is not a number")))
}

fn request_id(line: &str, word: &str) -> ControlResult<RequestId> {
    word.parse()
        .map_err(|_| ControlError::parse(line, format!("'{word}' is not a request id")))
}

/// Executes control commands against a [`DecisionEngine`].
pub struct ControlInterface {
    engine: Arc<DecisionEngine>,
    trusted: Vec<String>,
}

impl ControlInterface {
    /// Create an interface; `trusted` lists the programs allowed to manage
    /// approver endpoints.
    #[must_use]
    pub fn new(engine: Arc<DecisionEngine>, trusted: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            engine,
            trusted: trusted.into_iter().map(Into::into).collect(),
        }
    }

    /// The engine commands act on.
    #[must_use]
    pub fn engine(&self) -> &Arc<DecisionEngine> {
        &self.engine
    }

    /// Parse and run one command line as `writer`.
    ///
    /// Returns the command's output, lines joined by `\n`.
    ///
    /// # Errors
    ///
    /// Returns the parse or execution error; engine state is unchanged.
    pub fn execute(&self, writer: &Writer, line: &str) -> ControlResult<String> {
        let command = ControlCommand::parse(line).inspect_err(|e| {
            tracing::warn!(uid = writer.uid, error = %e, "rejected control command");
        })?;
        self.run(writer, command).inspect_err(|e| {
            tracing::warn!(uid = writer.uid, program = %writer.program, error = %e, "control command failed");
        })
    }

    /// Run an already parsed command as `writer`.
    ///
    /// # Errors
    ///
    /// Returns the execution error; engine state is unchanged.
    pub fn run(&self, writer: &Writer, command: ControlCommand) -> ControlResult<String> {
        match command {
            ControlCommand::Add(policy) => {
                let index = self.engine.rules().append(policy)?;
                Ok(format!("added rule #{index}"))
            },
            ControlCommand::Delete(index) => {
                self.engine.rules().delete(index)?;
                Ok(format!("deleted rule #{index}"))
            },
            ControlCommand::List => Ok(self.engine.rules().list().join("\n")),
            ControlCommand::Apply(path) => {
                let policies = load_policy_file(&path)?;
                let count = self.engine.rules().apply(policies)?;
                Ok(format!("applied {count} rules"))
            },
            ControlCommand::Register { handle, owner_uid } => {
                self.authorize_endpoint_admin(writer, owner_uid)?;
                self.engine.registry().register(handle, owner_uid);
                Ok(format!("registered {handle} for uid {owner_uid}"))
            },
            ControlCommand::Unregister(handle) => {
                let owner_uid = self
                    .engine
                    .registry()
                    .owner_of(handle)
                    .ok_or(ControlError::UnknownEndpoint { handle })?;
                self.authorize_endpoint_admin(writer, owner_uid)?;
                self.engine.registry().remove(handle);
                Ok(format!("unregistered {handle}"))
            },
            ControlCommand::Pending => Ok(self
                .engine
                .pending()
                .pending_for(writer.uid)
                .iter()
                .map(tlsm_approval::PendingInfo::channel_name)
                .collect::<Vec<_>>()
                .join("\n")),
            ControlCommand::Read(id) => Ok(self.engine.pending().read(id, writer.uid)?),
            ControlCommand::Answer { id, text } => {
                self.engine.pending().answer(id, writer.uid, &text)?;
                Ok(format!("answered {id}"))
            },
        }
    }

    /// Whether `program` may manage approver endpoints.
    #[must_use]
    pub fn is_trusted(&self, program: &str) -> bool {
        self.trusted.iter().any(|t| t == program)
    }

    fn authorize_endpoint_admin(&self, writer: &Writer, owner_uid: Uid) -> ControlResult<()> {
        if !self.is_trusted(&writer.program) {
            return Err(ControlError::Unauthorized {
                reason: format!("{} is not a trusted approver program", writer.program),
            });
        }
        if writer.uid != owner_uid && !self.engine.identity().is_privileged(writer.uid) {
            return Err(ControlError::Unauthorized {
                reason: format!("uid {} may not manage endpoints of uid {owner_uid}", writer.uid),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for ControlInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlInterface")
            .field("engine", &self.engine)
            .field("trusted", &self.trusted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::EngineSettings;
    use tlsm_approval::{ApprovalError, RequestSnapshot};
    use tlsm_core::{AccessRequest, Category, Operation, StatsTable};
    use tlsm_policy::PolicyError;
    use tlsm_test::{MockIdentity, RecordingNotifier, SAMPLE_POLICIES, write_policy_file};

    const DAEMON: &str = "/usr/bin/tlsmd";

    fn control() -> ControlInterface {
        let engine = DecisionEngine::new(
            Arc::new(MockIdentity::new()),
            Arc::new(RecordingNotifier::new()),
            EngineSettings::default(),
        );
        ControlInterface::new(Arc::new(engine), [DAEMON])
    }

    fn user() -> Writer {
        Writer::new(1000, DAEMON)
    }

    fn root() -> Writer {
        Writer::new(0, "/bin/sh")
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(ControlCommand::parse("list\n").unwrap(), ControlCommand::List);
        assert_eq!(ControlCommand::parse("delete 3").unwrap(), ControlCommand::Delete(3));
        assert_eq!(
            ControlCommand::parse("register 4242 1000").unwrap(),
            ControlCommand::Register {
                handle: EndpointHandle(4242),
                owner_uid: 1000
            }
        );
        assert_eq!(
            ControlCommand::parse("answer request_7 deny -5").unwrap(),
            ControlCommand::Answer {
                id: RequestId(7),
                text: "deny -5".to_owned()
            }
        );
        assert!(matches!(
            ControlCommand::parse("add /bin/cat deny open secret").unwrap(),
            ControlCommand::Add(_)
        ));
    }

    #[test]
    fn test_parse_rejects_bad_lines() {
        for line in ["", "frobnicate", "list all", "delete", "delete x", "register 1", "answer 1"] {
            assert!(
                matches!(ControlCommand::parse(line), Err(ControlError::Parse { .. })),
                "accepted {line:?}"
            );
        }
        assert!(matches!(
            ControlCommand::parse("add /bin/cat deny undefined x"),
            Err(ControlError::Policy(PolicyError::Parse { .. }))
        ));
    }

    #[test]
    fn test_add_delete_list() {
        let control = control();
        assert_eq!(control.execute(&user(), "add /bin/cat deny open secret").unwrap(), "added rule #0");
        assert_eq!(control.execute(&user(), "add /opt/app analyze").unwrap(), "added rule #1");
        assert_eq!(
            control.execute(&user(), "list").unwrap(),
            "rule #0 : /bin/cat deny open secret (hit count 0)\n\
             rule #1 : /opt/app analyze - - (hit count 0)"
        );
        assert_eq!(control.execute(&user(), "delete 0").unwrap(), "deleted rule #0");
        assert!(matches!(
            control.execute(&user(), "delete 5"),
            Err(ControlError::Policy(PolicyError::NotFound { index: 5 }))
        ));
        assert_eq!(control.engine().rules().len(), 1);
    }

    #[test]
    fn test_malformed_add_leaves_store_unchanged() {
        let control = control();
        assert!(control.execute(&user(), "add /bin/cat deny open").is_err());
        assert!(control.engine().rules().is_empty());
    }

    #[test]
    fn test_apply_policy_file() {
        let control = control();
        let (_dir, path) = write_policy_file(SAMPLE_POLICIES);
        let out = control
            .execute(&user(), &format!("apply {}", path.display()))
            .unwrap();
        assert_eq!(out, format!("applied {} rules", tlsm_test::SAMPLE_POLICY_COUNT));
    }

    #[test]
    fn test_apply_bad_file_admits_nothing() {
        let control = control();
        let (_dir, path) = write_policy_file("@/bin/cat\n=deny open x\n=bogus\n");
        assert!(matches!(
            control.execute(&user(), &format!("apply {}", path.display())),
            Err(ControlError::Policy(PolicyError::Conf { line: 3, .. }))
        ));
        assert!(control.engine().rules().is_empty());
    }

    #[test]
    fn test_register_requires_trusted_program() {
        let control = control();
        let err = control
            .execute(&Writer::new(1000, "/tmp/evil"), "register 4242 1000")
            .unwrap_err();
        assert!(matches!(err, ControlError::Unauthorized { .. }));
        assert!(control.engine().registry().is_empty());
    }

    #[test]
    fn test_register_other_uid_needs_privilege() {
        let control = control();
        assert!(matches!(
            control.execute(&user(), "register 4242 1001"),
            Err(ControlError::Unauthorized { .. })
        ));
        let root_daemon = Writer::new(0, DAEMON);
        assert_eq!(
            control.execute(&root_daemon, "register 4242 1001").unwrap(),
            "registered endpoint:4242 for uid 1001"
        );
        assert!(matches!(
            control.execute(&user(), "unregister 4242"),
            Err(ControlError::Unauthorized { .. })
        ));
        assert_eq!(
            control.execute(&root_daemon, "unregister 4242").unwrap(),
            "unregistered endpoint:4242"
        );
    }

    #[test]
    fn test_unregister_unknown_endpoint() {
        let control = control();
        assert!(matches!(
            control.execute(&user(), "unregister 99"),
            Err(ControlError::UnknownEndpoint { handle: EndpointHandle(99) })
        ));
    }

    fn file_request(control: &ControlInterface, owner: Option<Uid>) -> RequestId {
        let pending = control.engine().pending();
        let id = pending.next_id();
        let request = AccessRequest::new(Operation::FileOpen, "/etc/shadow").with_subject("/bin/cat");
        // The receiver is dropped; tests below only read or expect rejections.
        let _ = pending
            .register(id, RequestSnapshot::new(request, Category::Ask, owner, StatsTable::new()))
            .unwrap();
        id
    }

    #[test]
    fn test_pending_lists_only_own_requests() {
        let control = control();
        let mine = file_request(&control, Some(1000));
        let _theirs = file_request(&control, Some(1001));
        assert_eq!(
            control.execute(&user(), "pending").unwrap(),
            format!("user_1000/request_{}", mine.0)
        );
        assert_eq!(control.execute(&root(), "pending").unwrap(), "");
    }

    #[test]
    fn test_read_and_answer_require_ownership() {
        let control = control();
        let id = file_request(&control, Some(1000));
        let stranger = Writer::new(1001, DAEMON);
        assert!(matches!(
            control.execute(&stranger, &format!("read {}", id.0)),
            Err(ControlError::Approval(ApprovalError::Unauthorized { .. }))
        ));
        assert!(matches!(
            control.execute(&stranger, &format!("answer {} allow 0", id.0)),
            Err(ControlError::Approval(ApprovalError::Unauthorized { .. }))
        ));
        let text = control.execute(&user(), &format!("read {id}")).unwrap();
        assert!(text.contains("/bin/cat open /etc/shadow"));
    }

    #[test]
    fn test_answer_unknown_request() {
        let control = control();
        assert!(matches!(
            control.execute(&user(), "answer 999 allow 1"),
            Err(ControlError::Approval(ApprovalError::UnknownRequest { .. }))
        ));
    }
}
