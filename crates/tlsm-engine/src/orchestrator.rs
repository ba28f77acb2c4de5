//! The decision orchestrator.
//!
//! [`DecisionEngine::authorize`] is the single entry point of the
//! enforcement boundary. It resolves the caller, matches the request
//! against the rule store and dispatches on the matched category:
//!
//! | match | verdict | ledger |
//! |-------|---------|--------|
//! | none | allow | untouched |
//! | `allow` | allow | `total` |
//! | `deny` | deny | `total`, `deny`, score minus the deny penalty, rule hit |
//! | `ask`/`analyze`, privileged owner | allow | `total` |
//! | `ask`/`analyze` | approver's answer, deny on timeout | `total`, approver's delta; on deny also `deny` and rule hit |
//!
//! Nothing on this path returns an error. Failures inside a matched
//! `deny`/`ask`/`analyze` path end in a deny.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tlsm_approval::{
    AdjudicationOutcome, Adjudicator, ApproverNotifier, ApproverRegistry, DEFAULT_APPROVAL_TIMEOUT,
    DEFAULT_MAX_PENDING, PendingTable,
};
use tlsm_core::{AccessRequest, Category, IdentityResolver, TaskId, UNKNOWN_SUBJECT, Verdict};
use tlsm_policy::{DEFAULT_MAX_RULES, MatchedPolicy, RuleStore};

use crate::ledger::{INITIAL_SCORE, TrustLedger};

/// Default score penalty for a `deny` match.
pub const DEFAULT_DENY_PENALTY: u32 = 10;

/// Tunables of a [`DecisionEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// How long an approver has to answer.
    pub approval_timeout: Duration,
    /// Score subtracted on every `deny` match.
    pub deny_penalty: u32,
    /// Score new subjects start with.
    pub initial_score: u32,
    /// Rule store capacity.
    pub max_rules: usize,
    /// Maximum simultaneously pending requests.
    pub max_pending: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            approval_timeout: DEFAULT_APPROVAL_TIMEOUT,
            deny_penalty: DEFAULT_DENY_PENALTY,
            initial_score: INITIAL_SCORE,
            max_rules: DEFAULT_MAX_RULES,
            max_pending: DEFAULT_MAX_PENDING,
        }
    }
}

/// Why a decision came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// No rule matched.
    NoMatch,
    /// An `allow` rule matched.
    AllowRule,
    /// A `deny` rule matched.
    DenyRule,
    /// An interactive rule matched but the caller's owner is privileged.
    PrivilegedBypass,
    /// An approver answered.
    Answered,
    /// No answer arrived in time.
    TimedOut,
    /// The approver's answer did not parse.
    MalformedAnswer,
    /// The pending request could not be filed.
    Unregistered,
}

impl From<AdjudicationOutcome> for DecisionReason {
    fn from(outcome: AdjudicationOutcome) -> Self {
        match outcome {
            AdjudicationOutcome::Answered => Self::Answered,
            AdjudicationOutcome::TimedOut => Self::TimedOut,
            AdjudicationOutcome::MalformedAnswer => Self::MalformedAnswer,
            AdjudicationOutcome::Unregistered => Self::Unregistered,
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NoMatch => "no rule matched",
            Self::AllowRule => "allow rule",
            Self::DenyRule => "deny rule",
            Self::PrivilegedBypass => "privileged owner bypasses approval",
            Self::Answered => "approver answered",
            Self::TimedOut => "approval timed out",
            Self::MalformedAnswer => "malformed approver answer",
            Self::Unregistered => "approval channel unavailable",
        };
        f.write_str(text)
    }
}

/// The rule a decision was based on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedRule {
    /// Position of the rule at match time.
    pub index: usize,
    /// The rule's category.
    pub category: Category,
    /// The rule in its textual form.
    pub rule: String,
}

impl From<&MatchedPolicy> for MatchedRule {
    fn from(m: &MatchedPolicy) -> Self {
        Self {
            index: m.index,
            category: m.policy.category,
            rule: m.policy.to_string(),
        }
    }
}

/// A verdict with the facts that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    /// The verdict.
    pub verdict: Verdict,
    /// Why.
    pub reason: DecisionReason,
    /// The first matching rule, if any.
    pub matched: Option<MatchedRule>,
    /// Resolved subject of the caller.
    pub subject: String,
    /// Score adjustment applied to the ledger.
    pub score_delta: i64,
    /// Caller's score after the decision.
    pub score: u32,
    /// Id of the pending request, for interactive decisions.
    pub request_id: Option<u64>,
}

/// Decision orchestrator and owner of the engine's shared state.
///
/// # Example
///
/// ```rust,ignore
/// let engine = DecisionEngine::new(identity, notifier, EngineSettings::default());
/// engine.rules().append(Policy::parse("/bin/nc deny connect any")?)?;
/// let verdict = engine
///     .authorize(task, AccessRequest::new(Operation::SocketConnect, "10.0.0.1:443"))
///     .await;
/// ```
pub struct DecisionEngine {
    rules: Arc<RuleStore>,
    ledger: Arc<TrustLedger>,
    adjudicator: Arc<Adjudicator>,
    identity: Arc<dyn IdentityResolver>,
    settings: EngineSettings,
}

impl DecisionEngine {
    /// Create an engine with an empty rule store and ledger.
    #[must_use]
    pub fn new(
        identity: Arc<dyn IdentityResolver>,
        notifier: Arc<dyn ApproverNotifier>,
        settings: EngineSettings,
    ) -> Self {
        let adjudicator = Adjudicator::new(
            Arc::new(PendingTable::with_capacity(settings.max_pending)),
            Arc::new(ApproverRegistry::new()),
            notifier,
        )
        .with_timeout(settings.approval_timeout);
        Self {
            rules: Arc::new(RuleStore::with_capacity(settings.max_rules)),
            ledger: Arc::new(TrustLedger::with_initial_score(settings.initial_score)),
            adjudicator: Arc::new(adjudicator),
            identity,
            settings,
        }
    }

    /// The rule store.
    #[must_use]
    pub fn rules(&self) -> &Arc<RuleStore> {
        &self.rules
    }

    /// The trust ledger.
    #[must_use]
    pub fn ledger(&self) -> &Arc<TrustLedger> {
        &self.ledger
    }

    /// The interactive adjudicator.
    #[must_use]
    pub fn adjudicator(&self) -> &Arc<Adjudicator> {
        &self.adjudicator
    }

    /// Pending requests awaiting an approver.
    #[must_use]
    pub fn pending(&self) -> &Arc<PendingTable> {
        self.adjudicator.pending()
    }

    /// Registered approvers.
    #[must_use]
    pub fn registry(&self) -> &Arc<ApproverRegistry> {
        self.adjudicator.registry()
    }

    /// The caller identity resolver.
    #[must_use]
    pub fn identity(&self) -> &Arc<dyn IdentityResolver> {
        &self.identity
    }

    /// The engine's settings.
    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Decide whether `task` may perform `request`.
    pub async fn authorize(&self, task: TaskId, request: AccessRequest) -> Verdict {
        self.evaluate(task, request).await.verdict
    }

    /// Decide whether `task` may perform `request`, reporting why.
    pub async fn evaluate(&self, task: TaskId, mut request: AccessRequest) -> Decision {
        request.subject = self
            .identity
            .subject_path(task)
            .unwrap_or_else(|| UNKNOWN_SUBJECT.to_owned());
        let entry = self.ledger.entry(task);
        request.score = entry.score;

        let Some(matched) = self.rules.find_match(&request) else {
            return Decision {
                verdict: Verdict::Allow,
                reason: DecisionReason::NoMatch,
                matched: None,
                subject: request.subject,
                score_delta: 0,
                score: entry.score,
                request_id: None,
            };
        };

        let operation = request.operation;
        let rule = MatchedRule::from(&matched);
        let policy = &matched.policy;

        let (verdict, reason, score_delta, request_id) = match policy.category {
            Category::Allow => (Verdict::Allow, DecisionReason::AllowRule, 0, None),
            Category::Deny => {
                let delta = 0_i64.saturating_sub(i64::from(self.settings.deny_penalty));
                (Verdict::Deny, DecisionReason::DenyRule, delta, None)
            },
            Category::Ask | Category::Analyze => {
                let owner_uid = self.identity.owner_uid(task);
                if owner_uid.is_some_and(|uid| self.identity.is_privileged(uid)) {
                    tracing::debug!(%task, subject = %request.subject, "privileged owner, approval bypassed");
                    (Verdict::Allow, DecisionReason::PrivilegedBypass, 0, None)
                } else {
                    let adjudication = self
                        .adjudicator
                        .adjudicate(policy.category, request.clone(), owner_uid, entry.stats)
                        .await;
                    (
                        adjudication.verdict,
                        adjudication.outcome.into(),
                        adjudication.score_delta,
                        adjudication.request_id.map(|id| id.0),
                    )
                }
            },
        };

        let denied = verdict.is_denied();
        if denied {
            policy.record_hit();
        }
        let after = self.ledger.apply(task, operation, denied, score_delta);

        tracing::debug!(
            %task,
            subject = %request.subject,
            operation = %operation,
            object = %request.object,
            index = matched.index,
            %verdict,
            %reason,
            score = after.score,
            "request decided"
        );

        Decision {
            verdict,
            reason,
            matched: Some(rule),
            subject: request.subject,
            score_delta,
            score: after.score,
            request_id,
        }
    }
}

impl fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("rules", &self.rules)
            .field("ledger", &self.ledger.len())
            .field("adjudicator", &self.adjudicator)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
