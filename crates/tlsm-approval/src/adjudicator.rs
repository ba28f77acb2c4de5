//! Bounded interactive adjudication.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tlsm_core::{AccessRequest, Category, StatsTable, Uid, Verdict};

use crate::notifier::ApproverNotifier;
use crate::pending::{PendingTable, RequestId, RequestSnapshot};
use crate::registry::ApproverRegistry;

/// Default time an approver has to answer.
pub const DEFAULT_APPROVAL_TIMEOUT: Duration = Duration::from_secs(20);

/// How an adjudication was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjudicationOutcome {
    /// An approver answered in time.
    Answered,
    /// The timeout elapsed first.
    TimedOut,
    /// The approver wrote an answer that did not parse.
    MalformedAnswer,
    /// The request could not be filed (channel closed or table full).
    Unregistered,
}

impl fmt::Display for AdjudicationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Answered => f.write_str("answered"),
            Self::TimedOut => f.write_str("timed out"),
            Self::MalformedAnswer => f.write_str("malformed answer"),
            Self::Unregistered => f.write_str("unregistered"),
        }
    }
}

/// Result of one interactive adjudication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjudication {
    /// The verdict to return.
    pub verdict: Verdict,
    /// Trust score adjustment chosen by the approver (zero unless answered).
    pub score_delta: i64,
    /// Id of the pending request, if one was filed.
    pub request_id: Option<RequestId>,
    /// How the wait ended.
    pub outcome: AdjudicationOutcome,
}

impl Adjudication {
    fn deny(request_id: Option<RequestId>, outcome: AdjudicationOutcome) -> Self {
        Self {
            verdict: Verdict::Deny,
            score_delta: 0,
            request_id,
            outcome,
        }
    }
}

/// Removes the pending entry when the adjudicating future finishes or is
/// dropped.
struct ReclaimGuard<'a> {
    pending: &'a PendingTable,
    id: RequestId,
}

impl Drop for ReclaimGuard<'_> {
    fn drop(&mut self) {
        if self.pending.reclaim(self.id).is_some() {
            tracing::trace!(request_id = %self.id, "pending request reclaimed");
        }
    }
}

/// Runs the interactive approval protocol for `ask` and `analyze` matches.
pub struct Adjudicator {
    pending: Arc<PendingTable>,
    registry: Arc<ApproverRegistry>,
    notifier: Arc<dyn ApproverNotifier>,
    timeout: Duration,
}

impl Adjudicator {
    /// Create an adjudicator with the [`DEFAULT_APPROVAL_TIMEOUT`].
    #[must_use]
    pub fn new(
        pending: Arc<PendingTable>,
        registry: Arc<ApproverRegistry>,
        notifier: Arc<dyn ApproverNotifier>,
    ) -> Self {
        Self {
            pending,
            registry,
            notifier,
            timeout: DEFAULT_APPROVAL_TIMEOUT,
        }
    }

    /// Set the approval timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The pending-request table approvers answer through.
    #[must_use]
    pub fn pending(&self) -> &Arc<PendingTable> {
        &self.pending
    }

    /// The approver registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ApproverRegistry> {
        &self.registry
    }

    /// Ask the caller's approver about `request` and wait for the answer.
    ///
    /// `owner_uid` selects the approver; `None` means no approver is looked
    /// up and the wait simply runs out. `stats` is the caller's counters at
    /// request time and is shown to the approver.
    ///
    /// Never fails: every failure mode resolves to a zero-delta deny.
    pub async fn adjudicate(
        &self,
        category: Category,
        mut request: AccessRequest,
        owner_uid: Option<Uid>,
        stats: StatsTable,
    ) -> Adjudication {
        request.supervised = true;
        let id = self.pending.next_id();
        let snapshot = RequestSnapshot::new(request, category, owner_uid, stats);

        let receiver = match self.pending.register(id, snapshot) {
            Ok(rx) => rx,
            Err(e) => {
                tracing::warn!(request_id = %id, error = %e, "cannot file pending request, denying");
                return Adjudication::deny(None, AdjudicationOutcome::Unregistered);
            },
        };
        let _reclaim = ReclaimGuard {
            pending: &self.pending,
            id,
        };

        self.wake_approver(id, owner_uid);

        match tokio::time::timeout(self.timeout, receiver).await {
            Ok(Ok(Some(answer))) => {
                tracing::info!(
                    request_id = %id,
                    allow = answer.allow,
                    score_delta = answer.score_delta,
                    "approver answered"
                );
                Adjudication {
                    verdict: Verdict::from_allowed(answer.allow),
                    score_delta: answer.score_delta,
                    request_id: Some(id),
                    outcome: AdjudicationOutcome::Answered,
                }
            },
            Ok(Ok(None)) => {
                tracing::warn!(request_id = %id, "malformed answer, denying");
                Adjudication::deny(Some(id), AdjudicationOutcome::MalformedAnswer)
            },
            // The responder lives in the table until we reclaim, so a closed
            // channel only happens if the entry vanished underneath us.
            Ok(Err(_)) => {
                tracing::warn!(request_id = %id, "answer channel dropped, denying");
                Adjudication::deny(Some(id), AdjudicationOutcome::TimedOut)
            },
            Err(_) => {
                tracing::warn!(
                    request_id = %id,
                    timeout_secs = self.timeout.as_secs(),
                    "approval timed out, denying"
                );
                Adjudication::deny(Some(id), AdjudicationOutcome::TimedOut)
            },
        }
    }

    fn wake_approver(&self, id: RequestId, owner_uid: Option<Uid>) {
        let Some(uid) = owner_uid else {
            tracing::debug!(request_id = %id, "caller owner unknown, no approver to wake");
            return;
        };
        let Some(endpoint) = self.registry.find_live(uid, self.notifier.as_ref()) else {
            tracing::debug!(request_id = %id, owner_uid = uid, "no live approver");
            return;
        };
        match self.notifier.notify(endpoint.handle, id) {
            Ok(()) => self.pending.mark_notified(id),
            Err(e) => tracing::warn!(request_id = %id, error = %e, "approver notification failed"),
        }
    }
}

impl fmt::Debug for Adjudicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adjudicator")
            .field("pending", &self.pending)
            .field("registry", &self.registry)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
