//! Pending requests and the per-request answer channel.
//!
//! Each pending request is a named duplex channel (`user_<uid>/request_<id>`):
//! reading it renders the [`RequestSnapshot`], writing it delivers an
//! [`Answer`] to the caller blocked in the adjudicator.
//!
//! The table owns the single-use responder for every entry. Answering takes
//! the responder out under the table lock, so at most one answer is ever
//! delivered; reclaiming removes the entry, and only the adjudicator that
//! created it reclaims.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

use tlsm_core::{AccessRequest, Category, StatsTable, Uid};

use crate::error::{ApprovalError, ApprovalResult};

/// Default maximum number of simultaneously pending requests.
pub const DEFAULT_MAX_PENDING: usize = 1024;

/// Process-wide identifier of a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request_{}", self.0)
    }
}

/// Accepts `7` or `request_7`.
impl FromStr for RequestId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("request_").unwrap_or(s);
        digits.parse().map(Self)
    }
}

/// An approver's answer to one pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Answer {
    /// Whether the operation may proceed.
    pub allow: bool,
    /// Adjustment to the subject's trust score.
    pub score_delta: i64,
}

impl Answer {
    /// An allowing answer.
    #[must_use]
    pub fn allow(score_delta: i64) -> Self {
        Self {
            allow: true,
            score_delta,
        }
    }

    /// A denying answer.
    #[must_use]
    pub fn deny(score_delta: i64) -> Self {
        Self {
            allow: false,
            score_delta,
        }
    }
}

/// Parses `allow|deny [score_delta]`; a missing delta is zero.
impl FromStr for Answer {
    type Err = ApprovalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ApprovalError::MalformedAnswer {
            input: s.trim_end().to_owned(),
        };
        let mut words = s.split_whitespace();
        let allow = match words.next() {
            Some("allow") => true,
            Some("deny") => false,
            _ => return Err(malformed()),
        };
        let score_delta = match words.next() {
            Some(word) => word.parse::<i64>().map_err(|_| malformed())?,
            None => 0,
        };
        if words.next().is_some() {
            return Err(malformed());
        }
        Ok(Self { allow, score_delta })
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = if self.allow { "allow" } else { "deny" };
        write!(f, "{word} {}", self.score_delta)
    }
}

/// Everything an approver sees about a pending request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSnapshot {
    /// Copy of the triggering request.
    pub request: AccessRequest,
    /// Category of the rule that asked for approval.
    pub category: Category,
    /// Owning user of the caller, if it could be resolved.
    pub owner_uid: Option<Uid>,
    /// The caller's per-operation counters at request time.
    pub stats: StatsTable,
    /// When the request was filed.
    pub created_at: DateTime<Utc>,
}

impl RequestSnapshot {
    /// Create a snapshot stamped with the current time.
    #[must_use]
    pub fn new(
        request: AccessRequest,
        category: Category,
        owner_uid: Option<Uid>,
        stats: StatsTable,
    ) -> Self {
        Self {
            request,
            category,
            owner_uid,
            stats,
            created_at: Utc::now(),
        }
    }

    /// Render the text an approver reads from the answer channel:
    ///
    /// ```text
    /// <supervised 0|1> <score>
    /// <subject> <operation> <object>
    /// <deny> <total>        (one line per operation, table order)
    /// ```
    #[must_use]
    pub fn render(&self) -> String {
        let r = &self.request;
        let mut out = format!(
            "{} {}\n{} {} {}\n",
            u8::from(r.supervised),
            r.score,
            r.subject,
            r.operation,
            r.object
        );
        for (_, stats) in self.stats.iter() {
            let _ = writeln!(out, "{} {}", stats.deny, stats.total);
        }
        out
    }
}

/// Lifecycle position of a pending request.
///
/// `Created → Notified → Answered`; `Notified` is skipped when no approver
/// was reachable. Timed-out entries are reclaimed directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingState {
    /// Filed, no approver woken yet.
    Created,
    /// An approver was woken.
    Notified,
    /// An answer was delivered (or rejected as malformed).
    Answered,
}

impl fmt::Display for PendingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Notified => f.write_str("notified"),
            Self::Answered => f.write_str("answered"),
        }
    }
}

/// Summary of one pending request for listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInfo {
    /// Request id.
    pub id: RequestId,
    /// Owning user of the caller.
    pub owner_uid: Option<Uid>,
    /// Lifecycle position.
    pub state: PendingState,
    /// When the request was filed.
    pub created_at: DateTime<Utc>,
}

impl PendingInfo {
    /// Channel name, `user_<uid>/request_<id>`.
    #[must_use]
    pub fn channel_name(&self) -> String {
        match self.owner_uid {
            Some(uid) => format!("user_{uid}/{}", self.id),
            None => format!("user_unknown/{}", self.id),
        }
    }
}

struct PendingSlot {
    snapshot: RequestSnapshot,
    state: PendingState,
    responder: Option<oneshot::Sender<Option<Answer>>>,
}

/// The set of requests awaiting an approver's answer.
///
/// # Example
///
/// ```
/// use tlsm_approval::{PendingTable, RequestSnapshot};
/// use tlsm_core::{AccessRequest, Category, Operation, StatsTable};
///
/// let table = PendingTable::new();
/// let id = table.next_id();
/// let snapshot = RequestSnapshot::new(
///     AccessRequest::new(Operation::FileOpen, "/etc/shadow"),
///     Category::Ask,
///     Some(1000),
///     StatsTable::new(),
/// );
/// let _receiver = table.register(id, snapshot).unwrap();
/// assert!(table.contains(id));
/// table.reclaim(id);
/// assert!(!table.contains(id));
/// ```
pub struct PendingTable {
    next_id: AtomicU64,
    open: AtomicBool,
    capacity: usize,
    slots: Mutex<HashMap<RequestId, PendingSlot>>,
}

impl PendingTable {
    /// Create an open table admitting up to [`DEFAULT_MAX_PENDING`] requests.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_PENDING)
    }

    /// Create an open table admitting up to `capacity` requests.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            open: AtomicBool::new(true),
            capacity,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<RequestId, PendingSlot>> {
        self.slots.lock().unwrap_or_else(|e| {
            tracing::warn!("PendingTable lock poisoned, recovering");
            PoisonError::into_inner(e)
        })
    }

    /// Allocate the next request id. Ids are strictly increasing.
    pub fn next_id(&self) -> RequestId {
        RequestId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// File a request and hand back the receiving end of its answer.
    ///
    /// The receiver yields `Some(answer)` for a well-formed answer and
    /// `None` for a malformed one.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::ChannelClosed`] if the table is closed and
    /// [`ApprovalError::Exhausted`] if it is full.
    pub fn register(
        &self,
        id: RequestId,
        snapshot: RequestSnapshot,
    ) -> ApprovalResult<oneshot::Receiver<Option<Answer>>> {
        if !self.is_open() {
            return Err(ApprovalError::ChannelClosed);
        }
        let mut slots = self.slots();
        if slots.len() >= self.capacity {
            return Err(ApprovalError::Exhausted {
                capacity: self.capacity,
            });
        }
        let (tx, rx) = oneshot::channel();
        slots.insert(
            id,
            PendingSlot {
                snapshot,
                state: PendingState::Created,
                responder: Some(tx),
            },
        );
        Ok(rx)
    }

    /// Record that an approver was woken for `id`.
    pub fn mark_notified(&self, id: RequestId) {
        if let Some(slot) = self.slots().get_mut(&id)
            && slot.state == PendingState::Created
        {
            slot.state = PendingState::Notified;
        }
    }

    /// Render the snapshot of `id` for `reader`.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::UnknownRequest`] if `id` is not pending and
    /// [`ApprovalError::Unauthorized`] if `reader` does not own it.
    pub fn read(&self, id: RequestId, reader: Uid) -> ApprovalResult<String> {
        let slots = self.slots();
        let slot = slots
            .get(&id)
            .ok_or(ApprovalError::UnknownRequest { id })?;
        check_owner(&slot.snapshot, id, reader)?;
        Ok(slot.snapshot.render())
    }

    /// Deliver `text` as the answer to `id`, written by `writer`.
    ///
    /// A malformed answer still resolves the wait (the caller sees no
    /// answer and denies) and is reported back as
    /// [`ApprovalError::MalformedAnswer`]. Any answer arriving after the
    /// caller stopped waiting is reported as [`ApprovalError::Expired`].
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::UnknownRequest`], [`ApprovalError::Unauthorized`],
    /// [`ApprovalError::AlreadyAnswered`], [`ApprovalError::Expired`] or
    /// [`ApprovalError::MalformedAnswer`].
    pub fn answer(&self, id: RequestId, writer: Uid, text: &str) -> ApprovalResult<Answer> {
        let parsed = text.parse::<Answer>();
        let responder = {
            let mut slots = self.slots();
            let slot = slots
                .get_mut(&id)
                .ok_or(ApprovalError::UnknownRequest { id })?;
            check_owner(&slot.snapshot, id, writer)?;
            let responder = slot
                .responder
                .take()
                .ok_or(ApprovalError::AlreadyAnswered { id })?;
            slot.state = PendingState::Answered;
            responder
        };

        match parsed {
            Ok(answer) => {
                responder
                    .send(Some(answer))
                    .map_err(|_| ApprovalError::Expired { id })?;
                tracing::debug!(request_id = %id, %answer, "answer delivered");
                Ok(answer)
            },
            Err(e) => {
                responder
                    .send(None)
                    .map_err(|_| ApprovalError::Expired { id })?;
                tracing::warn!(request_id = %id, input = %text.trim_end(), "malformed answer");
                Err(e)
            },
        }
    }

    /// Remove `id`, releasing its snapshot.
    ///
    /// Returns the snapshot if the entry was still present.
    pub fn reclaim(&self, id: RequestId) -> Option<RequestSnapshot> {
        self.slots().remove(&id).map(|slot| slot.snapshot)
    }

    /// Whether `id` is pending.
    #[must_use]
    pub fn contains(&self, id: RequestId) -> bool {
        self.slots().contains_key(&id)
    }

    /// Lifecycle position of `id`, if pending.
    #[must_use]
    pub fn state(&self, id: RequestId) -> Option<PendingState> {
        self.slots().get(&id).map(|slot| slot.state)
    }

    /// Pending requests owned by `uid`, oldest first.
    #[must_use]
    pub fn pending_for(&self, uid: Uid) -> Vec<PendingInfo> {
        let mut infos: Vec<PendingInfo> = self
            .slots()
            .iter()
            .filter(|(_, slot)| slot.snapshot.owner_uid == Some(uid))
            .map(|(id, slot)| PendingInfo {
                id: *id,
                owner_uid: slot.snapshot.owner_uid,
                state: slot.state,
                created_at: slot.snapshot.created_at,
            })
            .collect();
        infos.sort_by_key(|info| info.id);
        infos
    }

    /// Number of pending requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    /// Whether no request is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }

    /// Whether new requests are accepted.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Stop accepting new requests. Requests already pending are unaffected.
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
    }

    /// Accept new requests again.
    pub fn reopen(&self) {
        self.open.store(true, Ordering::Release);
    }
}

impl Default for PendingTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PendingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTable")
            .field("pending", &self.len())
            .field("capacity", &self.capacity)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

fn check_owner(snapshot: &RequestSnapshot, id: RequestId, caller: Uid) -> ApprovalResult<()> {
    if snapshot.owner_uid == Some(caller) {
        Ok(())
    } else {
        Err(ApprovalError::Unauthorized {
            reason: format!("uid {caller} does not own {id}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tlsm_core::Operation;

    fn snapshot(owner: Option<Uid>) -> RequestSnapshot {
        let mut request =
            AccessRequest::new(Operation::FileOpen, "/etc/shadow").with_subject("/bin/cat");
        request.supervised = true;
        request.score = 90;
        RequestSnapshot::new(request, Category::Ask, owner, StatsTable::new())
    }

    #[test]
    fn test_answer_parse() {
        assert_eq!("allow 5".parse::<Answer>().unwrap(), Answer::allow(5));
        assert_eq!("deny -10\n".parse::<Answer>().unwrap(), Answer::deny(-10));
        assert_eq!("allow".parse::<Answer>().unwrap(), Answer::allow(0));
    }

    #[test]
    fn test_answer_parse_rejects_garbage() {
        for text in ["", "yes", "allow x", "deny 1 2", "0", "ALLOW 1"] {
            assert!(text.parse::<Answer>().is_err(), "accepted {text:?}");
        }
    }

    #[test]
    fn test_request_id_parse() {
        assert_eq!("7".parse::<RequestId>().unwrap(), RequestId(7));
        assert_eq!("request_7".parse::<RequestId>().unwrap(), RequestId(7));
        assert!("req7".parse::<RequestId>().is_err());
    }

    #[test]
    fn test_ids_strictly_increase() {
        let table = PendingTable::new();
        let a = table.next_id();
        let b = table.next_id();
        assert!(b > a);
    }

    #[test]
    fn test_render_format() {
        let mut snap = snapshot(Some(1000));
        snap.stats.record(Operation::FileOpen, true);
        snap.stats.record(Operation::FileOpen, false);
        assert_eq!(
            snap.render(),
            "1 90\n/bin/cat open /etc/shadow\n1 2\n0 0\n0 0\n0 0\n0 0\n"
        );
    }

    #[test]
    fn test_register_refused_when_closed() {
        let table = PendingTable::new();
        table.close();
        let id = table.next_id();
        assert_eq!(
            table.register(id, snapshot(Some(1))).unwrap_err(),
            ApprovalError::ChannelClosed
        );
        table.reopen();
        assert!(table.register(id, snapshot(Some(1))).is_ok());
    }

    #[test]
    fn test_register_refused_when_full() {
        let table = PendingTable::with_capacity(1);
        let _rx = table.register(table.next_id(), snapshot(Some(1))).unwrap();
        assert!(matches!(
            table.register(table.next_id(), snapshot(Some(1))),
            Err(ApprovalError::Exhausted { capacity: 1 })
        ));
    }

    #[tokio::test]
    async fn test_answer_wakes_receiver() {
        let table = PendingTable::new();
        let id = table.next_id();
        let rx = table.register(id, snapshot(Some(1000))).unwrap();
        let answer = table.answer(id, 1000, "allow 3").unwrap();
        assert_eq!(answer, Answer::allow(3));
        assert_eq!(rx.await.unwrap(), Some(Answer::allow(3)));
        assert_eq!(table.state(id), Some(PendingState::Answered));
    }

    #[tokio::test]
    async fn test_malformed_answer_wakes_with_none() {
        let table = PendingTable::new();
        let id = table.next_id();
        let rx = table.register(id, snapshot(Some(1000))).unwrap();
        assert!(matches!(
            table.answer(id, 1000, "maybe"),
            Err(ApprovalError::MalformedAnswer { .. })
        ));
        assert_eq!(rx.await.unwrap(), None);
    }

    #[test]
    fn test_second_answer_rejected() {
        let table = PendingTable::new();
        let id = table.next_id();
        let _rx = table.register(id, snapshot(Some(1000))).unwrap();
        table.answer(id, 1000, "deny 0").unwrap();
        assert_eq!(
            table.answer(id, 1000, "allow 0").unwrap_err(),
            ApprovalError::AlreadyAnswered { id }
        );
    }

    #[test]
    fn test_answer_from_other_uid_rejected() {
        let table = PendingTable::new();
        let id = table.next_id();
        let _rx = table.register(id, snapshot(Some(1000))).unwrap();
        assert!(matches!(
            table.answer(id, 1001, "allow 0"),
            Err(ApprovalError::Unauthorized { .. })
        ));
        assert!(matches!(table.read(id, 1001), Err(ApprovalError::Unauthorized { .. })));
        // The rejected write left the request answerable.
        assert!(table.answer(id, 1000, "allow 0").is_ok());
    }

    #[test]
    fn test_answer_after_receiver_dropped_is_expired() {
        let table = PendingTable::new();
        let id = table.next_id();
        let rx = table.register(id, snapshot(Some(1000))).unwrap();
        drop(rx);
        assert_eq!(
            table.answer(id, 1000, "allow 0").unwrap_err(),
            ApprovalError::Expired { id }
        );
    }

    #[test]
    fn test_malformed_answer_after_receiver_dropped_is_expired() {
        let table = PendingTable::new();
        let id = table.next_id();
        let rx = table.register(id, snapshot(Some(1000))).unwrap();
        drop(rx);
        assert_eq!(
            table.answer(id, 1000, "maybe").unwrap_err(),
            ApprovalError::Expired { id }
        );
        assert_eq!(table.state(id), Some(PendingState::Answered));
    }

    #[test]
    fn test_reclaim_releases_entry() {
        let table = PendingTable::new();
        let id = table.next_id();
        let _rx = table.register(id, snapshot(Some(1000))).unwrap();
        assert!(table.reclaim(id).is_some());
        assert!(table.reclaim(id).is_none());
        assert!(matches!(
            table.answer(id, 1000, "allow 0"),
            Err(ApprovalError::UnknownRequest { .. })
        ));
    }

    #[test]
    fn test_pending_for_filters_by_owner() {
        let table = PendingTable::new();
        let a = table.next_id();
        let b = table.next_id();
        let c = table.next_id();
        let _ra = table.register(a, snapshot(Some(1000))).unwrap();
        let _rb = table.register(b, snapshot(Some(1001))).unwrap();
        let _rc = table.register(c, snapshot(Some(1000))).unwrap();
        table.mark_notified(c);
        let mine = table.pending_for(1000);
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].id, a);
        assert_eq!(mine[1].state, PendingState::Notified);
        assert_eq!(mine[1].channel_name(), format!("user_1000/request_{}", c.0));
    }
}
