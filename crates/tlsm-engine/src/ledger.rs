//! Per-subject trust score and operation counters.
//!
//! The ledger is a side table keyed by [`TaskId`]. Entries are created on
//! first use with the initial score and live until [`TrustLedger::release`]
//! is called for the task.

use dashmap::DashMap;
use serde::Serialize;

use tlsm_core::{Operation, StatsTable, TaskId};

/// Score every subject starts with.
pub const INITIAL_SCORE: u32 = 100;

/// Apply `delta` to `current` without wrapping.
///
/// A negative delta clamps at zero. A positive delta that would overflow
/// leaves the score unchanged.
///
/// ```
/// use tlsm_engine::score_update;
///
/// assert_eq!(score_update(100, -1000), 0);
/// assert_eq!(score_update(u32::MAX, 1), u32::MAX);
/// assert_eq!(score_update(u32::MAX - 1, 5), u32::MAX - 1);
/// assert_eq!(score_update(90, 10), 100);
/// ```
#[must_use]
pub fn score_update(current: u32, delta: i64) -> u32 {
    if delta < 0 {
        let magnitude = u32::try_from(delta.unsigned_abs()).unwrap_or(u32::MAX);
        current.saturating_sub(magnitude)
    } else {
        u32::try_from(delta)
            .ok()
            .and_then(|d| current.checked_add(d))
            .unwrap_or(current)
    }
}

/// One subject's ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrustEntry {
    /// Current trust score.
    pub score: u32,
    /// Per-operation counters.
    pub stats: StatsTable,
}

impl TrustEntry {
    /// Create an entry with `score` and zeroed counters.
    #[must_use]
    pub fn new(score: u32) -> Self {
        Self {
            score,
            stats: StatsTable::new(),
        }
    }
}

/// Process-wide trust ledger.
#[derive(Debug)]
pub struct TrustLedger {
    entries: DashMap<TaskId, TrustEntry>,
    initial_score: u32,
}

impl TrustLedger {
    /// Create an empty ledger starting subjects at [`INITIAL_SCORE`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_initial_score(INITIAL_SCORE)
    }

    /// Create an empty ledger starting subjects at `initial_score`.
    #[must_use]
    pub fn with_initial_score(initial_score: u32) -> Self {
        Self {
            entries: DashMap::new(),
            initial_score,
        }
    }

    /// Score new entries start with.
    #[must_use]
    pub fn initial_score(&self) -> u32 {
        self.initial_score
    }

    /// Copy of the entry for `task`, creating it if absent.
    #[must_use]
    pub fn entry(&self, task: TaskId) -> TrustEntry {
        *self
            .entries
            .entry(task)
            .or_insert_with(|| TrustEntry::new(self.initial_score))
    }

    /// Copy of the entry for `task`, if one exists.
    #[must_use]
    pub fn get(&self, task: TaskId) -> Option<TrustEntry> {
        self.entries.get(&task).map(|e| *e)
    }

    /// Record one adjudication and apply its score delta as a single step.
    ///
    /// Returns the entry as it stands afterwards.
    pub fn apply(&self, task: TaskId, operation: Operation, denied: bool, delta: i64) -> TrustEntry {
        self.with_entry(task, |entry| {
            entry.stats.record(operation, denied);
            entry.score = score_update(entry.score, delta);
            *entry
        })
    }

    /// Run `f` on the entry for `task` while holding its lock.
    fn with_entry<R>(&self, task: TaskId, f: impl FnOnce(&mut TrustEntry) -> R) -> R {
        let mut entry = self
            .entries
            .entry(task)
            .or_insert_with(|| TrustEntry::new(self.initial_score));
        f(&mut entry)
    }

    /// Drop the entry of a terminated task.
    ///
    /// Returns the final entry, if there was one.
    pub fn release(&self, task: TaskId) -> Option<TrustEntry> {
        let released = self.entries.remove(&task).map(|(_, entry)| entry);
        if released.is_some() {
            tracing::debug!(%task, "ledger entry released");
        }
        released
    }

    /// Number of tracked tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no task is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TrustLedger {
    fn default() -> Self {
        Self::new()
    }
}
