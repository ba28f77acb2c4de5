//! Per-operation request counters.

use serde::{Deserialize, Serialize};

use crate::operation::Operation;

/// Counters for one operation kind.
///
/// Invariant: `deny <= total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationStats {
    /// Requests that reached a rule other than the implicit allow.
    pub total: u64,
    /// Of those, requests that ended in a deny.
    pub deny: u64,
}

impl OperationStats {
    /// Count one adjudicated request.
    pub fn record(&mut self, denied: bool) {
        self.total = self.total.saturating_add(1);
        if denied {
            self.deny = self.deny.saturating_add(1).min(self.total);
        }
    }
}

/// Counters for every operation kind, indexed by [`Operation::index`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsTable {
    entries: [OperationStats; Operation::COUNT],
}

impl StatsTable {
    /// Create a table with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one adjudicated request for `operation`.
    pub fn record(&mut self, operation: Operation, denied: bool) {
        if let Some(entry) = self.entries.get_mut(operation.index()) {
            entry.record(denied);
        }
    }

    /// Counters for one operation.
    #[must_use]
    pub fn get(&self, operation: Operation) -> OperationStats {
        self.entries
            .get(operation.index())
            .copied()
            .unwrap_or_default()
    }

    /// Iterate `(operation, counters)` in table order.
    pub fn iter(&self) -> impl Iterator<Item = (Operation, OperationStats)> + '_ {
        Operation::ALL.into_iter().map(|op| (op, self.get(op)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_allowed_only_bumps_total() {
        let mut table = StatsTable::new();
        table.record(Operation::FileOpen, false);
        assert_eq!(
            table.get(Operation::FileOpen),
            OperationStats { total: 1, deny: 0 }
        );
        assert_eq!(table.get(Operation::Signal), OperationStats::default());
    }

    #[test]
    fn test_record_denied_bumps_both() {
        let mut table = StatsTable::new();
        table.record(Operation::Execve, true);
        table.record(Operation::Execve, false);
        assert_eq!(
            table.get(Operation::Execve),
            OperationStats { total: 2, deny: 1 }
        );
    }

    #[test]
    fn test_deny_never_exceeds_total_at_saturation() {
        let mut stats = OperationStats {
            total: u64::MAX,
            deny: u64::MAX,
        };
        stats.record(true);
        assert!(stats.deny <= stats.total);
    }

    #[test]
    fn test_iter_follows_table_order() {
        let table = StatsTable::new();
        let ops: Vec<Operation> = table.iter().map(|(op, _)| op).collect();
        assert_eq!(ops, Operation::ALL.to_vec());
    }
}
