//! Ordered, copy-on-write rule store.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tlsm_core::AccessRequest;
use tracing::{debug, info};

use crate::error::{PolicyError, PolicyResult};
use crate::matcher::find_match;
use crate::policy::Policy;

/// Default maximum number of rules a store admits.
pub const DEFAULT_MAX_RULES: usize = 4096;

/// A rule that matched a request, with its position at match time.
#[derive(Debug, Clone)]
pub struct MatchedPolicy {
    /// Index of the rule in the snapshot it was matched against.
    pub index: usize,
    /// The matching rule.
    pub policy: Arc<Policy>,
}

/// Insertion-ordered rule list.
///
/// Writers are serialized by an internal [`RwLock`] and publish a new
/// snapshot on every structural change; readers match against the snapshot
/// that was current when they started, so an in-flight match never observes
/// a half-applied insert or delete.
///
/// # Example
///
/// ```
/// use tlsm_policy::{Policy, RuleStore};
///
/// let store = RuleStore::new();
/// store.append(Policy::parse("/bin/nc deny connect any").unwrap()).unwrap();
/// assert_eq!(store.len(), 1);
/// store.delete(0).unwrap();
/// assert!(store.is_empty());
/// ```
pub struct RuleStore {
    rules: RwLock<Arc<Vec<Arc<Policy>>>>,
    capacity: usize,
}

impl RuleStore {
    /// Create an empty store admitting up to [`DEFAULT_MAX_RULES`] rules.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_RULES)
    }

    /// Create an empty store admitting up to `capacity` rules.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rules: RwLock::new(Arc::new(Vec::new())),
            capacity,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Arc<Vec<Arc<Policy>>>> {
        self.rules.read().unwrap_or_else(|e| {
            tracing::warn!("RuleStore read lock poisoned, recovering");
            PoisonError::into_inner(e)
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, Arc<Vec<Arc<Policy>>>> {
        self.rules.write().unwrap_or_else(|e| {
            tracing::warn!("RuleStore write lock poisoned, recovering");
            PoisonError::into_inner(e)
        })
    }

    /// Append a rule at the tail.
    ///
    /// Returns the index of the new rule.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::StoreFull`] if the store is at capacity.
    pub fn append(&self, policy: Policy) -> PolicyResult<usize> {
        let mut guard = self.write();
        if guard.len() >= self.capacity {
            return Err(PolicyError::StoreFull {
                capacity: self.capacity,
            });
        }
        let rules = Arc::make_mut(&mut *guard);
        let index = rules.len();
        info!(index, rule = %policy, "rule added");
        rules.push(Arc::new(policy));
        Ok(index)
    }

    /// Append several rules, all or none.
    ///
    /// Returns the number of rules added.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::StoreFull`] if the batch does not fit; the
    /// store is left unchanged.
    pub fn apply(&self, policies: Vec<Policy>) -> PolicyResult<usize> {
        let mut guard = self.write();
        let fits = guard
            .len()
            .checked_add(policies.len())
            .is_some_and(|n| n <= self.capacity);
        if !fits {
            return Err(PolicyError::StoreFull {
                capacity: self.capacity,
            });
        }
        let count = policies.len();
        Arc::make_mut(&mut *guard).extend(policies.into_iter().map(Arc::new));
        info!(count, "rules applied");
        Ok(count)
    }

    /// Delete the rule at `index`, preserving the order of the rest.
    ///
    /// Returns the removed rule.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::NotFound`] if `index` is past the tail; the
    /// store is left unchanged.
    pub fn delete(&self, index: usize) -> PolicyResult<Arc<Policy>> {
        let mut guard = self.write();
        if index >= guard.len() {
            return Err(PolicyError::NotFound { index });
        }
        let removed = Arc::make_mut(&mut *guard).remove(index);
        info!(index, rule = %removed, "rule deleted");
        Ok(removed)
    }

    /// The current rules, head to tail.
    ///
    /// The returned snapshot is unaffected by later inserts and deletes.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Vec<Arc<Policy>>> {
        let guard = self.read();
        Arc::clone(&guard)
    }

    /// Find the first rule applying to `request`.
    #[must_use]
    pub fn find_match(&self, request: &AccessRequest) -> Option<MatchedPolicy> {
        let rules = self.snapshot();
        let matched = find_match(&rules, request).map(|(index, policy)| MatchedPolicy {
            index,
            policy: Arc::clone(policy),
        });
        match &matched {
            Some(m) => debug!(
                subject = %request.subject,
                operation = %request.operation,
                object = %request.object,
                index = m.index,
                category = %m.policy.category,
                "rule matched"
            ),
            None => debug!(
                subject = %request.subject,
                operation = %request.operation,
                object = %request.object,
                "no rule matched"
            ),
        }
        matched
    }

    /// One `list` line per rule, head to tail.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .enumerate()
            .map(|(i, p)| p.listing_line(i))
            .collect()
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Whether the store holds no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Maximum number of rules admitted.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RuleStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleStore")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tlsm_core::{Category, Operation};

    fn store_with(rules: &[&str]) -> RuleStore {
        let store = RuleStore::new();
        for r in rules {
            store.append(Policy::parse(r).unwrap()).unwrap();
        }
        store
    }

    fn subjects(store: &RuleStore) -> Vec<String> {
        store.snapshot().iter().map(|p| p.subject.clone()).collect()
    }

    #[test]
    fn test_append_returns_index() {
        let store = RuleStore::new();
        assert_eq!(store.append(Policy::parse("/a deny signal").unwrap()).unwrap(), 0);
        assert_eq!(store.append(Policy::parse("/b deny signal").unwrap()).unwrap(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_append_at_capacity_fails() {
        let store = RuleStore::with_capacity(1);
        store.append(Policy::parse("/a deny signal").unwrap()).unwrap();
        let err = store.append(Policy::parse("/b deny signal").unwrap()).unwrap_err();
        assert!(matches!(err, PolicyError::StoreFull { capacity: 1 }));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_delete_middle_preserves_order() {
        let store = store_with(&["/a deny signal", "/b deny signal", "/c deny signal"]);
        let removed = store.delete(1).unwrap();
        assert_eq!(removed.subject, "/b");
        assert_eq!(subjects(&store), vec!["/a", "/c"]);
    }

    #[test]
    fn test_delete_head_and_tail() {
        let store = store_with(&["/a deny signal", "/b deny signal", "/c deny signal"]);
        store.delete(2).unwrap();
        assert_eq!(subjects(&store), vec!["/a", "/b"]);
        store.delete(0).unwrap();
        assert_eq!(subjects(&store), vec!["/b"]);
        // Appending after deleting the tail lands at the new tail.
        store.append(Policy::parse("/d deny signal").unwrap()).unwrap();
        assert_eq!(subjects(&store), vec!["/b", "/d"]);
    }

    #[test]
    fn test_delete_sole_element_empties_store() {
        let store = store_with(&["/a deny signal"]);
        store.delete(0).unwrap();
        assert!(store.is_empty());
        store.append(Policy::parse("/z deny signal").unwrap()).unwrap();
        assert_eq!(subjects(&store), vec!["/z"]);
    }

    #[test]
    fn test_delete_out_of_range_leaves_store_unchanged() {
        let store = store_with(&["/a deny signal", "/b deny signal"]);
        assert!(matches!(store.delete(2), Err(PolicyError::NotFound { index: 2 })));
        assert!(matches!(store.delete(usize::MAX), Err(PolicyError::NotFound { .. })));
        assert_eq!(subjects(&store), vec!["/a", "/b"]);
    }

    #[test]
    fn test_delete_on_empty_store() {
        let store = RuleStore::new();
        assert!(matches!(store.delete(0), Err(PolicyError::NotFound { index: 0 })));
    }

    #[test]
    fn test_snapshot_survives_concurrent_delete() {
        let store = store_with(&["/a deny signal", "/b deny signal"]);
        let snapshot = store.snapshot();
        store.delete(0).unwrap();
        store.delete(0).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].subject, "/a");
        assert!(store.is_empty());
    }

    #[test]
    fn test_hit_count_is_shared_with_snapshot() {
        let store = store_with(&["/bin/cat deny open secret"]);
        let request = AccessRequest::new(Operation::FileOpen, "/secret").with_subject("/bin/cat");
        let matched = store.find_match(&request).unwrap();
        matched.policy.record_hit();
        assert_eq!(store.snapshot()[0].hit_count(), 1);
    }

    #[test]
    fn test_find_match_first_wins() {
        let store = store_with(&["/bin/cat deny open secret", "/bin/cat allow open secret"]);
        let request = AccessRequest::new(Operation::FileOpen, "/etc/secret").with_subject("/bin/cat");
        let m = store.find_match(&request).unwrap();
        assert_eq!(m.index, 0);
        assert_eq!(m.policy.category, Category::Deny);
    }

    #[test]
    fn test_apply_is_all_or_nothing() {
        let store = RuleStore::with_capacity(2);
        store.append(Policy::parse("/a deny signal").unwrap()).unwrap();
        let batch = vec![
            Policy::parse("/b deny signal").unwrap(),
            Policy::parse("/c deny signal").unwrap(),
        ];
        assert!(store.apply(batch).is_err());
        assert_eq!(store.len(), 1);
        assert_eq!(store.apply(vec![Policy::parse("/b deny signal").unwrap()]).unwrap(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_list_lines() {
        let store = store_with(&["/bin/cat deny open secret", "/opt/app analyze"]);
        assert_eq!(
            store.list(),
            vec![
                "rule #0 : /bin/cat deny open secret (hit count 0)".to_owned(),
                "rule #1 : /opt/app analyze - - (hit count 0)".to_owned(),
            ]
        );
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let store = Arc::new(store_with(&["/a deny signal"]));
        let poisoner = Arc::clone(&store);
        let result = std::thread::spawn(move || {
            let _guard = poisoner.rules.write().unwrap();
            panic!("poison the rule lock");
        })
        .join();
        assert!(result.is_err());
        assert!(store.rules.is_poisoned());

        assert_eq!(store.len(), 1);
        assert_eq!(store.append(Policy::parse("/b deny signal").unwrap()).unwrap(), 1);
        store.delete(0).unwrap();
        assert_eq!(subjects(&store), vec!["/b"]);
        assert_eq!(store.apply(vec![Policy::parse("/c deny signal").unwrap()]).unwrap(), 1);
        assert_eq!(store.list().len(), 2);
    }
}
