//! Identity and comparison helpers
//!
//! Pure helpers used throughout reconciliation to decide whether a remote
//! call is needed at all, and to compute membership deltas between a desired
//! plan and the recorded state.

use indexmap::{IndexMap, IndexSet};
use std::hash::Hash;

/// True when `a` and `b` hold the same values with the same multiplicities.
///
/// Order is irrelevant, duplicates are not: `["a", "a", "b"]` and
/// `["a", "b", "b"]` are different.
pub fn set_equals<S: AsRef<str>>(a: &[S], b: &[S]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    counts(a.iter().map(|s| s.as_ref())) == counts(b.iter().map(|s| s.as_ref()))
}

/// Multiset equality under an arbitrary identity key
pub fn set_equals_by<T, K, F>(a: &[T], b: &[T], key: F) -> bool
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    a.len() == b.len() && counts(a.iter().map(&key)) == counts(b.iter().map(&key))
}

/// Case-insensitive membership test
pub fn contains_case_insensitive<S: AsRef<str>>(needle: &str, haystack: &[S]) -> bool {
    haystack
        .iter()
        .any(|candidate| candidate.as_ref().eq_ignore_ascii_case(needle))
}

/// Exact membership test
pub fn contains_exact<S: AsRef<str>>(needle: &str, haystack: &[S]) -> bool {
    haystack.iter().any(|candidate| candidate.as_ref() == needle)
}

/// Collapse duplicates by identity key, first occurrence wins
pub fn unique_by<T, K, F>(items: &[T], key: F) -> Vec<T>
where
    T: Clone,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut seen = IndexSet::with_capacity(items.len());
    items
        .iter()
        .filter(|item| seen.insert(key(*item)))
        .cloned()
        .collect()
}

fn counts<K: Eq + Hash>(items: impl Iterator<Item = K>) -> IndexMap<K, usize> {
    let mut map = IndexMap::new();
    for item in items {
        *map.entry(item).or_insert(0) += 1;
    }
    map
}

// =============================================================================
// Membership Delta
// =============================================================================

/// Entries to add to and remove from a remote collection.
///
/// Both sides are deduplicated by identity key and keep the order in which
/// they first appear (plan order for additions, state order for removals).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipDelta<T> {
    /// In the plan, absent from the state
    pub additions: Vec<T>,
    /// In the state, absent from the plan
    pub removals: Vec<T>,
}

impl<T> Default for MembershipDelta<T> {
    fn default() -> Self {
        Self {
            additions: Vec::new(),
            removals: Vec::new(),
        }
    }
}

impl<T: Clone> MembershipDelta<T> {
    /// Compute the delta between a desired and a recorded collection
    pub fn between<K, F>(plan: &[T], state: &[T], key: F) -> Self
    where
        K: Eq + Hash,
        F: Fn(&T) -> K,
    {
        let plan_keys: IndexSet<K> = plan.iter().map(&key).collect();
        let state_keys: IndexSet<K> = state.iter().map(&key).collect();

        let additions = unique_by(plan, &key)
            .into_iter()
            .filter(|item| !state_keys.contains(&key(item)))
            .collect();
        let removals = unique_by(state, &key)
            .into_iter()
            .filter(|item| !plan_keys.contains(&key(item)))
            .collect();

        Self { additions, removals }
    }

    /// No remote call is needed
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }
}

impl MembershipDelta<String> {
    /// Delta over plain identifiers compared exactly
    pub fn exact(plan: &[String], state: &[String]) -> Self {
        Self::between(plan, state, |id| id.clone())
    }

    /// Delta over identifiers compared case-insensitively
    pub fn case_insensitive(plan: &[String], state: &[String]) -> Self {
        Self::between(plan, state, |id| id.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_set_equals_ignores_order() {
        assert!(set_equals(&["a", "b", "c"], &["c", "a", "b"]));
        assert!(set_equals::<&str>(&[], &[]));
        assert!(!set_equals(&["a"], &["A"]));
    }

    #[test]
    fn test_set_equals_is_count_sensitive() {
        assert!(!set_equals(&["a", "a", "b"], &["a", "b", "b"]));
        assert!(!set_equals(&["a", "b", "b"], &["a", "a", "b"]));
        assert!(!set_equals(&["a", "a"], &["a"]));
        assert!(set_equals(&["a", "a", "b"], &["b", "a", "a"]));
    }

    #[test]
    fn test_set_equals_by_key() {
        let a = strings(&["ABC", "def"]);
        let b = strings(&["DEF", "abc"]);
        assert!(set_equals_by(&a, &b, |s| s.to_ascii_lowercase()));
        assert!(!set_equals(&a, &b));
    }

    #[test]
    fn test_contains() {
        let haystack = strings(&["iqn.1993-08.org.debian:01:abc", "10000000C9A1B2C3"]);
        assert!(contains_case_insensitive("10000000c9a1b2c3", &haystack));
        assert!(!contains_exact("10000000c9a1b2c3", &haystack));
        assert!(contains_exact("10000000C9A1B2C3", &haystack));
        assert!(!contains_case_insensitive("missing", &haystack));
    }

    #[test]
    fn test_unique_by_keeps_first() {
        let items = strings(&["Port", "port", "other", "PORT"]);
        let unique = unique_by(&items, |s| s.to_ascii_lowercase());
        assert_eq!(unique, strings(&["Port", "other"]));
    }

    #[test]
    fn test_delta_collapses_plan_duplicates() {
        let plan = strings(&["v1", "v1", "v2"]);
        let state = strings(&["v2", "v3"]);
        let delta = MembershipDelta::exact(&plan, &state);
        assert_eq!(delta.additions, strings(&["v1"]));
        assert_eq!(delta.removals, strings(&["v3"]));
    }

    #[test]
    fn test_delta_case_insensitive() {
        let plan = strings(&["ABC123", "def456"]);
        let state = strings(&["abc123", "0000"]);
        let delta = MembershipDelta::case_insensitive(&plan, &state);
        assert_eq!(delta.additions, strings(&["def456"]));
        assert_eq!(delta.removals, strings(&["0000"]));
    }

    #[test]
    fn test_delta_empty_when_equal_sets() {
        let plan = strings(&["b", "a"]);
        let state = strings(&["a", "b", "b"]);
        assert!(MembershipDelta::exact(&plan, &state).is_empty());
    }
}
