//! State projection
//!
//! Folds the array's authoritative representation of an entity into the
//! provider's state record. Read-only attributes are copied verbatim;
//! drift-sensitive collections go through [`merge_collection`] with a policy
//! that depends on which lifecycle step is projecting.
//!
//! ```text
//!   mode      prior        result
//!   create    plan         prior ∩ remote, prior order
//!   update    plan         prior ∩ remote, prior order
//!   read      state        prior ∩ remote, then remote − prior
//!   import    (none)       remote verbatim
//! ```

pub mod host;
pub mod host_group;
pub mod masking_view;
pub mod port_group;
pub mod storage_group;
pub mod volume;

pub use host::project_host;
pub use host_group::project_host_group;
pub use masking_view::project_masking_view;
pub use port_group::project_port_group;
pub use storage_group::project_storage_group;
pub use volume::project_volume;

use crate::model::NONE_SENTINEL;
use indexmap::{IndexMap, IndexSet};
use std::hash::Hash;

// =============================================================================
// Projection Mode
// =============================================================================

/// Lifecycle step a projection runs for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectionMode {
    Create,
    Read,
    Update,
    Import,
}

impl ProjectionMode {
    /// Mode to use for attributes the plan never carries.
    ///
    /// A plan holds no value for computed collections, so create and update
    /// take the array's list as is; read keeps bidirectional drift handling
    /// so the recorded order stays stable.
    pub const fn computed(self) -> Self {
        match self {
            ProjectionMode::Create | ProjectionMode::Update | ProjectionMode::Import => {
                ProjectionMode::Import
            }
            ProjectionMode::Read => ProjectionMode::Read,
        }
    }
}

impl std::fmt::Display for ProjectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectionMode::Create => write!(f, "create"),
            ProjectionMode::Read => write!(f, "read"),
            ProjectionMode::Update => write!(f, "update"),
            ProjectionMode::Import => write!(f, "import"),
        }
    }
}

/// Which side supplies the element when an entry matches on both sides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefer {
    /// Keep the prior value (e.g. to preserve the plan's casing)
    Prior,
    /// Take the array's value (e.g. for attributes only the array decides)
    Remote,
}

// =============================================================================
// Merge
// =============================================================================

/// Merge a prior collection with the array's collection according to `mode`.
///
/// Entries are matched by `key`. Duplicates on the array side collapse to
/// their first occurrence.
pub fn merge_collection<T, K, F>(
    mode: ProjectionMode,
    prior: &[T],
    remote: &[T],
    key: F,
    prefer: Prefer,
) -> Vec<T>
where
    T: Clone,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let remote_by_key: IndexMap<K, &T> =
        remote.iter().rev().map(|item| (key(item), item)).collect();

    match mode {
        ProjectionMode::Import => remote.to_vec(),
        ProjectionMode::Create | ProjectionMode::Update => {
            kept_entries(prior, &remote_by_key, &key, prefer)
        }
        ProjectionMode::Read => {
            let mut merged = kept_entries(prior, &remote_by_key, &key, prefer);
            let prior_keys: IndexSet<K> = prior.iter().map(&key).collect();
            let mut appended = IndexSet::new();
            for item in remote {
                let item_key = key(item);
                if !prior_keys.contains(&item_key) && appended.insert(item_key) {
                    merged.push(item.clone());
                }
            }
            merged
        }
    }
}

fn kept_entries<T, K, F>(
    prior: &[T],
    remote_by_key: &IndexMap<K, &T>,
    key: &F,
    prefer: Prefer,
) -> Vec<T>
where
    T: Clone,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut seen = IndexSet::new();
    prior
        .iter()
        .filter_map(|item| {
            let item_key = key(item);
            let remote_item = remote_by_key.get(&item_key)?;
            if !seen.insert(item_key) {
                return None;
            }
            Some(match prefer {
                Prefer::Prior => item.clone(),
                Prefer::Remote => (*remote_item).clone(),
            })
        })
        .collect()
}

/// Merge plain identifiers compared exactly
pub fn merge_ids(mode: ProjectionMode, prior: &[String], remote: &[String]) -> Vec<String> {
    merge_collection(mode, prior, remote, |id| id.clone(), Prefer::Prior)
}

/// `none` when the array reports an empty value
pub fn or_none(value: &str) -> String {
    if value.trim().is_empty() {
        NONE_SENTINEL.to_string()
    } else {
        value.to_string()
    }
}

/// Prior attributes to merge against, or nothing when importing
pub(crate) fn prior_for<M>(mode: ProjectionMode, prior: Option<&M>) -> Option<&M> {
    match mode {
        ProjectionMode::Import => None,
        _ => prior,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::compare::set_equals;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_read_mode_bidirectional_drift() {
        let prior = strings(&["v1", "v2"]);
        let remote = strings(&["v2", "v3"]);
        let merged = merge_ids(ProjectionMode::Read, &prior, &remote);
        assert!(set_equals(&merged, &strings(&["v2", "v3"])));
        assert_eq!(merged, strings(&["v2", "v3"]));
    }

    #[test]
    fn test_read_mode_keeps_prior_order() {
        let prior = strings(&["c", "a", "b"]);
        let remote = strings(&["a", "b", "c", "d"]);
        let merged = merge_ids(ProjectionMode::Read, &prior, &remote);
        assert_eq!(merged, strings(&["c", "a", "b", "d"]));
    }

    #[test]
    fn test_create_mode_filters_rejected_entries() {
        let plan = strings(&["v1", "v2", "v3"]);
        let remote = strings(&["v3", "v1", "v9"]);
        let merged = merge_ids(ProjectionMode::Create, &plan, &remote);
        assert_eq!(merged, strings(&["v1", "v3"]));
        let merged = merge_ids(ProjectionMode::Update, &plan, &remote);
        assert_eq!(merged, strings(&["v1", "v3"]));
    }

    #[test]
    fn test_import_mode_takes_remote() {
        let prior = strings(&["x"]);
        let remote = strings(&["b", "a"]);
        assert_eq!(merge_ids(ProjectionMode::Import, &prior, &remote), remote);
    }

    #[test]
    fn test_merge_preserves_prior_casing() {
        let prior = strings(&["ABC123", "gone"]);
        let remote = strings(&["abc123", "new"]);
        let merged = merge_collection(
            ProjectionMode::Read,
            &prior,
            &remote,
            |s| s.to_ascii_lowercase(),
            Prefer::Prior,
        );
        assert_eq!(merged, strings(&["ABC123", "new"]));
    }

    #[test]
    fn test_merge_prefers_remote_value() {
        let prior = vec![("p1", true), ("p2", true)];
        let remote = vec![("p2", false), ("p1", true)];
        let merged =
            merge_collection(ProjectionMode::Update, &prior, &remote, |p| p.0, Prefer::Remote);
        assert_eq!(merged, vec![("p1", true), ("p2", false)]);
    }

    #[test]
    fn test_merge_collapses_duplicates() {
        let prior = strings(&["a", "a", "b"]);
        let remote = strings(&["a", "b", "b"]);
        assert_eq!(merge_ids(ProjectionMode::Create, &prior, &remote), strings(&["a", "b"]));
        assert_eq!(merge_ids(ProjectionMode::Read, &strings(&[]), &remote), strings(&["a", "b"]));
    }

    #[test]
    fn test_computed_mode() {
        assert_eq!(ProjectionMode::Create.computed(), ProjectionMode::Import);
        assert_eq!(ProjectionMode::Update.computed(), ProjectionMode::Import);
        assert_eq!(ProjectionMode::Read.computed(), ProjectionMode::Read);
    }

    #[test]
    fn test_or_none() {
        assert_eq!(or_none(""), "none");
        assert_eq!(or_none("SRP_1"), "SRP_1");
    }
}
