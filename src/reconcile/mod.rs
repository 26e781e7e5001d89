//! Diff-and-update engine
//!
//! For each entity type, compares a desired plan against the recorded state
//! one field group at a time and issues the minimal set of remote calls to
//! converge. Every group is attempted independently: a failure is recorded
//! and the engine moves on. Renames always run last so that every other call
//! addresses the entity by its pre-rename identifier.
//!
//! ```text
//!   plan ─┐
//!         ├─► validate (no remote calls on failure)
//!   state ┘        │
//!                  ▼
//!        ┌─────────────────────┐   unchanged: skip
//!        │  field group 1..n   ├─► changed: one call per group
//!        └─────────┬───────────┘   (membership: one add + one remove)
//!                  ▼
//!               rename
//!                  │
//!                  ▼
//!            UpdateReport { updated, failed, errors }
//! ```

pub mod host;
pub mod host_group;
pub mod masking_view;
pub mod port_group;
pub mod storage_group;
pub mod volume;

pub use host::update_host;
pub use host_group::update_host_group;
pub use masking_view::update_masking_view;
pub use port_group::update_port_group;
pub use storage_group::update_storage_group;
pub use volume::update_volume;

use crate::domain::compare::{set_equals, set_equals_by, MembershipDelta};
use crate::error::{Error, Result};
use std::hash::Hash;
use tracing::{debug, warn};

// =============================================================================
// Field Groups
// =============================================================================

/// Independently updatable attribute groups across all entity types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldGroup {
    Name,
    Initiators,
    HostFlags,
    HostIds,
    Ports,
    SrpId,
    ServiceLevel,
    Compression,
    Workload,
    HostIoLimits,
    VolumeIds,
    SnapshotPolicies,
    Size,
    MobilityId,
}

impl FieldGroup {
    /// Attribute name as it appears in plans and messages
    pub const fn attribute(self) -> &'static str {
        match self {
            FieldGroup::Name => "name",
            FieldGroup::Initiators => "initiators",
            FieldGroup::HostFlags => "host_flags",
            FieldGroup::HostIds => "host_ids",
            FieldGroup::Ports => "ports",
            FieldGroup::SrpId => "srp_id",
            FieldGroup::ServiceLevel => "service_level",
            FieldGroup::Compression => "enable_compression",
            FieldGroup::Workload => "workload",
            FieldGroup::HostIoLimits => "host_io_limit",
            FieldGroup::VolumeIds => "volume_ids",
            FieldGroup::SnapshotPolicies => "snapshot_policies",
            FieldGroup::Size => "size",
            FieldGroup::MobilityId => "mobility_id_enabled",
        }
    }
}

impl std::fmt::Display for FieldGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.attribute())
    }
}

// =============================================================================
// Update Report
// =============================================================================

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Groups whose every call succeeded
    pub updated: Vec<FieldGroup>,
    /// Groups with at least one failed call
    pub failed: Vec<FieldGroup>,
    /// One message per failed call
    pub errors: Vec<String>,
}

impl UpdateReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of the single call of a field group
    pub fn record(&mut self, field: FieldGroup, result: Result<()>) {
        self.record_all(field, vec![result]);
    }

    /// Record the outcomes of every call issued for a field group.
    ///
    /// Does nothing when no call was issued.
    pub fn record_all(&mut self, field: FieldGroup, results: Vec<Result<()>>) {
        if results.is_empty() {
            return;
        }
        let mut failed = false;
        for result in results {
            if let Err(err) = result {
                warn!(field = field.attribute(), error = %err, "field update failed");
                self.errors.push(format!("Failed to modify {}: {}", field, err));
                failed = true;
            }
        }
        if failed {
            push_unique(&mut self.failed, field);
        } else {
            debug!(field = field.attribute(), "field updated");
            push_unique(&mut self.updated, field);
        }
    }

    /// Nothing failed
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// No remote call was issued
    pub fn is_noop(&self) -> bool {
        self.updated.is_empty() && self.failed.is_empty()
    }

    /// Whether the group was changed successfully
    pub fn succeeded(&self, field: FieldGroup) -> bool {
        self.updated.contains(&field)
    }

    /// Partial-failure error naming updated and failed groups, if any failed
    pub fn to_error(&self, kind: &str, id: &str) -> Option<Error> {
        if self.is_success() {
            return None;
        }
        Some(Error::PartialUpdate {
            kind: kind.to_string(),
            id: id.to_string(),
            updated: self.updated.iter().map(ToString::to_string).collect(),
            failed: self.failed.iter().map(ToString::to_string).collect(),
            errors: self.errors.clone(),
        })
    }
}

fn push_unique(fields: &mut Vec<FieldGroup>, field: FieldGroup) {
    if !fields.contains(&field) {
        fields.push(field);
    }
}

/// Delta between two identifier lists, `None` when no call is needed
pub(crate) fn id_delta(plan: &[String], state: &[String]) -> Option<MembershipDelta<String>> {
    if set_equals(plan, state) {
        return None;
    }
    let delta = MembershipDelta::exact(plan, state);
    (!delta.is_empty()).then_some(delta)
}

/// Delta under an identity key, `None` when no call is needed
pub(crate) fn keyed_delta<T, K, F>(plan: &[T], state: &[T], key: F) -> Option<MembershipDelta<T>>
where
    T: Clone,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    if set_equals_by(plan, state, &key) {
        return None;
    }
    let delta = MembershipDelta::between(plan, state, key);
    (!delta.is_empty()).then_some(delta)
}

/// Reject an attribute change the array cannot apply in place
pub(crate) fn ensure_unchanged(
    kind: &str,
    attribute: &str,
    planned: &str,
    recorded: &str,
) -> Result<()> {
    if planned == recorded {
        Ok(())
    } else {
        Err(Error::Precondition(format!(
            "{attribute} of {kind} cannot be changed after creation \
             (from {recorded:?} to {planned:?})"
        )))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for engine tests

    use crate::backends::memory::{MemoryArray, MemoryArrayConfig};
    use crate::domain::ports::CallContext;
    use std::sync::Arc;

    pub fn array() -> Arc<MemoryArray> {
        Arc::new(MemoryArray::new(MemoryArrayConfig::default()))
    }

    pub fn ctx() -> CallContext {
        CallContext::new()
    }
}
