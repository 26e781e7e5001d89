//! Lifecycle Orchestrators
//!
//! One [`Resource`] per entity type drives create, read, update, delete and
//! import against the array:
//!
//! - create: validate, one creation call carrying the whole plan, best-effort
//!   follow-up attachments, then fetch and project. A failed creation call
//!   triggers a compensating lookup-then-delete.
//! - read and import: fetch and project; a failed fetch yields no state.
//! - update: run the diff engine, re-fetch (by the new name when the rename
//!   went through) and project, surfacing a partial failure as an error
//!   diagnostic next to the re-synced state.
//! - delete: remove the entity; a missing entity counts as deleted.

pub mod diagnostics;
pub mod host;
pub mod host_group;
pub mod masking_view;
pub mod port_group;
pub mod registry;
pub mod storage_group;
pub mod volume;

pub use diagnostics::{Applied, Diagnostic, Severity};
pub use host::HostResource;
pub use host_group::HostGroupResource;
pub use masking_view::MaskingViewResource;
pub use port_group::PortGroupResource;
pub use registry::{LifecycleOp, LifecycleRequest, LifecycleResponse, Provider};
pub use storage_group::StorageGroupResource;
pub use volume::VolumeResource;

use crate::domain::ports::CallContext;
use crate::error::{Error, Result};
use crate::reconcile::{FieldGroup, UpdateReport};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, info, warn};

// =============================================================================
// Resource Kinds
// =============================================================================

/// Every resource type the provider manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Host,
    HostGroup,
    PortGroup,
    MaskingView,
    StorageGroup,
    Volume,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::Host,
        ResourceKind::HostGroup,
        ResourceKind::PortGroup,
        ResourceKind::MaskingView,
        ResourceKind::StorageGroup,
        ResourceKind::Volume,
    ];

    /// Resource type name as declared in configurations
    pub const fn type_name(self) -> &'static str {
        match self {
            ResourceKind::Host => "powermax_host",
            ResourceKind::HostGroup => "powermax_hostgroup",
            ResourceKind::PortGroup => "powermax_portgroup",
            ResourceKind::MaskingView => "powermax_maskingview",
            ResourceKind::StorageGroup => "powermax_storagegroup",
            ResourceKind::Volume => "powermax_volume",
        }
    }

    /// Name used in messages
    pub const fn display_name(self) -> &'static str {
        match self {
            ResourceKind::Host => "host",
            ResourceKind::HostGroup => "host group",
            ResourceKind::PortGroup => "port group",
            ResourceKind::MaskingView => "masking view",
            ResourceKind::StorageGroup => "storage group",
            ResourceKind::Volume => "volume",
        }
    }

    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.type_name() == name)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name())
    }
}

// =============================================================================
// Resource Trait
// =============================================================================

/// Lifecycle of one resource type
#[async_trait]
pub trait Resource: Send + Sync {
    /// Plan and state shape
    type Model: Clone + Send + Sync + Serialize + DeserializeOwned + JsonSchema + 'static;

    const KIND: ResourceKind;

    async fn create(&self, ctx: &CallContext, plan: &Self::Model) -> Result<Applied<Self::Model>>;

    /// Re-sync recorded state with the array
    async fn read(&self, ctx: &CallContext, state: &Self::Model) -> Result<Self::Model>;

    async fn update(
        &self,
        ctx: &CallContext,
        plan: &Self::Model,
        state: &Self::Model,
    ) -> Result<Applied<Self::Model>>;

    async fn delete(&self, ctx: &CallContext, state: &Self::Model) -> Result<()>;

    /// Adopt an existing entity by its array identifier
    async fn import(&self, ctx: &CallContext, id: &str) -> Result<Self::Model>;
}

// =============================================================================
// Shared Lifecycle Steps
// =============================================================================

/// Refuse to create over an entity that already carries the planned name.
///
/// Runs before the creation call so that compensation only ever removes
/// what this create left behind.
pub(crate) fn ensure_absent(kind: ResourceKind, name: &str, exists: Result<bool>) -> Result<()> {
    let reason = match exists {
        Ok(false) => return Ok(()),
        Ok(true) => format!("{} {} already exists", kind.display_name(), name),
        Err(err) => format!("looking up {} {}: {}", kind.display_name(), name, err),
    };
    error!(kind = kind.display_name(), entity = name, %reason, "create refused");
    Err(Error::CreateFailed {
        kind: kind.display_name().to_string(),
        name: name.to_string(),
        reason,
    })
}

/// Existence check from a lookup by identifier
pub(crate) fn found<T>(lookup: Result<T>) -> Result<bool> {
    match lookup {
        Ok(_) => Ok(true),
        Err(err) if err.is_not_found() => Ok(false),
        Err(err) => Err(err),
    }
}

/// Error for a failed creation call, given the outcome of the compensating
/// cleanup (`Ok(true)` when a partial entity was removed).
pub(crate) fn creation_error(
    kind: ResourceKind,
    name: &str,
    cause: Error,
    cleanup: Result<bool>,
) -> Error {
    match cleanup {
        Ok(removed) => {
            if removed {
                info!(
                    kind = kind.display_name(),
                    entity = name,
                    "removed partially created entity"
                );
            }
            error!(kind = kind.display_name(), entity = name, error = %cause, "create failed");
            Error::CreateFailed {
                kind: kind.display_name().to_string(),
                name: name.to_string(),
                reason: cause.to_string(),
            }
        }
        Err(cleanup) => {
            error!(
                kind = kind.display_name(),
                entity = name,
                error = %cause,
                cleanup_error = %cleanup,
                "create failed and cleanup failed"
            );
            Error::CleanupFailed {
                kind: kind.display_name().to_string(),
                name: name.to_string(),
                reason: cause.to_string(),
                cleanup: cleanup.to_string(),
            }
        }
    }
}

/// Identifier to re-fetch with after an update
pub(crate) fn refetch_id<'a>(report: &UpdateReport, old_id: &'a str, new_name: &'a str) -> &'a str {
    if report.succeeded(FieldGroup::Name) {
        new_name
    } else {
        old_id
    }
}

/// Error diagnostics for a partially applied update
pub(crate) fn update_diagnostics(
    kind: ResourceKind,
    id: &str,
    report: &UpdateReport,
) -> Vec<Diagnostic> {
    match report.to_error(kind.display_name(), id) {
        Some(err) => {
            warn!(
                kind = kind.display_name(),
                id,
                failed = ?report.failed,
                "update partially applied"
            );
            vec![Diagnostic::from_error(
                format!("Failed to update {} {}", kind.display_name(), id),
                &err,
            )]
        }
        None => Vec::new(),
    }
}

/// Treat a missing entity as already deleted
pub(crate) fn ignore_missing(kind: ResourceKind, id: &str, result: Result<()>) -> Result<()> {
    match result {
        Err(err) if err.is_not_found() => {
            info!(kind = kind.display_name(), id, "already deleted");
            Ok(())
        }
        other => other,
    }
}

/// Wrap a fetch failure for `kind`
pub(crate) fn fetch_error(kind: ResourceKind, id: &str) -> impl FnOnce(Error) -> Error + '_ {
    move |err| Error::read_failed(kind.display_name(), id, err)
}
