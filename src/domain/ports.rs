//! Domain Ports - the remote array client boundary
//!
//! The provider never talks to the array directly. Every remote action goes
//! through [`ArrayClient`], one fallible method per operation. Adapters under
//! `crate::backends` implement it.

use crate::domain::array::{
    CapUnit, CreateHostGroupParams, CreateHostParams, CreateMaskingViewParams,
    CreatePortGroupParams, CreateStorageGroupParams, CreateVolumeParams, HostGroupInfo,
    HostInfo, HostIoLimit, MaskingViewInfo, PortGroupInfo, PortKey, StorageGroupInfo,
    VolumeInfo,
};
use crate::domain::flags::HostFlags;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Call Context
// =============================================================================

/// Cancellation-aware context handed unchanged to every remote call
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
}

impl CallContext {
    /// Context that is never cancelled unless `cancel` is called
    pub fn new() -> Self {
        Self::default()
    }

    /// Context bound to an existing token
    pub fn with_token(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail fast when the context has been cancelled
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Underlying token, for adapters that race calls against cancellation
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }
}

// =============================================================================
// Remote Operations
// =============================================================================

/// Every remote operation the provider may issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    GetHost,
    CreateHost,
    RenameHost,
    AddHostInitiators,
    RemoveHostInitiators,
    SetHostFlags,
    DeleteHost,
    GetHostGroup,
    CreateHostGroup,
    RenameHostGroup,
    AddHostsToGroup,
    RemoveHostsFromGroup,
    SetHostGroupFlags,
    DeleteHostGroup,
    GetPortGroup,
    CreatePortGroup,
    RenamePortGroup,
    AddPorts,
    RemovePorts,
    DeletePortGroup,
    GetMaskingView,
    CreateMaskingView,
    RenameMaskingView,
    DeleteMaskingView,
    GetStorageGroup,
    CreateStorageGroup,
    RenameStorageGroup,
    SetSrp,
    SetServiceLevel,
    SetCompression,
    SetWorkload,
    SetHostIoLimits,
    AddVolumesToStorageGroup,
    RemoveVolumesFromStorageGroup,
    AssociateSnapshotPolicies,
    DisassociateSnapshotPolicies,
    SuspendSnapshotPolicies,
    ResumeSnapshotPolicies,
    DeleteStorageGroup,
    GetVolume,
    FindVolumeByName,
    CreateVolume,
    RenameVolume,
    ExpandVolume,
    ModifyMobilityId,
    DeleteVolume,
}

impl Operation {
    /// Stable snake_case name, used in logs and metric labels
    pub const fn as_str(self) -> &'static str {
        match self {
            Operation::GetHost => "get_host",
            Operation::CreateHost => "create_host",
            Operation::RenameHost => "rename_host",
            Operation::AddHostInitiators => "add_host_initiators",
            Operation::RemoveHostInitiators => "remove_host_initiators",
            Operation::SetHostFlags => "set_host_flags",
            Operation::DeleteHost => "delete_host",
            Operation::GetHostGroup => "get_host_group",
            Operation::CreateHostGroup => "create_host_group",
            Operation::RenameHostGroup => "rename_host_group",
            Operation::AddHostsToGroup => "add_hosts_to_group",
            Operation::RemoveHostsFromGroup => "remove_hosts_from_group",
            Operation::SetHostGroupFlags => "set_host_group_flags",
            Operation::DeleteHostGroup => "delete_host_group",
            Operation::GetPortGroup => "get_port_group",
            Operation::CreatePortGroup => "create_port_group",
            Operation::RenamePortGroup => "rename_port_group",
            Operation::AddPorts => "add_ports",
            Operation::RemovePorts => "remove_ports",
            Operation::DeletePortGroup => "delete_port_group",
            Operation::GetMaskingView => "get_masking_view",
            Operation::CreateMaskingView => "create_masking_view",
            Operation::RenameMaskingView => "rename_masking_view",
            Operation::DeleteMaskingView => "delete_masking_view",
            Operation::GetStorageGroup => "get_storage_group",
            Operation::CreateStorageGroup => "create_storage_group",
            Operation::RenameStorageGroup => "rename_storage_group",
            Operation::SetSrp => "set_srp",
            Operation::SetServiceLevel => "set_service_level",
            Operation::SetCompression => "set_compression",
            Operation::SetWorkload => "set_workload",
            Operation::SetHostIoLimits => "set_host_io_limits",
            Operation::AddVolumesToStorageGroup => "add_volumes_to_storage_group",
            Operation::RemoveVolumesFromStorageGroup => "remove_volumes_from_storage_group",
            Operation::AssociateSnapshotPolicies => "associate_snapshot_policies",
            Operation::DisassociateSnapshotPolicies => "disassociate_snapshot_policies",
            Operation::SuspendSnapshotPolicies => "suspend_snapshot_policies",
            Operation::ResumeSnapshotPolicies => "resume_snapshot_policies",
            Operation::DeleteStorageGroup => "delete_storage_group",
            Operation::GetVolume => "get_volume",
            Operation::FindVolumeByName => "find_volume_by_name",
            Operation::CreateVolume => "create_volume",
            Operation::RenameVolume => "rename_volume",
            Operation::ExpandVolume => "expand_volume",
            Operation::ModifyMobilityId => "modify_mobility_id",
            Operation::DeleteVolume => "delete_volume",
        }
    }

    /// Whether the operation changes array state
    pub const fn is_mutating(self) -> bool {
        !matches!(
            self,
            Operation::GetHost
                | Operation::GetHostGroup
                | Operation::GetPortGroup
                | Operation::GetMaskingView
                | Operation::GetStorageGroup
                | Operation::GetVolume
                | Operation::FindVolumeByName
        )
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Array Client Port
// =============================================================================

/// Port for every remote array operation.
///
/// Errors are opaque to the reconciliation core: it only distinguishes
/// success from failure and embeds the message in its reports.
#[async_trait]
pub trait ArrayClient: Send + Sync {
    // -------------------------------------------------------------------------
    // Hosts
    // -------------------------------------------------------------------------

    async fn get_host(&self, ctx: &CallContext, host_id: &str) -> Result<HostInfo>;

    async fn create_host(&self, ctx: &CallContext, params: &CreateHostParams) -> Result<HostInfo>;

    async fn rename_host(&self, ctx: &CallContext, host_id: &str, new_name: &str) -> Result<()>;

    async fn add_host_initiators(
        &self,
        ctx: &CallContext,
        host_id: &str,
        initiators: &[String],
    ) -> Result<()>;

    async fn remove_host_initiators(
        &self,
        ctx: &CallContext,
        host_id: &str,
        initiators: &[String],
    ) -> Result<()>;

    /// Replace the whole flag set of a host
    async fn set_host_flags(
        &self,
        ctx: &CallContext,
        host_id: &str,
        flags: &HostFlags,
        consistent_lun: bool,
    ) -> Result<()>;

    async fn delete_host(&self, ctx: &CallContext, host_id: &str) -> Result<()>;

    // -------------------------------------------------------------------------
    // Host Groups
    // -------------------------------------------------------------------------

    async fn get_host_group(&self, ctx: &CallContext, host_group_id: &str) -> Result<HostGroupInfo>;

    async fn create_host_group(
        &self,
        ctx: &CallContext,
        params: &CreateHostGroupParams,
    ) -> Result<HostGroupInfo>;

    async fn rename_host_group(
        &self,
        ctx: &CallContext,
        host_group_id: &str,
        new_name: &str,
    ) -> Result<()>;

    async fn add_hosts_to_group(
        &self,
        ctx: &CallContext,
        host_group_id: &str,
        host_ids: &[String],
    ) -> Result<()>;

    async fn remove_hosts_from_group(
        &self,
        ctx: &CallContext,
        host_group_id: &str,
        host_ids: &[String],
    ) -> Result<()>;

    async fn set_host_group_flags(
        &self,
        ctx: &CallContext,
        host_group_id: &str,
        flags: &HostFlags,
        consistent_lun: bool,
    ) -> Result<()>;

    async fn delete_host_group(&self, ctx: &CallContext, host_group_id: &str) -> Result<()>;

    // -------------------------------------------------------------------------
    // Port Groups
    // -------------------------------------------------------------------------

    async fn get_port_group(&self, ctx: &CallContext, port_group_id: &str) -> Result<PortGroupInfo>;

    async fn create_port_group(
        &self,
        ctx: &CallContext,
        params: &CreatePortGroupParams,
    ) -> Result<PortGroupInfo>;

    async fn rename_port_group(
        &self,
        ctx: &CallContext,
        port_group_id: &str,
        new_name: &str,
    ) -> Result<()>;

    async fn add_ports(
        &self,
        ctx: &CallContext,
        port_group_id: &str,
        ports: &[PortKey],
    ) -> Result<()>;

    async fn remove_ports(
        &self,
        ctx: &CallContext,
        port_group_id: &str,
        ports: &[PortKey],
    ) -> Result<()>;

    async fn delete_port_group(&self, ctx: &CallContext, port_group_id: &str) -> Result<()>;

    // -------------------------------------------------------------------------
    // Masking Views
    // -------------------------------------------------------------------------

    async fn get_masking_view(
        &self,
        ctx: &CallContext,
        masking_view_id: &str,
    ) -> Result<MaskingViewInfo>;

    async fn create_masking_view(
        &self,
        ctx: &CallContext,
        params: &CreateMaskingViewParams,
    ) -> Result<MaskingViewInfo>;

    async fn rename_masking_view(
        &self,
        ctx: &CallContext,
        masking_view_id: &str,
        new_name: &str,
    ) -> Result<()>;

    async fn delete_masking_view(&self, ctx: &CallContext, masking_view_id: &str) -> Result<()>;

    // -------------------------------------------------------------------------
    // Storage Groups
    // -------------------------------------------------------------------------

    async fn get_storage_group(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
    ) -> Result<StorageGroupInfo>;

    async fn create_storage_group(
        &self,
        ctx: &CallContext,
        params: &CreateStorageGroupParams,
    ) -> Result<StorageGroupInfo>;

    async fn rename_storage_group(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        new_name: &str,
    ) -> Result<()>;

    /// `srp` is an SRP name or `none`
    async fn set_srp(&self, ctx: &CallContext, storage_group_id: &str, srp: &str) -> Result<()>;

    /// `service_level` is a service level name or `none`
    async fn set_service_level(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        service_level: &str,
    ) -> Result<()>;

    async fn set_compression(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        enabled: bool,
    ) -> Result<()>;

    async fn set_workload(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        workload: &str,
    ) -> Result<()>;

    /// Apply only the sub-fields set in `limits`
    async fn set_host_io_limits(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        limits: &HostIoLimit,
    ) -> Result<()>;

    async fn add_volumes_to_storage_group(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        volume_ids: &[String],
    ) -> Result<()>;

    async fn remove_volumes_from_storage_group(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        volume_ids: &[String],
    ) -> Result<()>;

    async fn associate_snapshot_policies(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        policy_names: &[String],
    ) -> Result<()>;

    async fn disassociate_snapshot_policies(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        policy_names: &[String],
    ) -> Result<()>;

    async fn suspend_snapshot_policies(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        policy_names: &[String],
    ) -> Result<()>;

    async fn resume_snapshot_policies(
        &self,
        ctx: &CallContext,
        storage_group_id: &str,
        policy_names: &[String],
    ) -> Result<()>;

    async fn delete_storage_group(&self, ctx: &CallContext, storage_group_id: &str) -> Result<()>;

    // -------------------------------------------------------------------------
    // Volumes
    // -------------------------------------------------------------------------

    async fn get_volume(&self, ctx: &CallContext, volume_id: &str) -> Result<VolumeInfo>;

    /// Volume whose identifier equals `name`, if any
    async fn find_volume_by_name(
        &self,
        ctx: &CallContext,
        name: &str,
    ) -> Result<Option<VolumeInfo>>;

    async fn create_volume(
        &self,
        ctx: &CallContext,
        params: &CreateVolumeParams,
    ) -> Result<VolumeInfo>;

    async fn rename_volume(&self, ctx: &CallContext, volume_id: &str, new_name: &str) -> Result<()>;

    async fn expand_volume(
        &self,
        ctx: &CallContext,
        volume_id: &str,
        size: f64,
        cap_unit: CapUnit,
    ) -> Result<()>;

    async fn modify_mobility_id(
        &self,
        ctx: &CallContext,
        volume_id: &str,
        enabled: bool,
    ) -> Result<()>;

    async fn delete_volume(&self, ctx: &CallContext, volume_id: &str) -> Result<()>;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type ArrayClientRef = Arc<dyn ArrayClient>;
