//! Array-side representations
//!
//! Records returned by the remote array client and the parameter records the
//! provider hands to it. These mirror what the array reports, not what the
//! provider persists; see `crate::model` for the persisted shapes.

use crate::domain::flags::HostFlags;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// =============================================================================
// Shared Value Types
// =============================================================================

/// One front-end port of a port group
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct PortKey {
    /// Director, e.g. `OR-1C`
    pub director_id: String,
    /// Port number on the director, e.g. `0`
    pub port_id: String,
}

impl PortKey {
    pub fn new(director_id: impl Into<String>, port_id: impl Into<String>) -> Self {
        Self {
            director_id: director_id.into(),
            port_id: port_id.into(),
        }
    }

    /// Case-normalized identity: upper-case director, lower-case port
    pub fn identity(&self) -> (String, String) {
        (
            self.director_id.to_ascii_uppercase(),
            self.port_id.to_ascii_lowercase(),
        )
    }
}

impl std::fmt::Display for PortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.director_id, self.port_id)
    }
}

/// Snapshot policy attached to a storage group
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct SnapshotPolicyBinding {
    pub policy_name: String,
    /// False while the policy is suspended for this storage group
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl SnapshotPolicyBinding {
    pub fn new(policy_name: impl Into<String>, is_active: bool) -> Self {
        Self {
            policy_name: policy_name.into(),
            is_active,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Per storage group host I/O limits.
///
/// Each sub-field is independent; `None` means not set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct HostIoLimit {
    /// MB/sec limit, or `NOLIMIT`
    pub host_io_limit_mb_sec: Option<String>,
    /// IO/sec limit, or `NOLIMIT`
    pub host_io_limit_io_sec: Option<String>,
    /// `Never`, `Always` or `OnFailure`
    pub dynamic_distribution: Option<String>,
}

impl HostIoLimit {
    /// Sub-fields that differ from `current`; unchanged ones are `None`
    pub fn patch_from(&self, current: &HostIoLimit) -> HostIoLimit {
        fn changed(desired: &Option<String>, current: &Option<String>) -> Option<String> {
            match desired {
                Some(value) if desired != current => Some(value.clone()),
                _ => None,
            }
        }

        HostIoLimit {
            host_io_limit_mb_sec: changed(
                &self.host_io_limit_mb_sec,
                &current.host_io_limit_mb_sec,
            ),
            host_io_limit_io_sec: changed(
                &self.host_io_limit_io_sec,
                &current.host_io_limit_io_sec,
            ),
            dynamic_distribution: changed(
                &self.dynamic_distribution,
                &current.dynamic_distribution,
            ),
        }
    }

    /// No sub-field set
    pub fn is_empty(&self) -> bool {
        self.host_io_limit_mb_sec.is_none()
            && self.host_io_limit_io_sec.is_none()
            && self.dynamic_distribution.is_none()
    }

    /// Copy of `self` with every set field of `patch` applied
    pub fn merged(&self, patch: &HostIoLimit) -> HostIoLimit {
        HostIoLimit {
            host_io_limit_mb_sec: patch
                .host_io_limit_mb_sec
                .clone()
                .or_else(|| self.host_io_limit_mb_sec.clone()),
            host_io_limit_io_sec: patch
                .host_io_limit_io_sec
                .clone()
                .or_else(|| self.host_io_limit_io_sec.clone()),
            dynamic_distribution: patch
                .dynamic_distribution
                .clone()
                .or_else(|| self.dynamic_distribution.clone()),
        }
    }
}

/// Capacity unit of a volume
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum CapUnit {
    Cyl,
    #[default]
    Gb,
    Tb,
}

impl CapUnit {
    /// Megabytes per unit; one cylinder is 15 tracks of 128 KB
    pub const fn megabytes(self) -> f64 {
        match self {
            CapUnit::Cyl => 1.875,
            CapUnit::Gb => 1024.0,
            CapUnit::Tb => 1024.0 * 1024.0,
        }
    }

    /// Convert a size in this unit to megabytes
    pub fn to_megabytes(self, size: f64) -> f64 {
        size * self.megabytes()
    }
}

impl std::fmt::Display for CapUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapUnit::Cyl => write!(f, "CYL"),
            CapUnit::Gb => write!(f, "GB"),
            CapUnit::Tb => write!(f, "TB"),
        }
    }
}

// =============================================================================
// Entity Records
// =============================================================================

/// Host as reported by the array
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostInfo {
    pub host_id: String,
    pub num_of_masking_views: i64,
    pub num_of_initiators: i64,
    pub num_of_host_groups: i64,
    pub port_flags_override: bool,
    pub consistent_lun: bool,
    /// Comma-joined tokens of explicitly enabled flags
    pub enabled_flags: String,
    /// Comma-joined tokens of explicitly disabled flags
    pub disabled_flags: String,
    pub host_type: String,
    pub initiators: Vec<String>,
    pub masking_views: Vec<String>,
    pub powerpath_hosts: Vec<String>,
    pub num_of_powerpath_hosts: i64,
    pub bw_limit: i64,
}

/// Host group as reported by the array
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostGroupInfo {
    pub host_group_id: String,
    pub num_of_hosts: i64,
    pub num_of_initiators: i64,
    pub num_of_masking_views: i64,
    pub port_flags_override: bool,
    pub consistent_lun: bool,
    pub enabled_flags: String,
    pub disabled_flags: String,
    pub host_group_type: String,
    pub hosts: Vec<HostGroupMember>,
    pub masking_views: Vec<String>,
}

impl HostGroupInfo {
    /// IDs of the member hosts, in array order
    pub fn host_ids(&self) -> Vec<String> {
        self.hosts.iter().map(|host| host.host_id.clone()).collect()
    }
}

/// Host entry inside a host group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostGroupMember {
    pub host_id: String,
    pub initiators: Vec<String>,
}

/// Port group as reported by the array
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortGroupInfo {
    pub port_group_id: String,
    pub protocol: String,
    pub ports: Vec<PortKey>,
    pub num_of_ports: i64,
    pub num_of_masking_views: i64,
    pub port_group_type: String,
    pub masking_views: Vec<String>,
}

/// Masking view as reported by the array
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskingViewInfo {
    pub masking_view_id: String,
    pub host_id: String,
    pub host_group_id: String,
    pub port_group_id: String,
    pub storage_group_id: String,
}

/// Storage group as reported by the array
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageGroupInfo {
    pub storage_group_id: String,
    /// Empty when the group has no SRP
    pub srp: String,
    /// Empty when the group has no service level
    pub slo: String,
    pub base_slo_name: String,
    pub slo_compliance: String,
    pub compression: bool,
    pub compression_ratio: String,
    pub workload: String,
    pub num_of_vols: i64,
    pub num_of_child_sgs: i64,
    pub num_of_parent_sgs: i64,
    pub num_of_masking_views: i64,
    pub num_of_snapshots: i64,
    pub num_of_snapshot_policies: i64,
    pub cap_gb: f64,
    pub device_emulation: String,
    pub sg_type: String,
    pub unprotected: bool,
    pub vp_saved_percent: f64,
    pub uuid: String,
    pub host_io_limit: HostIoLimit,
    pub volume_ids: Vec<String>,
    pub snapshot_policies: Vec<SnapshotPolicyBinding>,
    pub child_storage_groups: Vec<String>,
    pub parent_storage_groups: Vec<String>,
    pub masking_views: Vec<String>,
}

/// Volume as reported by the array
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeInfo {
    pub volume_id: String,
    pub volume_identifier: String,
    pub volume_type: String,
    pub emulation: String,
    pub status: String,
    pub wwn: String,
    pub effective_wwn: String,
    pub has_effective_wwn: bool,
    pub nguid: String,
    pub physical_name: String,
    pub allocated_percent: i64,
    pub cap_gb: f64,
    pub cap_mb: f64,
    pub cap_cyl: i64,
    pub num_of_storage_groups: i64,
    pub num_of_front_end_paths: i64,
    pub storage_group_ids: Vec<String>,
    pub encapsulated: bool,
    pub reserved: bool,
    pub pinned: bool,
    pub snapvx_source: bool,
    pub snapvx_target: bool,
    pub mobility_id_enabled: bool,
}

impl VolumeInfo {
    /// Capacity expressed in `unit`
    pub fn capacity_in(&self, unit: CapUnit) -> f64 {
        match unit {
            CapUnit::Cyl => self.cap_cyl as f64,
            CapUnit::Gb => self.cap_gb,
            CapUnit::Tb => self.cap_gb / 1024.0,
        }
    }
}

// =============================================================================
// Creation Parameters
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateHostParams {
    pub host_id: String,
    pub initiators: Vec<String>,
    pub flags: HostFlags,
    pub consistent_lun: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateHostGroupParams {
    pub host_group_id: String,
    pub host_ids: Vec<String>,
    pub flags: HostFlags,
    pub consistent_lun: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePortGroupParams {
    pub port_group_id: String,
    pub ports: Vec<PortKey>,
    pub protocol: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMaskingViewParams {
    pub masking_view_id: String,
    pub storage_group_id: String,
    pub port_group_id: String,
    /// Exactly one of `host_id` and `host_group_id` is non-empty
    pub host_id: String,
    pub host_group_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateStorageGroupParams {
    pub storage_group_id: String,
    pub srp: String,
    pub slo: String,
    pub compression: bool,
    pub workload: String,
    pub host_io_limit: HostIoLimit,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateVolumeParams {
    pub volume_identifier: String,
    pub size: f64,
    pub cap_unit: CapUnit,
    pub storage_group_id: String,
    pub mobility_id_enabled: bool,
}
