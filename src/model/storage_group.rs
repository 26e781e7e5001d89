//! Storage group resource model

use crate::domain::array::{HostIoLimit, SnapshotPolicyBinding};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Value used for SRP and service level when the group has none
pub const NONE_SENTINEL: &str = "none";

/// Plan and state shape of a storage group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct StorageGroupModel {
    pub id: String,

    pub name: String,

    /// SRP name, or `none`
    pub srp_id: String,

    /// Service level name, or `none`; requires an SRP
    pub service_level: String,

    /// Requires an SRP
    pub enable_compression: bool,

    pub workload: String,

    /// Member volume IDs
    pub volume_ids: Vec<String>,

    /// Associated snapshot policies and whether each is active
    pub snapshot_policies: Vec<SnapshotPolicyBinding>,

    pub host_io_limit: HostIoLimit,

    // -------------------------------------------------------------------------
    // Computed
    // -------------------------------------------------------------------------
    pub base_slo_name: String,
    pub slo_compliance: String,
    pub compression_ratio: String,
    pub num_of_vols: i64,
    pub num_of_child_sgs: i64,
    pub num_of_parent_sgs: i64,
    pub num_of_masking_views: i64,
    pub num_of_snapshots: i64,
    pub num_of_snapshot_policies: i64,
    pub cap_gb: f64,
    pub device_emulation: String,
    pub storage_group_type: String,
    pub unprotected: bool,
    pub vp_saved_percent: f64,
    pub uuid: String,
    pub child_storage_groups: Vec<String>,
    pub parent_storage_groups: Vec<String>,
    pub masking_views: Vec<String>,
}

impl Default for StorageGroupModel {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            srp_id: NONE_SENTINEL.to_string(),
            service_level: NONE_SENTINEL.to_string(),
            enable_compression: false,
            workload: String::new(),
            volume_ids: Vec::new(),
            snapshot_policies: Vec::new(),
            host_io_limit: HostIoLimit::default(),
            base_slo_name: String::new(),
            slo_compliance: String::new(),
            compression_ratio: String::new(),
            num_of_vols: 0,
            num_of_child_sgs: 0,
            num_of_parent_sgs: 0,
            num_of_masking_views: 0,
            num_of_snapshots: 0,
            num_of_snapshot_policies: 0,
            cap_gb: 0.0,
            device_emulation: String::new(),
            storage_group_type: String::new(),
            unprotected: false,
            vp_saved_percent: 0.0,
            uuid: String::new(),
            child_storage_groups: Vec::new(),
            parent_storage_groups: Vec::new(),
            masking_views: Vec::new(),
        }
    }
}

impl StorageGroupModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn remote_id(&self) -> &str {
        if self.id.is_empty() {
            &self.name
        } else {
            &self.id
        }
    }

    /// Names of the associated snapshot policies
    pub fn snapshot_policy_names(&self) -> Vec<String> {
        self.snapshot_policies
            .iter()
            .map(|policy| policy.policy_name.clone())
            .collect()
    }
}
