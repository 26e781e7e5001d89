//! Host group resource model

use crate::domain::flags::HostFlags;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Plan and state shape of a host group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct HostGroupModel {
    pub id: String,

    pub name: String,

    /// Member host IDs; at least one
    pub host_ids: Vec<String>,

    pub host_flags: HostFlags,

    pub consistent_lun: bool,

    // -------------------------------------------------------------------------
    // Computed
    // -------------------------------------------------------------------------
    pub host_group_type: String,
    pub num_of_hosts: i64,
    pub num_of_initiators: i64,
    pub num_of_masking_views: i64,
    pub port_flags_override: bool,
    pub masking_views: Vec<String>,
}

impl HostGroupModel {
    pub fn new(name: impl Into<String>, host_ids: Vec<String>) -> Self {
        Self {
            name: name.into(),
            host_ids,
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
}
