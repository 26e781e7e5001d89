//! Host resource model
//!
//! A host is a named set of initiators (FC WWNs or iSCSI IQNs) together with
//! the per-host flag overrides the array applies on their paths.

use crate::domain::flags::HostFlags;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Plan and state shape of a host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct HostModel {
    /// Host identifier; equal to `name` once created
    pub id: String,

    /// Host name
    pub name: String,

    /// Initiators, compared case-insensitively
    pub initiators: Vec<String>,

    /// Per-host flag overrides
    pub host_flags: HostFlags,

    /// Use consistent LUN numbering across all paths
    pub consistent_lun: bool,

    // -------------------------------------------------------------------------
    // Computed
    // -------------------------------------------------------------------------
    pub host_type: String,
    pub num_of_masking_views: i64,
    pub num_of_initiators: i64,
    pub num_of_host_groups: i64,
    pub num_of_powerpath_hosts: i64,
    pub port_flags_override: bool,
    pub bw_limit: i64,
    pub masking_views: Vec<String>,
    pub powerpath_hosts: Vec<String>,
}

impl HostModel {
    /// Minimal plan for a new host
    pub fn new(name: impl Into<String>, initiators: Vec<String>) -> Self {
        Self {
            name: name.into(),
            initiators,
            ..Default::default()
        }
    }

    /// Identifier to address the host with; falls back to the name before creation
    pub fn remote_id(&self) -> &str {
        if self.id.is_empty() {
            &self.name
        } else {
            &self.id
        }
    }
}
