//! Port group resource model

use crate::domain::array::PortKey;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Plan and state shape of a port group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PortGroupModel {
    pub id: String,

    pub name: String,

    /// Transport protocol, e.g. `SCSI_FC`, `iSCSI`, `NVMe_TCP`; fixed at creation
    pub protocol: String,

    /// Front-end ports, diffed as a set by case-normalized identity
    pub ports: Vec<PortKey>,

    // -------------------------------------------------------------------------
    // Computed
    // -------------------------------------------------------------------------
    pub port_group_type: String,
    pub num_of_ports: i64,
    pub num_of_masking_views: i64,
    pub masking_views: Vec<String>,
}

impl PortGroupModel {
    pub fn new(name: impl Into<String>, protocol: impl Into<String>, ports: Vec<PortKey>) -> Self {
        Self {
            name: name.into(),
            protocol: protocol.into(),
            ports,
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
