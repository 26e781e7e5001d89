//! Masking view resource model
//!
//! A masking view binds one storage group, one port group and exactly one of
//! a host or a host group.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Plan and state shape of a masking view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct MaskingViewModel {
    pub id: String,

    pub name: String,

    pub storage_group_id: String,

    pub port_group_id: String,

    /// Mutually exclusive with `host_group_id`
    pub host_id: String,

    /// Mutually exclusive with `host_id`
    pub host_group_id: String,
}

impl MaskingViewModel {
    pub fn remote_id(&self) -> &str {
        if self.id.is_empty() {
            &self.name
        } else {
            &self.id
        }
    }
}
