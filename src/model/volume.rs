//! Volume resource model

use crate::domain::array::CapUnit;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Plan and state shape of a volume
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct VolumeModel {
    /// Array-assigned device ID
    pub id: String,

    /// Volume identifier
    pub name: String,

    /// Size in `cap_unit`; can only grow
    pub size: f64,

    pub cap_unit: CapUnit,

    /// Storage group the volume is created in; fixed after creation
    pub sg_name: String,

    pub mobility_id_enabled: bool,

    // -------------------------------------------------------------------------
    // Computed
    // -------------------------------------------------------------------------
    pub storage_groups: Vec<String>,
    pub num_of_storage_groups: i64,
    pub num_of_front_end_paths: i64,
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
    pub encapsulated: bool,
    pub reserved: bool,
    pub pinned: bool,
    pub snapvx_source: bool,
    pub snapvx_target: bool,
}

impl VolumeModel {
    pub fn new(
        name: impl Into<String>,
        size: f64,
        cap_unit: CapUnit,
        sg_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            size,
            cap_unit,
            sg_name: sg_name.into(),
            ..Default::default()
        }
    }

    /// Requested size in megabytes
    pub fn megabytes(&self) -> f64 {
        self.cap_unit.to_megabytes(self.size)
    }
}
