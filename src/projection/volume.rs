//! Volume projection

use super::{merge_ids, prior_for, ProjectionMode};
use crate::domain::array::VolumeInfo;
use crate::model::VolumeModel;

/// Fold an array volume into a state record.
///
/// `size` is reported in the prior's capacity unit (GB on import) so a size
/// change made outside the provider shows up as drift.
pub fn project_volume(
    remote: &VolumeInfo,
    prior: Option<&VolumeModel>,
    mode: ProjectionMode,
) -> VolumeModel {
    let prior = prior_for(mode, prior);
    let cap_unit = prior.map(|p| p.cap_unit).unwrap_or_default();
    let sg_name = match prior {
        Some(p) => p.sg_name.clone(),
        None => remote.storage_group_ids.first().cloned().unwrap_or_default(),
    };
    let prior_groups = prior.map(|p| p.storage_groups.as_slice()).unwrap_or_default();

    VolumeModel {
        id: remote.volume_id.clone(),
        name: remote.volume_identifier.clone(),
        size: remote.capacity_in(cap_unit),
        cap_unit,
        sg_name,
        mobility_id_enabled: remote.mobility_id_enabled,
        storage_groups: merge_ids(mode.computed(), prior_groups, &remote.storage_group_ids),
        num_of_storage_groups: remote.num_of_storage_groups,
        num_of_front_end_paths: remote.num_of_front_end_paths,
        volume_type: remote.volume_type.clone(),
        emulation: remote.emulation.clone(),
        status: remote.status.clone(),
        wwn: remote.wwn.clone(),
        effective_wwn: remote.effective_wwn.clone(),
        has_effective_wwn: remote.has_effective_wwn,
        nguid: remote.nguid.clone(),
        physical_name: remote.physical_name.clone(),
        allocated_percent: remote.allocated_percent,
        cap_gb: remote.cap_gb,
        cap_mb: remote.cap_mb,
        cap_cyl: remote.cap_cyl,
        encapsulated: remote.encapsulated,
        reserved: remote.reserved,
        pinned: remote.pinned,
        snapvx_source: remote.snapvx_source,
        snapvx_target: remote.snapvx_target,
    }
}
