//! Storage group projection

use super::{merge_collection, merge_ids, or_none, prior_for, Prefer, ProjectionMode};
use crate::domain::array::{SnapshotPolicyBinding, StorageGroupInfo};
use crate::model::StorageGroupModel;

/// Fold an array storage group into a state record.
///
/// Snapshot policies match by name; the activation flag always comes from
/// the array.
pub fn project_storage_group(
    remote: &StorageGroupInfo,
    prior: Option<&StorageGroupModel>,
    mode: ProjectionMode,
) -> StorageGroupModel {
    let prior = prior_for(mode, prior);
    let empty = StorageGroupModel::default();
    let base = prior.unwrap_or(&empty);

    StorageGroupModel {
        id: remote.storage_group_id.clone(),
        name: remote.storage_group_id.clone(),
        srp_id: or_none(&remote.srp),
        service_level: or_none(&remote.slo),
        enable_compression: remote.compression,
        workload: remote.workload.clone(),
        volume_ids: merge_ids(mode, &base.volume_ids, &remote.volume_ids),
        snapshot_policies: merge_collection(
            mode,
            &base.snapshot_policies,
            &remote.snapshot_policies,
            |policy: &SnapshotPolicyBinding| policy.policy_name.clone(),
            Prefer::Remote,
        ),
        host_io_limit: remote.host_io_limit.clone(),
        base_slo_name: remote.base_slo_name.clone(),
        slo_compliance: remote.slo_compliance.clone(),
        compression_ratio: remote.compression_ratio.clone(),
        num_of_vols: remote.num_of_vols,
        num_of_child_sgs: remote.num_of_child_sgs,
        num_of_parent_sgs: remote.num_of_parent_sgs,
        num_of_masking_views: remote.num_of_masking_views,
        num_of_snapshots: remote.num_of_snapshots,
        num_of_snapshot_policies: remote.num_of_snapshot_policies,
        cap_gb: remote.cap_gb,
        device_emulation: remote.device_emulation.clone(),
        storage_group_type: remote.sg_type.clone(),
        unprotected: remote.unprotected,
        vp_saved_percent: remote.vp_saved_percent,
        uuid: remote.uuid.clone(),
        child_storage_groups: merge_ids(
            mode.computed(),
            &base.child_storage_groups,
            &remote.child_storage_groups,
        ),
        parent_storage_groups: merge_ids(
            mode.computed(),
            &base.parent_storage_groups,
            &remote.parent_storage_groups,
        ),
        masking_views: merge_ids(mode.computed(), &base.masking_views, &remote.masking_views),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::compare::set_equals;

    fn remote_group() -> StorageGroupInfo {
        StorageGroupInfo {
            storage_group_id: "sg1".into(),
            volume_ids: vec!["00002".into(), "00003".into()],
            snapshot_policies: vec![
                SnapshotPolicyBinding::new("DailyDefault", false),
                SnapshotPolicyBinding::new("WeeklyDefault", true),
            ],
            num_of_vols: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_srp_and_slo_become_none() {
        let state = project_storage_group(&remote_group(), None, ProjectionMode::Import);
        assert_eq!(state.srp_id, "none");
        assert_eq!(state.service_level, "none");
    }

    #[test]
    fn test_read_mode_volume_drift() {
        let prior = StorageGroupModel {
            id: "sg1".into(),
            volume_ids: vec!["00001".into(), "00002".into()],
            ..StorageGroupModel::new("sg1")
        };
        let state = project_storage_group(&remote_group(), Some(&prior), ProjectionMode::Read);
        assert!(set_equals(&state.volume_ids, &["00002".to_string(), "00003".to_string()]));
    }

    #[test]
    fn test_snapshot_policy_activation_comes_from_array() {
        let plan = StorageGroupModel {
            snapshot_policies: vec![
                SnapshotPolicyBinding::new("DailyDefault", true),
                SnapshotPolicyBinding::new("Missing", true),
            ],
            ..StorageGroupModel::new("sg1")
        };
        let state = project_storage_group(&remote_group(), Some(&plan), ProjectionMode::Update);
        assert_eq!(
            state.snapshot_policies,
            vec![SnapshotPolicyBinding::new("DailyDefault", false)]
        );
    }
}
