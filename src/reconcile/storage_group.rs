//! Storage group reconciliation
//!
//! Field groups, in order: SRP, service level, compression, workload, host
//! I/O limits, member volumes, snapshot policies, name.

use super::{id_delta, FieldGroup, UpdateReport};
use crate::domain::array::SnapshotPolicyBinding;
use crate::domain::compare::unique_by;
use crate::domain::ports::{ArrayClient, CallContext};
use crate::error::{Error, Result};
use crate::model::StorageGroupModel;
use indexmap::IndexMap;
use tracing::{debug, info};

pub fn validate_storage_group(plan: &StorageGroupModel) -> Result<()> {
    if plan.name.trim().is_empty() {
        return Err(Error::Precondition("storage group name cannot be empty".into()));
    }
    if plan
        .snapshot_policies
        .iter()
        .any(|policy| policy.policy_name.trim().is_empty())
    {
        return Err(Error::Precondition(format!(
            "storage group {} has a snapshot policy without a name",
            plan.name
        )));
    }
    Ok(())
}

/// Converge a storage group from `state` to `plan`
pub async fn update_storage_group(
    client: &dyn ArrayClient,
    ctx: &CallContext,
    plan: &StorageGroupModel,
    state: &StorageGroupModel,
) -> Result<UpdateReport> {
    validate_storage_group(plan)?;

    let sg_id = state.remote_id();
    let mut report = UpdateReport::new();

    if plan.srp_id != state.srp_id {
        report.record(FieldGroup::SrpId, client.set_srp(ctx, sg_id, &plan.srp_id).await);
    }

    if plan.service_level != state.service_level {
        let result = client.set_service_level(ctx, sg_id, &plan.service_level).await;
        report.record(FieldGroup::ServiceLevel, result);
    }

    if plan.enable_compression != state.enable_compression {
        let result = client.set_compression(ctx, sg_id, plan.enable_compression).await;
        report.record(FieldGroup::Compression, result);
    }

    if plan.workload != state.workload {
        report.record(FieldGroup::Workload, client.set_workload(ctx, sg_id, &plan.workload).await);
    }

    let patch = plan.host_io_limit.patch_from(&state.host_io_limit);
    if !patch.is_empty() {
        debug!(?patch, "host I/O limits changed");
        let result = client.set_host_io_limits(ctx, sg_id, &patch).await;
        report.record(FieldGroup::HostIoLimits, result);
    }

    if let Some(delta) = id_delta(&plan.volume_ids, &state.volume_ids) {
        let mut results = Vec::new();
        if !delta.additions.is_empty() {
            results.push(client.add_volumes_to_storage_group(ctx, sg_id, &delta.additions).await);
        }
        if !delta.removals.is_empty() {
            let removed = client
                .remove_volumes_from_storage_group(ctx, sg_id, &delta.removals)
                .await;
            results.push(removed);
        }
        report.record_all(FieldGroup::VolumeIds, results);
    }

    let batches = PolicyBatches::between(&plan.snapshot_policies, &state.snapshot_policies);
    if !batches.is_empty() {
        let results = batches.apply(client, ctx, sg_id).await;
        report.record_all(FieldGroup::SnapshotPolicies, results);
    }

    if plan.name != state.name {
        info!(from = %state.name, to = %plan.name, "renaming storage group");
        let result = client.rename_storage_group(ctx, sg_id, &plan.name).await;
        report.record(FieldGroup::Name, result);
    }

    Ok(report)
}

// =============================================================================
// Snapshot Policy Batches
// =============================================================================

/// Snapshot policy calls needed to converge, one batch per call kind
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct PolicyBatches {
    pub associate: Vec<String>,
    pub disassociate: Vec<String>,
    pub suspend: Vec<String>,
    pub resume: Vec<String>,
    /// Newly associated policies the plan wants suspended
    pub suspend_after_associate: Vec<String>,
}

impl PolicyBatches {
    pub fn between(plan: &[SnapshotPolicyBinding], state: &[SnapshotPolicyBinding]) -> Self {
        let plan = by_name(plan);
        let state = by_name(state);
        let mut batches = Self::default();

        for (name, active) in &plan {
            match state.get(name) {
                None => {
                    batches.associate.push(name.clone());
                    if !active {
                        batches.suspend_after_associate.push(name.clone());
                    }
                }
                Some(was_active) if *was_active && !active => batches.suspend.push(name.clone()),
                Some(was_active) if !*was_active && *active => batches.resume.push(name.clone()),
                Some(_) => {}
            }
        }
        batches.disassociate = state
            .keys()
            .filter(|name| !plan.contains_key(*name))
            .cloned()
            .collect();
        batches
    }

    pub fn is_empty(&self) -> bool {
        self.associate.is_empty()
            && self.disassociate.is_empty()
            && self.suspend.is_empty()
            && self.resume.is_empty()
    }

    /// Issue the batches. New inactive policies join the suspend call only
    /// when their association succeeded.
    pub async fn apply(
        mut self,
        client: &dyn ArrayClient,
        ctx: &CallContext,
        sg_id: &str,
    ) -> Vec<Result<()>> {
        let mut results = Vec::new();
        if !self.associate.is_empty() {
            let associated = client.associate_snapshot_policies(ctx, sg_id, &self.associate).await;
            if associated.is_ok() {
                self.suspend.append(&mut self.suspend_after_associate);
            }
            results.push(associated);
        }
        if !self.disassociate.is_empty() {
            results.push(
                client
                    .disassociate_snapshot_policies(ctx, sg_id, &self.disassociate)
                    .await,
            );
        }
        if !self.suspend.is_empty() {
            results.push(client.suspend_snapshot_policies(ctx, sg_id, &self.suspend).await);
        }
        if !self.resume.is_empty() {
            results.push(client.resume_snapshot_policies(ctx, sg_id, &self.resume).await);
        }
        results
    }
}

fn by_name(policies: &[SnapshotPolicyBinding]) -> IndexMap<String, bool> {
    unique_by(policies, |policy| policy.policy_name.clone())
        .into_iter()
        .map(|policy| (policy.policy_name, policy.is_active))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryArray;
    use crate::domain::array::{CapUnit, CreateStorageGroupParams, CreateVolumeParams, HostIoLimit};
    use crate::domain::ports::Operation;
    use crate::projection::{project_storage_group, ProjectionMode};
    use crate::reconcile::testing::{array, ctx};
    use std::sync::Arc;

    async fn seeded(srp: &str) -> (Arc<MemoryArray>, StorageGroupModel) {
        let array = array();
        array
            .create_storage_group(
                &ctx(),
                &CreateStorageGroupParams {
                    storage_group_id: "sg1".into(),
                    srp: srp.into(),
                    slo: if srp == "none" { "none".into() } else { "Diamond".into() },
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        for name in ["v1", "v2", "v3"] {
            array
                .create_volume(
                    &ctx(),
                    &CreateVolumeParams {
                        volume_identifier: name.into(),
                        size: 1.0,
                        cap_unit: CapUnit::Gb,
                        storage_group_id: if name == "v1" { String::new() } else { "sg1".into() },
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }
        let info = array.get_storage_group(&ctx(), "sg1").await.unwrap();
        array.clear_calls();
        (array, project_storage_group(&info, None, ProjectionMode::Import))
    }

    async fn volume_id(array: &MemoryArray, name: &str) -> String {
        array
            .find_volume_by_name(&ctx(), name)
            .await
            .unwrap()
            .map(|volume| volume.volume_id)
            .unwrap()
    }

    #[tokio::test]
    async fn test_compression_rejected_without_srp_but_rename_succeeds() {
        let (array, state) = seeded("none").await;
        let mut plan = state.clone();
        plan.enable_compression = true;
        plan.name = "sg1-renamed".into();

        let report = update_storage_group(array.as_ref(), &ctx(), &plan, &state).await.unwrap();
        assert_eq!(report.failed, vec![FieldGroup::Compression]);
        assert_eq!(report.updated, vec![FieldGroup::Name]);
        assert!(report.errors[0].starts_with("Failed to modify enable_compression:"));

        let err = report.to_error("storage group", "sg1").unwrap();
        assert!(err.to_string().contains("updated fields are [name]"));
        assert!(err.to_string().contains("failed fields are [enable_compression]"));
    }

    #[tokio::test]
    async fn test_volume_membership_with_duplicate_plan() {
        let (array, state) = seeded("SRP_1").await;
        let v1 = volume_id(&array, "v1").await;
        let v2 = volume_id(&array, "v2").await;
        let v3 = volume_id(&array, "v3").await;
        assert_eq!(state.volume_ids, vec![v2.clone(), v3.clone()]);

        let mut plan = state.clone();
        plan.volume_ids = vec![v1.clone(), v1.clone(), v2.clone()];
        let report = update_storage_group(array.as_ref(), &ctx(), &plan, &state).await.unwrap();

        assert_eq!(report.updated, vec![FieldGroup::VolumeIds]);
        let adds = array.calls_of(Operation::AddVolumesToStorageGroup);
        let removes = array.calls_of(Operation::RemoveVolumesFromStorageGroup);
        assert_eq!(adds.len(), 1);
        assert_eq!(adds[0].members, vec![v1]);
        assert_eq!(removes.len(), 1);
        assert_eq!(removes[0].members, vec![v3]);
    }

    #[tokio::test]
    async fn test_host_io_limit_sends_only_changed_fields() {
        let (array, mut state) = seeded("SRP_1").await;
        state.host_io_limit = HostIoLimit {
            host_io_limit_mb_sec: Some("100".into()),
            host_io_limit_io_sec: Some("1000".into()),
            dynamic_distribution: Some("Never".into()),
        };
        let mut plan = state.clone();
        plan.host_io_limit.host_io_limit_mb_sec = Some("200".into());

        let report = update_storage_group(array.as_ref(), &ctx(), &plan, &state).await.unwrap();
        assert_eq!(report.updated, vec![FieldGroup::HostIoLimits]);
        let info = array.get_storage_group(&ctx(), "sg1").await.unwrap();
        assert_eq!(info.host_io_limit.host_io_limit_mb_sec.as_deref(), Some("200"));
        assert_eq!(info.host_io_limit.host_io_limit_io_sec, None);
    }

    #[test]
    fn test_policy_batches_group_transitions() {
        let state = vec![
            SnapshotPolicyBinding::new("a", true),
            SnapshotPolicyBinding::new("b", true),
            SnapshotPolicyBinding::new("c", false),
            SnapshotPolicyBinding::new("gone", true),
        ];
        let plan = vec![
            SnapshotPolicyBinding::new("a", false),
            SnapshotPolicyBinding::new("b", false),
            SnapshotPolicyBinding::new("c", true),
            SnapshotPolicyBinding::new("new", false),
            SnapshotPolicyBinding::new("new", false),
        ];
        let batches = PolicyBatches::between(&plan, &state);
        assert_eq!(batches.associate, vec!["new".to_string()]);
        assert_eq!(batches.disassociate, vec!["gone".to_string()]);
        assert_eq!(batches.suspend, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(batches.resume, vec!["c".to_string()]);
        assert_eq!(batches.suspend_after_associate, vec!["new".to_string()]);
    }

    #[tokio::test]
    async fn test_snapshot_policies_one_call_per_class() {
        let (array, state) = seeded("SRP_1").await;
        let mut plan = state.clone();
        plan.snapshot_policies = vec![
            SnapshotPolicyBinding::new("DailyDefault", true),
            SnapshotPolicyBinding::new("WeeklyDefault", false),
        ];

        let report = update_storage_group(array.as_ref(), &ctx(), &plan, &state).await.unwrap();
        assert_eq!(report.updated, vec![FieldGroup::SnapshotPolicies]);
        assert_eq!(array.calls_of(Operation::AssociateSnapshotPolicies).len(), 1);
        let suspends = array.calls_of(Operation::SuspendSnapshotPolicies);
        assert_eq!(suspends.len(), 1);
        assert_eq!(suspends[0].members, vec!["WeeklyDefault".to_string()]);

        let info = array.get_storage_group(&ctx(), "sg1").await.unwrap();
        assert_eq!(info.snapshot_policies, plan.snapshot_policies);
    }

    #[tokio::test]
    async fn test_unknown_policy_fails_only_policies() {
        let (array, state) = seeded("SRP_1").await;
        let mut plan = state.clone();
        plan.snapshot_policies = vec![SnapshotPolicyBinding::new("NoSuchPolicy", true)];
        plan.workload = "OLTP".into();

        let report = update_storage_group(array.as_ref(), &ctx(), &plan, &state).await.unwrap();
        assert_eq!(report.failed, vec![FieldGroup::SnapshotPolicies]);
        assert_eq!(report.updated, vec![FieldGroup::Workload]);
    }
}
