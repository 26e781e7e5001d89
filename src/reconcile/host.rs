//! Host reconciliation
//!
//! Field groups, in order: flags (with consistent LUN), initiators, name.

use super::{keyed_delta, FieldGroup, UpdateReport};
use crate::domain::ports::{ArrayClient, CallContext};
use crate::error::{Error, Result};
use crate::model::HostModel;
use tracing::info;

/// Reject plans the array would only partially apply
pub fn validate_host(plan: &HostModel) -> Result<()> {
    if plan.name.trim().is_empty() {
        return Err(Error::Precondition("host name cannot be empty".into()));
    }
    if plan.initiators.iter().any(|initiator| initiator.trim().is_empty()) {
        return Err(Error::Precondition(format!(
            "host {} has an empty initiator",
            plan.name
        )));
    }
    Ok(())
}

/// Converge a host from `state` to `plan`
pub async fn update_host(
    client: &dyn ArrayClient,
    ctx: &CallContext,
    plan: &HostModel,
    state: &HostModel,
) -> Result<UpdateReport> {
    validate_host(plan)?;

    let host_id = state.remote_id();
    let mut report = UpdateReport::new();

    if plan.host_flags != state.host_flags || plan.consistent_lun != state.consistent_lun {
        let result = client
            .set_host_flags(ctx, host_id, &plan.host_flags, plan.consistent_lun)
            .await;
        report.record(FieldGroup::HostFlags, result);
    }

    if let Some(delta) = keyed_delta(&plan.initiators, &state.initiators, |initiator| {
        initiator.to_ascii_lowercase()
    }) {
        let mut results = Vec::new();
        if !delta.additions.is_empty() {
            results.push(client.add_host_initiators(ctx, host_id, &delta.additions).await);
        }
        if !delta.removals.is_empty() {
            results.push(client.remove_host_initiators(ctx, host_id, &delta.removals).await);
        }
        report.record_all(FieldGroup::Initiators, results);
    }

    if plan.name != state.name {
        info!(from = %state.name, to = %plan.name, "renaming host");
        report.record(FieldGroup::Name, client.rename_host(ctx, host_id, &plan.name).await);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::array::CreateHostParams;
    use crate::domain::flags::{Flag, HostFlag};
    use crate::domain::ports::Operation;
    use crate::projection::{project_host, ProjectionMode};
    use crate::reconcile::testing::{array, ctx};

    async fn seeded() -> (std::sync::Arc<crate::backends::MemoryArray>, HostModel) {
        let array = array();
        let info = array
            .create_host(
                &ctx(),
                &CreateHostParams {
                    host_id: "esx01".into(),
                    initiators: vec!["10000000C9000001".into(), "10000000C9000002".into()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let state = project_host(&info, None, ProjectionMode::Import);
        array.clear_calls();
        (array, state)
    }

    #[tokio::test]
    async fn test_identical_plan_issues_no_calls() {
        let (array, state) = seeded().await;
        let report = update_host(array.as_ref(), &ctx(), &state, &state).await.unwrap();
        assert!(report.is_noop());
        assert!(array.calls().is_empty());
    }

    #[tokio::test]
    async fn test_initiator_casing_change_is_not_a_change() {
        let (array, state) = seeded().await;
        let mut plan = state.clone();
        plan.initiators = vec!["10000000C9000002".into(), "10000000C9000001".into()];
        let report = update_host(array.as_ref(), &ctx(), &plan, &state).await.unwrap();
        assert!(report.is_noop());
    }

    #[tokio::test]
    async fn test_initiators_add_and_remove() {
        let (array, state) = seeded().await;
        let mut plan = state.clone();
        plan.initiators = vec!["10000000c9000001".into(), "10000000C9000003".into()];

        let report = update_host(array.as_ref(), &ctx(), &plan, &state).await.unwrap();
        assert_eq!(report.updated, vec![FieldGroup::Initiators]);

        let adds = array.calls_of(Operation::AddHostInitiators);
        assert_eq!(adds.len(), 1);
        assert_eq!(adds[0].members, vec!["10000000C9000003".to_string()]);
        let removes = array.calls_of(Operation::RemoveHostInitiators);
        assert_eq!(removes.len(), 1);
        assert_eq!(removes[0].members, vec!["10000000c9000002".to_string()]);
    }

    #[tokio::test]
    async fn test_flags_set_atomically() {
        let (array, state) = seeded().await;
        let mut plan = state.clone();
        plan.host_flags = plan
            .host_flags
            .with(HostFlag::Scsi3, Flag::overridden(true))
            .with(HostFlag::Openvms, Flag::overridden(false));

        let report = update_host(array.as_ref(), &ctx(), &plan, &state).await.unwrap();
        assert_eq!(report.updated, vec![FieldGroup::HostFlags]);
        assert_eq!(array.calls_of(Operation::SetHostFlags).len(), 1);

        let info = array.get_host(&ctx(), "esx01").await.unwrap();
        assert_eq!(info.enabled_flags, "SCSI_3(SC3)");
        assert_eq!(info.disabled_flags, "OpenVMS(OVMS)");
    }

    #[tokio::test]
    async fn test_rename_runs_last_and_others_use_old_id() {
        let (array, state) = seeded().await;
        let mut plan = state.clone();
        plan.name = "esx01-new".into();
        plan.consistent_lun = true;
        plan.initiators.push("10000000C9000009".into());

        let report = update_host(array.as_ref(), &ctx(), &plan, &state).await.unwrap();
        assert!(report.is_success());

        let calls = array.calls();
        assert_eq!(calls.last().unwrap().operation, Operation::RenameHost);
        assert!(calls.iter().all(|call| call.target == "esx01"));
        assert!(array.get_host(&ctx(), "esx01-new").await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_field_does_not_block_others() {
        let (array, state) = seeded().await;
        array.fail(Operation::SetHostFlags, "flags locked");
        let mut plan = state.clone();
        plan.consistent_lun = true;
        plan.name = "esx02".into();

        let report = update_host(array.as_ref(), &ctx(), &plan, &state).await.unwrap();
        assert_eq!(report.failed, vec![FieldGroup::HostFlags]);
        assert_eq!(report.updated, vec![FieldGroup::Name]);
        assert!(report.errors[0].starts_with("Failed to modify host_flags:"));
    }

    #[tokio::test]
    async fn test_empty_initiator_rejected_before_any_call() {
        let (array, state) = seeded().await;
        let mut plan = state.clone();
        plan.initiators.push("  ".into());
        plan.name = "renamed".into();

        let err = update_host(array.as_ref(), &ctx(), &plan, &state).await.unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
        assert!(array.calls().is_empty());
    }
}
