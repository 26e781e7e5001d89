//! Host group reconciliation
//!
//! Field groups, in order: flags (with consistent LUN), member hosts, name.

use super::{id_delta, FieldGroup, UpdateReport};
use crate::domain::ports::{ArrayClient, CallContext};
use crate::error::{Error, Result};
use crate::model::HostGroupModel;
use tracing::info;

pub fn validate_host_group(plan: &HostGroupModel) -> Result<()> {
    if plan.name.trim().is_empty() {
        return Err(Error::Precondition("host group name cannot be empty".into()));
    }
    if plan.host_ids.is_empty() {
        return Err(Error::Precondition(format!(
            "host group {} must contain at least one host",
            plan.name
        )));
    }
    Ok(())
}

/// Converge a host group from `state` to `plan`
pub async fn update_host_group(
    client: &dyn ArrayClient,
    ctx: &CallContext,
    plan: &HostGroupModel,
    state: &HostGroupModel,
) -> Result<UpdateReport> {
    validate_host_group(plan)?;

    let group_id = state.remote_id();
    let mut report = UpdateReport::new();

    if plan.host_flags != state.host_flags || plan.consistent_lun != state.consistent_lun {
        let result = client
            .set_host_group_flags(ctx, group_id, &plan.host_flags, plan.consistent_lun)
            .await;
        report.record(FieldGroup::HostFlags, result);
    }

    if let Some(delta) = id_delta(&plan.host_ids, &state.host_ids) {
        let mut results = Vec::new();
        if !delta.additions.is_empty() {
            results.push(client.add_hosts_to_group(ctx, group_id, &delta.additions).await);
        }
        if !delta.removals.is_empty() {
            results.push(client.remove_hosts_from_group(ctx, group_id, &delta.removals).await);
        }
        report.record_all(FieldGroup::HostIds, results);
    }

    if plan.name != state.name {
        info!(from = %state.name, to = %plan.name, "renaming host group");
        report.record(FieldGroup::Name, client.rename_host_group(ctx, group_id, &plan.name).await);
    }

    Ok(report)
}
