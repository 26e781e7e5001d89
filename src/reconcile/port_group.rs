//! Port group reconciliation

use super::{ensure_unchanged, keyed_delta, FieldGroup, UpdateReport};
use crate::domain::array::PortKey;
use crate::domain::compare::unique_by;
use crate::domain::ports::{ArrayClient, CallContext};
use crate::error::{Error, Result};
use crate::model::PortGroupModel;
use tracing::info;

pub fn validate_port_group(plan: &PortGroupModel, state: Option<&PortGroupModel>) -> Result<()> {
    if plan.name.trim().is_empty() {
        return Err(Error::Precondition("port group name cannot be empty".into()));
    }
    if let Some(state) = state {
        ensure_unchanged("port group", "protocol", &plan.protocol, &state.protocol)?;
    }
    Ok(())
}

/// Converge a port group from `state` to `plan`.
///
/// Ports are compared by director (case-insensitive) and port number; a
/// duplicated port in the plan counts once.
pub async fn update_port_group(
    client: &dyn ArrayClient,
    ctx: &CallContext,
    plan: &PortGroupModel,
    state: &PortGroupModel,
) -> Result<UpdateReport> {
    validate_port_group(plan, Some(state))?;

    let group_id = state.remote_id();
    let mut report = UpdateReport::new();

    let planned = unique_by(&plan.ports, PortKey::identity);
    let recorded = unique_by(&state.ports, PortKey::identity);
    if let Some(delta) = keyed_delta(&planned, &recorded, PortKey::identity) {
        let mut results = Vec::new();
        if !delta.additions.is_empty() {
            results.push(client.add_ports(ctx, group_id, &delta.additions).await);
        }
        if !delta.removals.is_empty() {
            results.push(client.remove_ports(ctx, group_id, &delta.removals).await);
        }
        report.record_all(FieldGroup::Ports, results);
    }

    if plan.name != state.name {
        info!(from = %state.name, to = %plan.name, "renaming port group");
        report.record(FieldGroup::Name, client.rename_port_group(ctx, group_id, &plan.name).await);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryArray;
    use crate::domain::array::CreatePortGroupParams;
    use crate::domain::ports::Operation;
    use crate::projection::{project_port_group, ProjectionMode};
    use crate::reconcile::testing::{array, ctx};
    use std::sync::Arc;

    async fn seeded() -> (Arc<MemoryArray>, PortGroupModel) {
        let array = array();
        let info = array
            .create_port_group(
                &ctx(),
                &CreatePortGroupParams {
                    port_group_id: "pg1".into(),
                    protocol: "SCSI_FC".into(),
                    ports: vec![PortKey::new("OR-1C", "0"), PortKey::new("OR-2C", "0")],
                },
            )
            .await
            .unwrap();
        array.clear_calls();
        (array, project_port_group(&info, None, ProjectionMode::Import))
    }

    #[tokio::test]
    async fn test_director_casing_is_not_a_change() {
        let (array, state) = seeded().await;
        let mut plan = state.clone();
        plan.ports = vec![PortKey::new("or-2c", "0"), PortKey::new("or-1c", "0")];
        let report = update_port_group(array.as_ref(), &ctx(), &plan, &state).await.unwrap();
        assert!(report.is_noop());
    }

    #[tokio::test]
    async fn test_duplicate_port_counts_once() {
        let (array, state) = seeded().await;
        let mut plan = state.clone();
        plan.ports = vec![
            PortKey::new("OR-1C", "0"),
            PortKey::new("OR-1C", "0"),
            PortKey::new("OR-3C", "1"),
        ];

        let report = update_port_group(array.as_ref(), &ctx(), &plan, &state).await.unwrap();
        assert_eq!(report.updated, vec![FieldGroup::Ports]);
        assert_eq!(array.calls_of(Operation::AddPorts)[0].members, vec!["OR-3C:1".to_string()]);
        assert_eq!(array.calls_of(Operation::RemovePorts)[0].members, vec!["OR-2C:0".to_string()]);
    }

    #[tokio::test]
    async fn test_protocol_change_rejected() {
        let (array, state) = seeded().await;
        let mut plan = state.clone();
        plan.protocol = "iSCSI".into();
        let err = update_port_group(array.as_ref(), &ctx(), &plan, &state).await.unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
        assert!(array.calls().is_empty());
    }
}
