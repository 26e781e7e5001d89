//! Masking view reconciliation
//!
//! A masking view can only be renamed in place. Any other change needs the
//! view to be replaced and is rejected before a call is made.

use super::{ensure_unchanged, FieldGroup, UpdateReport};
use crate::domain::ports::{ArrayClient, CallContext};
use crate::error::{Error, Result};
use crate::model::MaskingViewModel;
use tracing::info;

const KIND: &str = "masking view";

/// Exactly one initiator side, plus a storage group and a port group
pub fn validate_masking_view(plan: &MaskingViewModel) -> Result<()> {
    if plan.name.trim().is_empty() {
        return Err(Error::Precondition("masking view name cannot be empty".into()));
    }
    match (plan.host_id.is_empty(), plan.host_group_id.is_empty()) {
        (false, false) => {
            return Err(Error::Precondition(format!(
                "masking view {} cannot reference both a host and a host group",
                plan.name
            )))
        }
        (true, true) => {
            return Err(Error::Precondition(format!(
                "masking view {} needs either a host or a host group",
                plan.name
            )))
        }
        _ => {}
    }
    if plan.storage_group_id.is_empty() || plan.port_group_id.is_empty() {
        return Err(Error::Precondition(format!(
            "masking view {} needs a storage group and a port group",
            plan.name
        )));
    }
    Ok(())
}

pub async fn update_masking_view(
    client: &dyn ArrayClient,
    ctx: &CallContext,
    plan: &MaskingViewModel,
    state: &MaskingViewModel,
) -> Result<UpdateReport> {
    validate_masking_view(plan)?;
    ensure_unchanged(KIND, "storage_group_id", &plan.storage_group_id, &state.storage_group_id)?;
    ensure_unchanged(KIND, "port_group_id", &plan.port_group_id, &state.port_group_id)?;
    ensure_unchanged(KIND, "host_id", &plan.host_id, &state.host_id)?;
    ensure_unchanged(KIND, "host_group_id", &plan.host_group_id, &state.host_group_id)?;

    let mut report = UpdateReport::new();
    if plan.name != state.name {
        info!(from = %state.name, to = %plan.name, "renaming masking view");
        let result = client
            .rename_masking_view(ctx, state.remote_id(), &plan.name)
            .await;
        report.record(FieldGroup::Name, result);
    }
    Ok(report)
}
