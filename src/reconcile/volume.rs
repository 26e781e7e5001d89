//! Volume reconciliation
//!
//! Field groups, in order: size, mobility ID, name. A volume can only grow
//! and stays in the storage group it was created in.

use super::{ensure_unchanged, FieldGroup, UpdateReport};
use crate::domain::ports::{ArrayClient, CallContext};
use crate::error::{Error, Result};
use crate::model::VolumeModel;
use tracing::info;

/// Sizes closer than this (in MB) are the same size
const SIZE_TOLERANCE_MB: f64 = 0.5;

pub fn validate_volume(plan: &VolumeModel, state: Option<&VolumeModel>) -> Result<()> {
    if plan.name.trim().is_empty() {
        return Err(Error::Precondition("volume name cannot be empty".into()));
    }
    if plan.size.is_nan() || plan.size <= 0.0 {
        return Err(Error::Precondition(format!(
            "volume {} must have a positive size",
            plan.name
        )));
    }
    if let Some(state) = state {
        ensure_unchanged("volume", "sg_name", &plan.sg_name, &state.sg_name)?;
        if plan.megabytes() + SIZE_TOLERANCE_MB < state.megabytes() {
            return Err(Error::Precondition(format!(
                "volume {} cannot shrink from {} {} to {} {}",
                plan.name, state.size, state.cap_unit, plan.size, plan.cap_unit
            )));
        }
    }
    Ok(())
}

/// Converge a volume from `state` to `plan`
pub async fn update_volume(
    client: &dyn ArrayClient,
    ctx: &CallContext,
    plan: &VolumeModel,
    state: &VolumeModel,
) -> Result<UpdateReport> {
    validate_volume(plan, Some(state))?;

    let volume_id = &state.id;
    let mut report = UpdateReport::new();

    if plan.megabytes() - state.megabytes() > SIZE_TOLERANCE_MB {
        info!(volume = %volume_id, size = plan.size, unit = %plan.cap_unit, "expanding volume");
        let result = client
            .expand_volume(ctx, volume_id, plan.size, plan.cap_unit)
            .await;
        report.record(FieldGroup::Size, result);
    }

    if plan.mobility_id_enabled != state.mobility_id_enabled {
        let result = client
            .modify_mobility_id(ctx, volume_id, plan.mobility_id_enabled)
            .await;
        report.record(FieldGroup::MobilityId, result);
    }

    if plan.name != state.name {
        report.record(FieldGroup::Name, client.rename_volume(ctx, volume_id, &plan.name).await);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryArray;
    use crate::domain::array::{CapUnit, CreateStorageGroupParams, CreateVolumeParams};
    use crate::domain::ports::Operation;
    use crate::projection::{project_volume, ProjectionMode};
    use crate::reconcile::testing::{array, ctx};
    use std::sync::Arc;

    async fn seeded() -> (Arc<MemoryArray>, VolumeModel) {
        let array = array();
        array
            .create_storage_group(
                &ctx(),
                &CreateStorageGroupParams {
                    storage_group_id: "sg1".into(),
                    srp: "SRP_1".into(),
                    slo: "Diamond".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let plan = VolumeModel::new("data01", 10.0, CapUnit::Gb, "sg1");
        let info = array
            .create_volume(
                &ctx(),
                &CreateVolumeParams {
                    volume_identifier: plan.name.clone(),
                    size: plan.size,
                    cap_unit: plan.cap_unit,
                    storage_group_id: plan.sg_name.clone(),
                    mobility_id_enabled: false,
                },
            )
            .await
            .unwrap();
        array.clear_calls();
        (array, project_volume(&info, Some(&plan), ProjectionMode::Create))
    }

    #[tokio::test]
    async fn test_same_size_in_other_unit_is_not_a_change() {
        let (array, state) = seeded().await;
        let mut plan = state.clone();
        plan.size = 10.0 * 1024.0 / 1.875;
        plan.cap_unit = CapUnit::Cyl;
        let report = update_volume(array.as_ref(), &ctx(), &plan, &state).await.unwrap();
        assert!(report.is_noop());
    }

    #[tokio::test]
    async fn test_expand_then_rename() {
        let (array, state) = seeded().await;
        let mut plan = state.clone();
        plan.size = 20.0;
        plan.name = "data02".into();

        let report = update_volume(array.as_ref(), &ctx(), &plan, &state).await.unwrap();
        assert_eq!(report.updated, vec![FieldGroup::Size, FieldGroup::Name]);
        let calls = array.calls();
        assert_eq!(calls[0].operation, Operation::ExpandVolume);
        assert_eq!(calls[1].operation, Operation::RenameVolume);

        let info = array.get_volume(&ctx(), &state.id).await.unwrap();
        assert_eq!(info.cap_gb, 20.0);
        assert_eq!(info.volume_identifier, "data02");
    }

    #[tokio::test]
    async fn test_shrink_rejected() {
        let (array, state) = seeded().await;
        let mut plan = state.clone();
        plan.size = 5.0;
        let err = update_volume(array.as_ref(), &ctx(), &plan, &state).await.unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
        assert!(array.calls().is_empty());
    }

    #[tokio::test]
    async fn test_storage_group_change_rejected() {
        let (array, state) = seeded().await;
        let mut plan = state.clone();
        plan.sg_name = "sg2".into();
        let err = update_volume(array.as_ref(), &ctx(), &plan, &state).await.unwrap_err();
        assert!(err.to_string().contains("sg_name"));
    }

    #[tokio::test]
    async fn test_mobility_failure_is_reported() {
        let (array, state) = seeded().await;
        array.fail(Operation::ModifyMobilityId, "not supported on this emulation");
        let mut plan = state.clone();
        plan.mobility_id_enabled = true;

        let report = update_volume(array.as_ref(), &ctx(), &plan, &state).await.unwrap();
        assert_eq!(report.failed, vec![FieldGroup::MobilityId]);
        assert!(report.errors[0].contains("not supported on this emulation"));
    }
}
