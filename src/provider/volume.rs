//! Volume lifecycle
//!
//! Volumes are addressed by their array-assigned device ID, which a rename
//! does not change. Deleting a volume first detaches it from every storage
//! group it belongs to; the delete call is only made once all detaches went
//! through.

use super::{
    creation_error, ensure_absent, fetch_error, update_diagnostics, Applied, Resource, ResourceKind,
};
use crate::domain::array::{CreateVolumeParams, VolumeInfo};
use crate::domain::ports::{ArrayClientRef, CallContext};
use crate::error::{Error, Result};
use crate::model::VolumeModel;
use crate::projection::{project_volume, ProjectionMode};
use crate::reconcile::volume::{update_volume, validate_volume};
use async_trait::async_trait;
use tracing::{info, warn};

pub struct VolumeResource {
    client: ArrayClientRef,
}

impl VolumeResource {
    pub fn new(client: ArrayClientRef) -> Self {
        Self { client }
    }

    async fn fetch(&self, ctx: &CallContext, id: &str) -> Result<VolumeInfo> {
        self.client
            .get_volume(ctx, id)
            .await
            .map_err(fetch_error(Self::KIND, id))
    }

    /// Detach a volume from each of its storage groups, one call per group.
    ///
    /// Every detach is attempted; the failures are returned.
    async fn detach_all(&self, ctx: &CallContext, volume: &VolumeInfo) -> Vec<String> {
        let members = [volume.volume_id.clone()];
        let mut failures = Vec::new();
        for sg_id in &volume.storage_group_ids {
            if let Err(err) = self
                .client
                .remove_volumes_from_storage_group(ctx, sg_id, &members)
                .await
            {
                warn!(
                    volume = %volume.volume_id,
                    storage_group = %sg_id,
                    error = %err,
                    "detach failed"
                );
                failures.push(format!("removing from storage group {sg_id}: {err}"));
            }
        }
        failures
    }

    /// Remove a volume left behind by a failed creation call
    async fn discard(&self, ctx: &CallContext, name: &str) -> Result<bool> {
        let Some(volume) = self.client.find_volume_by_name(ctx, name).await? else {
            return Ok(false);
        };
        let failures = self.detach_all(ctx, &volume).await;
        if !failures.is_empty() {
            return Err(Error::DeleteFailed {
                kind: Self::KIND.display_name().to_string(),
                id: volume.volume_id,
                reasons: failures,
            });
        }
        self.client.delete_volume(ctx, &volume.volume_id).await?;
        Ok(true)
    }
}

#[async_trait]
impl Resource for VolumeResource {
    type Model = VolumeModel;
    const KIND: ResourceKind = ResourceKind::Volume;

    async fn create(&self, ctx: &CallContext, plan: &VolumeModel) -> Result<Applied<VolumeModel>> {
        validate_volume(plan, None)?;
        if plan.sg_name.trim().is_empty() {
            return Err(Error::Precondition(format!(
                "volume {} needs a storage group",
                plan.name
            )));
        }
        info!(
            volume = %plan.name,
            size = plan.size,
            unit = %plan.cap_unit,
            storage_group = %plan.sg_name,
            "creating volume"
        );

        let taken = self.client.find_volume_by_name(ctx, &plan.name).await;
        ensure_absent(Self::KIND, &plan.name, taken.map(|volume| volume.is_some()))?;

        let params = CreateVolumeParams {
            volume_identifier: plan.name.clone(),
            size: plan.size,
            cap_unit: plan.cap_unit,
            storage_group_id: plan.sg_name.clone(),
            mobility_id_enabled: plan.mobility_id_enabled,
        };
        let created = match self.client.create_volume(ctx, &params).await {
            Ok(created) => created,
            Err(cause) => {
                let cleanup = self.discard(ctx, &plan.name).await;
                return Err(creation_error(Self::KIND, &plan.name, cause, cleanup));
            }
        };

        let remote = self.fetch(ctx, &created.volume_id).await?;
        Ok(Applied::clean(project_volume(&remote, Some(plan), ProjectionMode::Create)))
    }

    async fn read(&self, ctx: &CallContext, state: &VolumeModel) -> Result<VolumeModel> {
        let remote = self.fetch(ctx, &state.id).await?;
        Ok(project_volume(&remote, Some(state), ProjectionMode::Read))
    }

    async fn update(
        &self,
        ctx: &CallContext,
        plan: &VolumeModel,
        state: &VolumeModel,
    ) -> Result<Applied<VolumeModel>> {
        let report = update_volume(self.client.as_ref(), ctx, plan, state).await?;
        let remote = self.fetch(ctx, &state.id).await?;
        Ok(Applied::with_diagnostics(
            project_volume(&remote, Some(plan), ProjectionMode::Update),
            update_diagnostics(Self::KIND, &state.id, &report),
        ))
    }

    async fn delete(&self, ctx: &CallContext, state: &VolumeModel) -> Result<()> {
        let volume = match self.client.get_volume(ctx, &state.id).await {
            Ok(volume) => volume,
            Err(err) if err.is_not_found() => {
                info!(volume = %state.id, "already deleted");
                return Ok(());
            }
            Err(err) => return Err(Error::read_failed(Self::KIND.display_name(), &state.id, err)),
        };

        info!(volume = %state.id, groups = volume.storage_group_ids.len(), "deleting volume");
        let failures = self.detach_all(ctx, &volume).await;
        if !failures.is_empty() {
            return Err(Error::DeleteFailed {
                kind: Self::KIND.display_name().to_string(),
                id: state.id.clone(),
                reasons: failures,
            });
        }
        self.client.delete_volume(ctx, &state.id).await
    }

    async fn import(&self, ctx: &CallContext, id: &str) -> Result<VolumeModel> {
        info!(volume = %id, "importing volume");
        let remote = self.fetch(ctx, id).await?;
        Ok(project_volume(&remote, None, ProjectionMode::Import))
    }
}
