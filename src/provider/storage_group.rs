//! Storage group lifecycle
//!
//! The creation call carries SRP, service level, compression, workload and
//! host I/O limits. Member volumes and snapshot policies are attached by
//! follow-up calls whose failures are reported as warnings; the recorded
//! state then simply lacks them and the next plan shows the drift.

use super::{
    creation_error, ensure_absent, fetch_error, found, ignore_missing, refetch_id,
    update_diagnostics, Applied, Diagnostic, Resource, ResourceKind,
};
use crate::domain::array::{CreateStorageGroupParams, StorageGroupInfo};
use crate::domain::compare::unique_by;
use crate::domain::ports::{ArrayClientRef, CallContext};
use crate::error::Result;
use crate::model::StorageGroupModel;
use crate::projection::{project_storage_group, ProjectionMode};
use crate::reconcile::storage_group::{update_storage_group, validate_storage_group, PolicyBatches};
use async_trait::async_trait;
use tracing::{info, warn};

pub struct StorageGroupResource {
    client: ArrayClientRef,
}

impl StorageGroupResource {
    pub fn new(client: ArrayClientRef) -> Self {
        Self { client }
    }

    async fn fetch(&self, ctx: &CallContext, id: &str) -> Result<StorageGroupInfo> {
        self.client
            .get_storage_group(ctx, id)
            .await
            .map_err(fetch_error(Self::KIND, id))
    }

    async fn exists(&self, ctx: &CallContext, id: &str) -> Result<bool> {
        found(self.client.get_storage_group(ctx, id).await)
    }

    /// Remove what a failed create left behind
    async fn discard(&self, ctx: &CallContext, id: &str) -> Result<bool> {
        if !self.exists(ctx, id).await? {
            return Ok(false);
        }
        self.client.delete_storage_group(ctx, id).await?;
        Ok(true)
    }

    /// Attach planned volumes and snapshot policies to a new group
    async fn attach(&self, ctx: &CallContext, plan: &StorageGroupModel) -> Vec<Diagnostic> {
        let sg_id = plan.name.as_str();
        let mut warnings = Vec::new();

        let volume_ids = unique_by(&plan.volume_ids, |id| id.clone());
        if !volume_ids.is_empty() {
            let added = self
                .client
                .add_volumes_to_storage_group(ctx, sg_id, &volume_ids)
                .await;
            if let Err(err) = added {
                warn!(storage_group = %sg_id, error = %err, "failed to add volumes");
                warnings.push(Diagnostic::warning(
                    format!("Failed to add volumes to storage group {sg_id}"),
                    err.to_string(),
                ));
            }
        }

        let batches = PolicyBatches::between(&plan.snapshot_policies, &[]);
        if !batches.is_empty() {
            for err in batches
                .apply(self.client.as_ref(), ctx, sg_id)
                .await
                .into_iter()
                .filter_map(|result| result.err())
            {
                warn!(storage_group = %sg_id, error = %err, "failed to attach snapshot policies");
                warnings.push(Diagnostic::warning(
                    format!("Failed to attach snapshot policies to storage group {sg_id}"),
                    err.to_string(),
                ));
            }
        }

        warnings
    }
}

#[async_trait]
impl Resource for StorageGroupResource {
    type Model = StorageGroupModel;
    const KIND: ResourceKind = ResourceKind::StorageGroup;

    async fn create(
        &self,
        ctx: &CallContext,
        plan: &StorageGroupModel,
    ) -> Result<Applied<StorageGroupModel>> {
        validate_storage_group(plan)?;
        info!(
            storage_group = %plan.name,
            srp = %plan.srp_id,
            service_level = %plan.service_level,
            "creating storage group"
        );

        ensure_absent(Self::KIND, &plan.name, self.exists(ctx, &plan.name).await)?;

        let params = CreateStorageGroupParams {
            storage_group_id: plan.name.clone(),
            srp: plan.srp_id.clone(),
            slo: plan.service_level.clone(),
            compression: plan.enable_compression,
            workload: plan.workload.clone(),
            host_io_limit: plan.host_io_limit.clone(),
        };
        if let Err(cause) = self.client.create_storage_group(ctx, &params).await {
            let cleanup = self.discard(ctx, &plan.name).await;
            return Err(creation_error(Self::KIND, &plan.name, cause, cleanup));
        }

        let warnings = self.attach(ctx, plan).await;
        let remote = self.fetch(ctx, &plan.name).await?;
        Ok(Applied::with_diagnostics(
            project_storage_group(&remote, Some(plan), ProjectionMode::Create),
            warnings,
        ))
    }

    async fn read(
        &self,
        ctx: &CallContext,
        state: &StorageGroupModel,
    ) -> Result<StorageGroupModel> {
        let remote = self.fetch(ctx, state.remote_id()).await?;
        Ok(project_storage_group(&remote, Some(state), ProjectionMode::Read))
    }

    async fn update(
        &self,
        ctx: &CallContext,
        plan: &StorageGroupModel,
        state: &StorageGroupModel,
    ) -> Result<Applied<StorageGroupModel>> {
        let report = update_storage_group(self.client.as_ref(), ctx, plan, state).await?;
        let id = refetch_id(&report, state.remote_id(), &plan.name);
        let remote = self.fetch(ctx, id).await?;
        Ok(Applied::with_diagnostics(
            project_storage_group(&remote, Some(plan), ProjectionMode::Update),
            update_diagnostics(Self::KIND, id, &report),
        ))
    }

    async fn delete(&self, ctx: &CallContext, state: &StorageGroupModel) -> Result<()> {
        let id = state.remote_id();
        info!(storage_group = %id, "deleting storage group");
        ignore_missing(Self::KIND, id, self.client.delete_storage_group(ctx, id).await)
    }

    async fn import(&self, ctx: &CallContext, id: &str) -> Result<StorageGroupModel> {
        info!(storage_group = %id, "importing storage group");
        let remote = self.fetch(ctx, id).await?;
        Ok(project_storage_group(&remote, None, ProjectionMode::Import))
    }
}
