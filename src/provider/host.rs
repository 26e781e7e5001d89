//! Host lifecycle

use super::{
    creation_error, ensure_absent, fetch_error, found, ignore_missing, refetch_id,
    update_diagnostics, Applied, Resource, ResourceKind,
};
use crate::domain::array::{CreateHostParams, HostInfo};
use crate::domain::ports::{ArrayClientRef, CallContext};
use crate::error::Result;
use crate::model::HostModel;
use crate::projection::{project_host, ProjectionMode};
use crate::reconcile::host::{update_host, validate_host};
use async_trait::async_trait;
use tracing::info;

pub struct HostResource {
    client: ArrayClientRef,
}

impl HostResource {
    pub fn new(client: ArrayClientRef) -> Self {
        Self { client }
    }

    async fn fetch(&self, ctx: &CallContext, id: &str) -> Result<HostInfo> {
        self.client
            .get_host(ctx, id)
            .await
            .map_err(fetch_error(Self::KIND, id))
    }

    async fn exists(&self, ctx: &CallContext, id: &str) -> Result<bool> {
        found(self.client.get_host(ctx, id).await)
    }

    /// Remove what a failed create left behind
    async fn discard(&self, ctx: &CallContext, id: &str) -> Result<bool> {
        if !self.exists(ctx, id).await? {
            return Ok(false);
        }
        self.client.delete_host(ctx, id).await?;
        Ok(true)
    }
}

#[async_trait]
impl Resource for HostResource {
    type Model = HostModel;
    const KIND: ResourceKind = ResourceKind::Host;

    async fn create(&self, ctx: &CallContext, plan: &HostModel) -> Result<Applied<HostModel>> {
        validate_host(plan)?;
        info!(host = %plan.name, initiators = plan.initiators.len(), "creating host");

        ensure_absent(Self::KIND, &plan.name, self.exists(ctx, &plan.name).await)?;

        let params = CreateHostParams {
            host_id: plan.name.clone(),
            initiators: plan.initiators.clone(),
            flags: plan.host_flags,
            consistent_lun: plan.consistent_lun,
        };
        if let Err(cause) = self.client.create_host(ctx, &params).await {
            let cleanup = self.discard(ctx, &plan.name).await;
            return Err(creation_error(Self::KIND, &plan.name, cause, cleanup));
        }

        let remote = self.fetch(ctx, &plan.name).await?;
        Ok(Applied::clean(project_host(&remote, Some(plan), ProjectionMode::Create)))
    }

    async fn read(&self, ctx: &CallContext, state: &HostModel) -> Result<HostModel> {
        let remote = self.fetch(ctx, state.remote_id()).await?;
        Ok(project_host(&remote, Some(state), ProjectionMode::Read))
    }

    async fn update(
        &self,
        ctx: &CallContext,
        plan: &HostModel,
        state: &HostModel,
    ) -> Result<Applied<HostModel>> {
        let report = update_host(self.client.as_ref(), ctx, plan, state).await?;
        let id = refetch_id(&report, state.remote_id(), &plan.name);
        let remote = self.fetch(ctx, id).await?;
        Ok(Applied::with_diagnostics(
            project_host(&remote, Some(plan), ProjectionMode::Update),
            update_diagnostics(Self::KIND, id, &report),
        ))
    }

    async fn delete(&self, ctx: &CallContext, state: &HostModel) -> Result<()> {
        let id = state.remote_id();
        info!(host = %id, "deleting host");
        ignore_missing(Self::KIND, id, self.client.delete_host(ctx, id).await)
    }

    async fn import(&self, ctx: &CallContext, id: &str) -> Result<HostModel> {
        info!(host = %id, "importing host");
        let remote = self.fetch(ctx, id).await?;
        Ok(project_host(&remote, None, ProjectionMode::Import))
    }
}
