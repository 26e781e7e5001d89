//! Masking view lifecycle

use super::{
    creation_error, ensure_absent, fetch_error, found, ignore_missing, refetch_id,
    update_diagnostics, Applied, Resource, ResourceKind,
};
use crate::domain::array::{CreateMaskingViewParams, MaskingViewInfo};
use crate::domain::ports::{ArrayClientRef, CallContext};
use crate::error::Result;
use crate::model::MaskingViewModel;
use crate::projection::{project_masking_view, ProjectionMode};
use crate::reconcile::masking_view::{update_masking_view, validate_masking_view};
use async_trait::async_trait;
use tracing::info;

pub struct MaskingViewResource {
    client: ArrayClientRef,
}

impl MaskingViewResource {
    pub fn new(client: ArrayClientRef) -> Self {
        Self { client }
    }

    async fn fetch(&self, ctx: &CallContext, id: &str) -> Result<MaskingViewInfo> {
        self.client
            .get_masking_view(ctx, id)
            .await
            .map_err(fetch_error(Self::KIND, id))
    }

    async fn exists(&self, ctx: &CallContext, id: &str) -> Result<bool> {
        found(self.client.get_masking_view(ctx, id).await)
    }

    /// Remove what a failed create left behind
    async fn discard(&self, ctx: &CallContext, id: &str) -> Result<bool> {
        if !self.exists(ctx, id).await? {
            return Ok(false);
        }
        self.client.delete_masking_view(ctx, id).await?;
        Ok(true)
    }
}

#[async_trait]
impl Resource for MaskingViewResource {
    type Model = MaskingViewModel;
    const KIND: ResourceKind = ResourceKind::MaskingView;

    async fn create(
        &self,
        ctx: &CallContext,
        plan: &MaskingViewModel,
    ) -> Result<Applied<MaskingViewModel>> {
        validate_masking_view(plan)?;
        info!(
            masking_view = %plan.name,
            storage_group = %plan.storage_group_id,
            port_group = %plan.port_group_id,
            "creating masking view"
        );

        ensure_absent(Self::KIND, &plan.name, self.exists(ctx, &plan.name).await)?;

        let params = CreateMaskingViewParams {
            masking_view_id: plan.name.clone(),
            storage_group_id: plan.storage_group_id.clone(),
            port_group_id: plan.port_group_id.clone(),
            host_id: plan.host_id.clone(),
            host_group_id: plan.host_group_id.clone(),
        };
        if let Err(cause) = self.client.create_masking_view(ctx, &params).await {
            let cleanup = self.discard(ctx, &plan.name).await;
            return Err(creation_error(Self::KIND, &plan.name, cause, cleanup));
        }

        let remote = self.fetch(ctx, &plan.name).await?;
        Ok(Applied::clean(project_masking_view(&remote, Some(plan), ProjectionMode::Create)))
    }

    async fn read(&self, ctx: &CallContext, state: &MaskingViewModel) -> Result<MaskingViewModel> {
        let remote = self.fetch(ctx, state.remote_id()).await?;
        Ok(project_masking_view(&remote, Some(state), ProjectionMode::Read))
    }

    async fn update(
        &self,
        ctx: &CallContext,
        plan: &MaskingViewModel,
        state: &MaskingViewModel,
    ) -> Result<Applied<MaskingViewModel>> {
        let report = update_masking_view(self.client.as_ref(), ctx, plan, state).await?;
        let id = refetch_id(&report, state.remote_id(), &plan.name);
        let remote = self.fetch(ctx, id).await?;
        Ok(Applied::with_diagnostics(
            project_masking_view(&remote, Some(plan), ProjectionMode::Update),
            update_diagnostics(Self::KIND, id, &report),
        ))
    }

    async fn delete(&self, ctx: &CallContext, state: &MaskingViewModel) -> Result<()> {
        let id = state.remote_id();
        info!(masking_view = %id, "deleting masking view");
        ignore_missing(Self::KIND, id, self.client.delete_masking_view(ctx, id).await)
    }

    async fn import(&self, ctx: &CallContext, id: &str) -> Result<MaskingViewModel> {
        info!(masking_view = %id, "importing masking view");
        let remote = self.fetch(ctx, id).await?;
        Ok(project_masking_view(&remote, None, ProjectionMode::Import))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryArray;
    use crate::domain::array::{
        CreateHostParams, CreatePortGroupParams, CreateStorageGroupParams, PortKey,
    };
    use crate::domain::ports::{ArrayClient, Operation};
    use crate::error::Error;
    use crate::provider::testing::{array, ctx};
    use assert_matches::assert_matches;
    use std::sync::Arc;

    async fn seeded() -> (Arc<MemoryArray>, MaskingViewResource) {
        let (array, client) = array();
        array
            .create_host(
                &ctx(),
                &CreateHostParams {
                    host_id: "esx01".into(),
                    initiators: vec!["10000000c9000001".into()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        array
            .create_port_group(
                &ctx(),
                &CreatePortGroupParams {
                    port_group_id: "pg1".into(),
                    ports: vec![PortKey::new("OR-1C", "0")],
                    protocol: "SCSI_FC".into(),
                },
            )
            .await
            .unwrap();
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
        array.clear_calls();
        (array, MaskingViewResource::new(client))
    }

    fn plan() -> MaskingViewModel {
        MaskingViewModel {
            name: "mv1".into(),
            storage_group_id: "sg1".into(),
            port_group_id: "pg1".into(),
            host_id: "esx01".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_then_rename() {
        let (array, resource) = seeded().await;
        let state = resource.create(&ctx(), &plan()).await.unwrap().state;
        assert_eq!(state.id, "mv1");
        assert_eq!(state.host_id, "esx01");

        let mut next = plan();
        next.name = "mv-renamed".into();
        let applied = resource.update(&ctx(), &next, &state).await.unwrap();
        assert_eq!(applied.state.id, "mv-renamed");
        assert_eq!(array.calls_of(Operation::RenameMaskingView)[0].target, "mv1");
    }

    #[tokio::test]
    async fn test_both_initiator_sides_rejected_before_any_call() {
        let (array, resource) = seeded().await;
        let mut plan = plan();
        plan.host_group_id = "cluster".into();
        assert_matches!(resource.create(&ctx(), &plan).await, Err(Error::Precondition(_)));
        assert!(array.journal().is_empty());
    }

    #[tokio::test]
    async fn test_rebinding_rejected() {
        let (array, resource) = seeded().await;
        let state = resource.create(&ctx(), &plan()).await.unwrap().state;
        let mut next = plan();
        next.port_group_id = "pg2".into();
        array.clear_calls();
        let err = resource.update(&ctx(), &next, &state).await.unwrap_err();
        assert!(err.to_string().contains("port_group_id"));
        assert!(array.journal().is_empty());
    }

    #[tokio::test]
    async fn test_view_pins_its_members_until_deleted() {
        let (array, resource) = seeded().await;
        let state = resource.create(&ctx(), &plan()).await.unwrap().state;
        assert!(array.delete_host(&ctx(), "esx01").await.is_err());

        resource.delete(&ctx(), &state).await.unwrap();
        assert!(array.delete_host(&ctx(), "esx01").await.is_ok());
        assert!(resource.delete(&ctx(), &state).await.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_create_leaves_existing_view() {
        let (array, resource) = seeded().await;
        resource.create(&ctx(), &plan()).await.unwrap();
        array.clear_calls();

        let err = resource.create(&ctx(), &plan()).await.unwrap_err();
        assert_matches!(
            err,
            Error::CreateFailed { ref reason, .. } if reason.contains("already exists")
        );
        assert!(array.calls_of(Operation::CreateMaskingView).is_empty());
        assert!(array.calls_of(Operation::DeleteMaskingView).is_empty());
        let existing = array.get_masking_view(&ctx(), "mv1").await.unwrap();
        assert_eq!(existing.host_id, "esx01");
    }
}
