//! Host group lifecycle

use super::{
    creation_error, ensure_absent, fetch_error, found, ignore_missing, refetch_id,
    update_diagnostics, Applied, Resource, ResourceKind,
};
use crate::domain::array::{CreateHostGroupParams, HostGroupInfo};
use crate::domain::compare::unique_by;
use crate::domain::ports::{ArrayClientRef, CallContext};
use crate::error::Result;
use crate::model::HostGroupModel;
use crate::projection::{project_host_group, ProjectionMode};
use crate::reconcile::host_group::{update_host_group, validate_host_group};
use async_trait::async_trait;
use tracing::info;

pub struct HostGroupResource {
    client: ArrayClientRef,
}

impl HostGroupResource {
    pub fn new(client: ArrayClientRef) -> Self {
        Self { client }
    }

    async fn fetch(&self, ctx: &CallContext, id: &str) -> Result<HostGroupInfo> {
        self.client
            .get_host_group(ctx, id)
            .await
            .map_err(fetch_error(Self::KIND, id))
    }

    async fn exists(&self, ctx: &CallContext, id: &str) -> Result<bool> {
        found(self.client.get_host_group(ctx, id).await)
    }

    /// Remove what a failed create left behind
    async fn discard(&self, ctx: &CallContext, id: &str) -> Result<bool> {
        if !self.exists(ctx, id).await? {
            return Ok(false);
        }
        self.client.delete_host_group(ctx, id).await?;
        Ok(true)
    }
}

#[async_trait]
impl Resource for HostGroupResource {
    type Model = HostGroupModel;
    const KIND: ResourceKind = ResourceKind::HostGroup;

    async fn create(
        &self,
        ctx: &CallContext,
        plan: &HostGroupModel,
    ) -> Result<Applied<HostGroupModel>> {
        validate_host_group(plan)?;
        info!(host_group = %plan.name, hosts = plan.host_ids.len(), "creating host group");

        ensure_absent(Self::KIND, &plan.name, self.exists(ctx, &plan.name).await)?;

        let params = CreateHostGroupParams {
            host_group_id: plan.name.clone(),
            host_ids: unique_by(&plan.host_ids, |id| id.clone()),
            flags: plan.host_flags,
            consistent_lun: plan.consistent_lun,
        };
        if let Err(cause) = self.client.create_host_group(ctx, &params).await {
            let cleanup = self.discard(ctx, &plan.name).await;
            return Err(creation_error(Self::KIND, &plan.name, cause, cleanup));
        }

        let remote = self.fetch(ctx, &plan.name).await?;
        Ok(Applied::clean(project_host_group(&remote, Some(plan), ProjectionMode::Create)))
    }

    async fn read(&self, ctx: &CallContext, state: &HostGroupModel) -> Result<HostGroupModel> {
        let remote = self.fetch(ctx, state.remote_id()).await?;
        Ok(project_host_group(&remote, Some(state), ProjectionMode::Read))
    }

    async fn update(
        &self,
        ctx: &CallContext,
        plan: &HostGroupModel,
        state: &HostGroupModel,
    ) -> Result<Applied<HostGroupModel>> {
        let report = update_host_group(self.client.as_ref(), ctx, plan, state).await?;
        let id = refetch_id(&report, state.remote_id(), &plan.name);
        let remote = self.fetch(ctx, id).await?;
        Ok(Applied::with_diagnostics(
            project_host_group(&remote, Some(plan), ProjectionMode::Update),
            update_diagnostics(Self::KIND, id, &report),
        ))
    }

    async fn delete(&self, ctx: &CallContext, state: &HostGroupModel) -> Result<()> {
        let id = state.remote_id();
        info!(host_group = %id, "deleting host group");
        ignore_missing(Self::KIND, id, self.client.delete_host_group(ctx, id).await)
    }

    async fn import(&self, ctx: &CallContext, id: &str) -> Result<HostGroupModel> {
        info!(host_group = %id, "importing host group");
        let remote = self.fetch(ctx, id).await?;
        Ok(project_host_group(&remote, None, ProjectionMode::Import))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryArray;
    use crate::domain::array::CreateHostParams;
    use crate::domain::ports::{ArrayClient, Operation};
    use crate::error::Error;
    use crate::provider::testing::{array, ctx};
    use assert_matches::assert_matches;
    use std::sync::Arc;

    async fn with_hosts(names: &[&str]) -> (Arc<MemoryArray>, HostGroupResource) {
        let (array, client) = array();
        for (i, name) in names.iter().enumerate() {
            array
                .create_host(
                    &ctx(),
                    &CreateHostParams {
                        host_id: name.to_string(),
                        initiators: vec![format!("10000000c900000{i}")],
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }
        array.clear_calls();
        (array, HostGroupResource::new(client))
    }

    #[tokio::test]
    async fn test_create_update_and_rename() {
        let (array, resource) = with_hosts(&["h1", "h2", "h3"]).await;
        let plan = HostGroupModel::new("cluster", vec!["h1".into(), "h2".into()]);
        let state = resource.create(&ctx(), &plan).await.unwrap().state;
        assert_eq!(state.host_ids, vec!["h1".to_string(), "h2".to_string()]);
        assert_eq!(state.num_of_hosts, 2);

        let mut next = plan.clone();
        next.name = "cluster-b".into();
        next.host_ids = vec!["h2".into(), "h3".into()];
        array.clear_calls();
        let applied = resource.update(&ctx(), &next, &state).await.unwrap();

        assert!(!applied.has_errors());
        assert_eq!(applied.state.id, "cluster-b");
        assert_eq!(applied.state.host_ids, vec!["h2".to_string(), "h3".to_string()]);
        assert!(array.calls().iter().all(|call| call.target == "cluster"));
    }

    #[tokio::test]
    async fn test_import_then_diff_issues_no_calls() {
        let (array, resource) = with_hosts(&["h1", "h2"]).await;
        let plan = HostGroupModel::new("cluster", vec!["h2".into(), "h1".into()]);
        resource.create(&ctx(), &plan).await.unwrap();

        let imported = resource.import(&ctx(), "cluster").await.unwrap();
        array.clear_calls();
        resource.update(&ctx(), &imported, &imported).await.unwrap();
        assert!(array.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_member_fails_create_without_leftovers() {
        let (array, resource) = with_hosts(&["h1"]).await;
        let plan = HostGroupModel::new("cluster", vec!["h1".into(), "ghost".into()]);

        let err = resource.create(&ctx(), &plan).await.unwrap_err();
        assert_matches!(err, Error::CreateFailed { .. });
        assert!(array.calls_of(Operation::DeleteHostGroup).is_empty());
        assert!(array.get_host_group(&ctx(), "cluster").await.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_create_leaves_existing_group() {
        let (array, resource) = with_hosts(&["h1", "h2"]).await;
        let plan = HostGroupModel::new("cluster", vec!["h1".into()]);
        resource.create(&ctx(), &plan).await.unwrap();
        array.clear_calls();

        let other = HostGroupModel::new("cluster", vec!["h2".into()]);
        let err = resource.create(&ctx(), &other).await.unwrap_err();
        assert_matches!(
            err,
            Error::CreateFailed { ref reason, .. } if reason.contains("already exists")
        );
        assert!(array.calls().is_empty());
        let existing = array.get_host_group(&ctx(), "cluster").await.unwrap();
        assert_eq!(existing.host_ids(), vec!["h1".to_string()]);
    }
}
