//! Port group lifecycle

use super::{
    creation_error, ensure_absent, fetch_error, found, ignore_missing, refetch_id,
    update_diagnostics, Applied, Resource, ResourceKind,
};
use crate::domain::array::{CreatePortGroupParams, PortGroupInfo, PortKey};
use crate::domain::compare::unique_by;
use crate::domain::ports::{ArrayClientRef, CallContext};
use crate::error::Result;
use crate::model::PortGroupModel;
use crate::projection::{project_port_group, ProjectionMode};
use crate::reconcile::port_group::{update_port_group, validate_port_group};
use async_trait::async_trait;
use tracing::info;

pub struct PortGroupResource {
    client: ArrayClientRef,
}

impl PortGroupResource {
    pub fn new(client: ArrayClientRef) -> Self {
        Self { client }
    }

    async fn fetch(&self, ctx: &CallContext, id: &str) -> Result<PortGroupInfo> {
        self.client
            .get_port_group(ctx, id)
            .await
            .map_err(fetch_error(Self::KIND, id))
    }

    async fn exists(&self, ctx: &CallContext, id: &str) -> Result<bool> {
        found(self.client.get_port_group(ctx, id).await)
    }

    /// Remove what a failed create left behind
    async fn discard(&self, ctx: &CallContext, id: &str) -> Result<bool> {
        if !self.exists(ctx, id).await? {
            return Ok(false);
        }
        self.client.delete_port_group(ctx, id).await?;
        Ok(true)
    }
}

#[async_trait]
impl Resource for PortGroupResource {
    type Model = PortGroupModel;
    const KIND: ResourceKind = ResourceKind::PortGroup;

    async fn create(
        &self,
        ctx: &CallContext,
        plan: &PortGroupModel,
    ) -> Result<Applied<PortGroupModel>> {
        validate_port_group(plan, None)?;
        info!(port_group = %plan.name, protocol = %plan.protocol, "creating port group");

        ensure_absent(Self::KIND, &plan.name, self.exists(ctx, &plan.name).await)?;

        let params = CreatePortGroupParams {
            port_group_id: plan.name.clone(),
            ports: unique_by(&plan.ports, PortKey::identity),
            protocol: plan.protocol.clone(),
        };
        if let Err(cause) = self.client.create_port_group(ctx, &params).await {
            let cleanup = self.discard(ctx, &plan.name).await;
            return Err(creation_error(Self::KIND, &plan.name, cause, cleanup));
        }

        let remote = self.fetch(ctx, &plan.name).await?;
        Ok(Applied::clean(project_port_group(&remote, Some(plan), ProjectionMode::Create)))
    }

    async fn read(&self, ctx: &CallContext, state: &PortGroupModel) -> Result<PortGroupModel> {
        let remote = self.fetch(ctx, state.remote_id()).await?;
        Ok(project_port_group(&remote, Some(state), ProjectionMode::Read))
    }

    async fn update(
        &self,
        ctx: &CallContext,
        plan: &PortGroupModel,
        state: &PortGroupModel,
    ) -> Result<Applied<PortGroupModel>> {
        let report = update_port_group(self.client.as_ref(), ctx, plan, state).await?;
        let id = refetch_id(&report, state.remote_id(), &plan.name);
        let remote = self.fetch(ctx, id).await?;
        Ok(Applied::with_diagnostics(
            project_port_group(&remote, Some(plan), ProjectionMode::Update),
            update_diagnostics(Self::KIND, id, &report),
        ))
    }

    async fn delete(&self, ctx: &CallContext, state: &PortGroupModel) -> Result<()> {
        let id = state.remote_id();
        info!(port_group = %id, "deleting port group");
        ignore_missing(Self::KIND, id, self.client.delete_port_group(ctx, id).await)
    }

    async fn import(&self, ctx: &CallContext, id: &str) -> Result<PortGroupModel> {
        info!(port_group = %id, "importing port group");
        let remote = self.fetch(ctx, id).await?;
        Ok(project_port_group(&remote, None, ProjectionMode::Import))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{ArrayClient, Operation};
    use crate::error::Error;
    use crate::provider::testing::{array, ctx};
    use assert_matches::assert_matches;

    fn plan() -> PortGroupModel {
        PortGroupModel::new(
            "pg1",
            "SCSI_FC",
            vec![
                PortKey::new("OR-1C", "0"),
                PortKey::new("or-1c", "0"),
                PortKey::new("OR-2C", "1"),
            ],
        )
    }

    #[tokio::test]
    async fn test_create_collapses_duplicate_ports() {
        let (array, client) = array();
        let resource = PortGroupResource::new(client);

        let state = resource.create(&ctx(), &plan()).await.unwrap().state;
        let created = &array.calls_of(Operation::CreatePortGroup)[0];
        assert_eq!(created.members, vec!["OR-1C:0".to_string(), "OR-2C:1".to_string()]);
        assert_eq!(state.ports, vec![PortKey::new("OR-1C", "0"), PortKey::new("OR-2C", "1")]);

        array.clear_calls();
        resource.update(&ctx(), &plan(), &state).await.unwrap();
        assert!(array.calls().is_empty());
    }

    #[tokio::test]
    async fn test_protocol_change_rejected_before_any_call() {
        let (array, client) = array();
        let resource = PortGroupResource::new(client);
        let state = resource.create(&ctx(), &plan()).await.unwrap().state;

        let mut next = plan();
        next.protocol = "SCSI_ISCSI".into();
        array.clear_calls();
        assert_matches!(resource.update(&ctx(), &next, &state).await, Err(Error::Precondition(_)));
        assert!(array.journal().is_empty());
    }

    #[tokio::test]
    async fn test_import_then_diff_issues_no_calls() {
        let (array, client) = array();
        let resource = PortGroupResource::new(client);
        resource.create(&ctx(), &plan()).await.unwrap();

        let imported = resource.import(&ctx(), "pg1").await.unwrap();
        assert_eq!(imported.protocol, "SCSI_FC");
        array.clear_calls();
        resource.update(&ctx(), &imported, &imported).await.unwrap();
        assert!(array.calls().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_create_leaves_existing_group() {
        let (array, client) = array();
        let resource = PortGroupResource::new(client);
        resource.create(&ctx(), &plan()).await.unwrap();
        array.clear_calls();

        let err = resource.create(&ctx(), &plan()).await.unwrap_err();
        assert_matches!(
            err,
            Error::CreateFailed { ref reason, .. } if reason.contains("already exists")
        );
        assert!(array.calls().is_empty());
        assert!(array.get_port_group(&ctx(), "pg1").await.is_ok());
    }
}
