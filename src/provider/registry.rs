//! Provider registry
//!
//! Dispatches JSON-encoded plans and states to the resource named by a
//! [`ResourceKind`] and turns every outcome into a state plus diagnostics.

use super::{
    Applied, Diagnostic, HostGroupResource, HostResource, MaskingViewResource, PortGroupResource,
    Resource, ResourceKind, StorageGroupResource, VolumeResource,
};
use crate::domain::ports::{ArrayClientRef, CallContext};
use crate::error::{Error, Result};
use crate::model::{
    HostGroupModel, HostModel, MaskingViewModel, PortGroupModel, StorageGroupModel, VolumeModel,
};
use schemars::schema_for;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use tracing::{debug, info_span, Instrument};

/// Lifecycle step requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleOp {
    Create,
    Read,
    Update,
    Delete,
    Import,
}

impl LifecycleOp {
    pub const fn as_str(self) -> &'static str {
        match self {
            LifecycleOp::Create => "create",
            LifecycleOp::Read => "read",
            LifecycleOp::Update => "update",
            LifecycleOp::Delete => "delete",
            LifecycleOp::Import => "import",
        }
    }
}

impl FromStr for LifecycleOp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "create" => Ok(LifecycleOp::Create),
            "read" => Ok(LifecycleOp::Read),
            "update" => Ok(LifecycleOp::Update),
            "delete" => Ok(LifecycleOp::Delete),
            "import" => Ok(LifecycleOp::Import),
            other => Err(Error::Precondition(format!("unknown lifecycle operation {other}"))),
        }
    }
}

impl std::fmt::Display for LifecycleOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs of one lifecycle step; which fields are needed depends on the step
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleRequest {
    /// Desired configuration, for create and update
    pub plan: Option<Value>,
    /// Recorded state, for read, update and delete
    pub state: Option<Value>,
    /// Array identifier, for import
    pub id: Option<String>,
}

/// Resulting state (`null` when the entity is gone or unknown) and diagnostics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LifecycleResponse {
    pub state: Option<Value>,
    pub diagnostics: Vec<Diagnostic>,
}

impl LifecycleResponse {
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diagnostic| diagnostic.severity == super::Severity::Error)
    }
}

/// Entry point for every resource type
#[derive(Clone)]
pub struct Provider {
    client: ArrayClientRef,
}

impl Provider {
    pub fn new(client: ArrayClientRef) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ArrayClientRef {
        &self.client
    }

    /// JSON schema of every resource model, keyed by type name
    pub fn schema() -> Result<Value> {
        let mut schemas = serde_json::Map::new();
        for kind in ResourceKind::ALL {
            let schema = match kind {
                ResourceKind::Host => serde_json::to_value(schema_for!(HostModel))?,
                ResourceKind::HostGroup => serde_json::to_value(schema_for!(HostGroupModel))?,
                ResourceKind::PortGroup => serde_json::to_value(schema_for!(PortGroupModel))?,
                ResourceKind::MaskingView => serde_json::to_value(schema_for!(MaskingViewModel))?,
                ResourceKind::StorageGroup => serde_json::to_value(schema_for!(StorageGroupModel))?,
                ResourceKind::Volume => serde_json::to_value(schema_for!(VolumeModel))?,
            };
            schemas.insert(kind.type_name().to_string(), schema);
        }
        Ok(Value::Object(schemas))
    }

    /// Run one lifecycle step
    pub async fn dispatch(
        &self,
        ctx: &CallContext,
        kind: ResourceKind,
        op: LifecycleOp,
        request: LifecycleRequest,
    ) -> LifecycleResponse {
        let span = info_span!("lifecycle", resource = kind.type_name(), op = op.as_str());
        let client = self.client.clone();
        async move {
            match kind {
                ResourceKind::Host => run(&HostResource::new(client), ctx, op, request).await,
                ResourceKind::HostGroup => {
                    run(&HostGroupResource::new(client), ctx, op, request).await
                }
                ResourceKind::PortGroup => {
                    run(&PortGroupResource::new(client), ctx, op, request).await
                }
                ResourceKind::MaskingView => {
                    run(&MaskingViewResource::new(client), ctx, op, request).await
                }
                ResourceKind::StorageGroup => {
                    run(&StorageGroupResource::new(client), ctx, op, request).await
                }
                ResourceKind::Volume => run(&VolumeResource::new(client), ctx, op, request).await,
            }
        }
        .instrument(span)
        .await
    }
}

async fn run<R: Resource>(
    resource: &R,
    ctx: &CallContext,
    op: LifecycleOp,
    request: LifecycleRequest,
) -> LifecycleResponse {
    // A failed update or delete leaves the recorded state in place
    let fallback = match op {
        LifecycleOp::Update | LifecycleOp::Delete => request.state.clone(),
        _ => None,
    };

    match execute(resource, ctx, op, &request).await {
        Ok(applied) => LifecycleResponse {
            state: applied.state,
            diagnostics: applied.diagnostics,
        },
        Err(err) if op == LifecycleOp::Read && err.is_not_found() => {
            debug!(error = %err, "entity is gone");
            LifecycleResponse::default()
        }
        Err(err) => LifecycleResponse {
            state: fallback,
            diagnostics: vec![Diagnostic::from_error(summary(R::KIND, op), &err)],
        },
    }
}

async fn execute<R: Resource>(
    resource: &R,
    ctx: &CallContext,
    op: LifecycleOp,
    request: &LifecycleRequest,
) -> Result<Applied<Option<Value>>> {
    match op {
        LifecycleOp::Create => {
            let plan = decode::<R::Model>(request.plan.as_ref(), "plan", op)?;
            encode(resource.create(ctx, &plan).await?)
        }
        LifecycleOp::Read => {
            let state = decode::<R::Model>(request.state.as_ref(), "state", op)?;
            encode(Applied::clean(resource.read(ctx, &state).await?))
        }
        LifecycleOp::Update => {
            let plan = decode::<R::Model>(request.plan.as_ref(), "plan", op)?;
            let state = decode::<R::Model>(request.state.as_ref(), "state", op)?;
            encode(resource.update(ctx, &plan, &state).await?)
        }
        LifecycleOp::Delete => {
            let state = decode::<R::Model>(request.state.as_ref(), "state", op)?;
            resource.delete(ctx, &state).await?;
            Ok(Applied::clean(None))
        }
        LifecycleOp::Import => {
            let id = request
                .id
                .as_deref()
                .filter(|id| !id.trim().is_empty())
                .ok_or_else(|| Error::Precondition("import requires an id".into()))?;
            encode(Applied::clean(resource.import(ctx, id).await?))
        }
    }
}

fn decode<M: serde::de::DeserializeOwned>(
    value: Option<&Value>,
    field: &str,
    op: LifecycleOp,
) -> Result<M> {
    let value = value.ok_or_else(|| Error::Precondition(format!("{op} requires a {field}")))?;
    Ok(serde_json::from_value(value.clone())?)
}

fn encode<M: Serialize>(applied: Applied<M>) -> Result<Applied<Option<Value>>> {
    let state = serde_json::to_value(&applied.state)?;
    Ok(applied.map(|_| Some(state)))
}

fn summary(kind: ResourceKind, op: LifecycleOp) -> String {
    let verb = match op {
        LifecycleOp::Create => "creating",
        LifecycleOp::Read => "reading",
        LifecycleOp::Update => "updating",
        LifecycleOp::Delete => "deleting",
        LifecycleOp::Import => "importing",
    };
    format!("Error {verb} {}", kind.display_name())
}
