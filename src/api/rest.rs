//! REST API Handlers
//!
//! Exposes the provider protocol: schema export, one endpoint per resource
//! type and lifecycle step, health and Prometheus metrics.

use crate::domain::ports::CallContext;
use crate::provider::{LifecycleOp, LifecycleRequest, Provider, ResourceKind};
use axum::{
    extract::{Json, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use prometheus::{Encoder, Registry, TextEncoder};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

// =============================================================================
// Request/Response Types
// =============================================================================

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiErrorResponse {
    fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
            details: None,
        }
    }
}

// =============================================================================
// REST Router
// =============================================================================

/// REST API router builder
pub struct RestRouter {
    provider: Provider,
    metrics: Registry,
    shutdown: CancellationToken,
    request_timeout: Duration,
}

impl RestRouter {
    pub fn new(
        provider: Provider,
        metrics: Registry,
        shutdown: CancellationToken,
        request_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            metrics,
            shutdown,
            request_timeout,
        }
    }

    /// Build the router
    pub fn build(self) -> Router {
        let state = AppState {
            provider: self.provider,
            metrics: self.metrics,
            shutdown: self.shutdown,
            request_timeout: self.request_timeout,
        };

        Router::new()
            .route("/v1/schema", get(get_schema))
            .route("/v1/resources/:kind/:op", post(run_lifecycle))
            .route("/health", get(health_check))
            .route("/metrics", get(export_metrics))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    provider: Provider,
    metrics: Registry,
    shutdown: CancellationToken,
    request_timeout: Duration,
}

// =============================================================================
// Handlers
// =============================================================================

/// Resource schemas keyed by type name
async fn get_schema() -> impl IntoResponse {
    match Provider::schema() {
        Ok(schema) => (StatusCode::OK, Json(schema)).into_response(),
        Err(e) => {
            error!("Schema export failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiErrorResponse::new("schema_failed", e.to_string())),
            )
                .into_response()
        }
    }
}

/// Run one lifecycle step.
///
/// Lifecycle failures are reported as diagnostics in a 200 response; only an
/// unknown resource type or step is an HTTP error.
async fn run_lifecycle(
    State(state): State<AppState>,
    Path((kind, op)): Path<(String, String)>,
    Json(request): Json<LifecycleRequest>,
) -> impl IntoResponse {
    let Some(kind) = ResourceKind::from_type_name(&kind) else {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiErrorResponse::new(
                "unknown_resource",
                format!("Unknown resource type: {kind}"),
            )),
        )
            .into_response();
    };
    let op = match op.parse::<LifecycleOp>() {
        Ok(op) => op,
        Err(e) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiErrorResponse::new("unknown_operation", e.to_string())),
            )
                .into_response();
        }
    };

    info!("{} {}", op, kind);

    // Cancelled on shutdown or once the request outlives its timeout
    let token = state.shutdown.child_token();
    let ctx = CallContext::with_token(token.clone());
    let timeout = state.request_timeout;
    let watchdog = tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        warn!(?timeout, "request timed out, cancelling");
        token.cancel();
    });

    let response = state.provider.dispatch(&ctx, kind, op, request).await;
    watchdog.abort();

    (StatusCode::OK, Json(response)).into_response()
}

/// Health check
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Prometheus text exposition
async fn export_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&state.metrics.gather(), &mut buffer) {
        error!("Metrics encoding failed: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}
