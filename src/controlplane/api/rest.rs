//! REST API Handlers
//!
//! Implements the REST API endpoints for volume listing, reusable-volume
//! queries, and application resource summaries.

use crate::controlplane::VolumeEngine;
use crate::domain::volume::Volume;
use crate::error::Error;
use crate::resources::application::ApplicationSummary;
use crate::resources::stateful::StatefulWorkloadQuery;
use axum::{
    extract::{rejection::QueryRejection, Json, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Query parameters of the stateful-workload endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatefulVolumesParams {
    /// Known replica count of the workload
    #[serde(default)]
    pub replicas: Option<u32>,
}

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub error: String,
    pub message: String,
}

impl From<&Error> for ApiErrorResponse {
    fn from(e: &Error) -> Self {
        Self {
            error: error_kind(e).into(),
            message: e.to_string(),
        }
    }
}

// =============================================================================
// REST Router
// =============================================================================

/// REST API router builder
pub struct RestRouter {
    engine: Arc<VolumeEngine>,
}

impl RestRouter {
    /// Create a new REST router
    pub fn new(engine: Arc<VolumeEngine>) -> Self {
        Self { engine }
    }

    /// Build the Axum router
    pub fn build(self) -> Router {
        let state = AppState {
            engine: self.engine,
        };

        Router::new()
            // Volume endpoints
            .route("/v1/volumes", get(list_volumes))
            .route("/v1/volumes/available/simple/:namespace", get(simple_volumes))
            .route("/v1/volumes/available/sts/:namespace/:name", get(stateful_volumes))
            // Application endpoints
            .route("/v1/applications/:namespace/:name/resources", get(application_resources))
            // Health and metrics endpoints
            .route("/health", get(health_check))
            .route("/ready", get(readiness_check))
            .route("/metrics", get(metrics))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    engine: Arc<VolumeEngine>,
}

// =============================================================================
// Handlers
// =============================================================================

/// List every persistent volume
async fn list_volumes(State(state): State<AppState>) -> Result<Json<Vec<Volume>>, ApiError> {
    let volumes = state.engine.list_volumes().await?;
    debug!(count = volumes.len(), "Listed volumes");
    Ok(Json(volumes))
}

/// Reusable volumes for a simple workload
async fn simple_volumes(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<Vec<Volume>>, ApiError> {
    Ok(Json(state.engine.simple_workload_volumes(&namespace).await?))
}

/// Reusable claim templates for a stateful workload
async fn stateful_volumes(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    params: Result<Query<StatefulVolumesParams>, QueryRejection>,
) -> Result<Json<Vec<Volume>>, ApiError> {
    let Query(params) = params?;
    let mut query = StatefulWorkloadQuery::new(namespace, name);
    query.replicas = params.replicas;

    Ok(Json(state.engine.stateful_workload_volumes(&query).await?))
}

/// Workload objects and pod warnings of an application
async fn application_resources(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<ApplicationSummary>, ApiError> {
    Ok(Json(state.engine.application_resources(&namespace, &name).await?))
}

/// Health check
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness check
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    if state.engine.is_shut_down() {
        (StatusCode::SERVICE_UNAVAILABLE, "shutting down")
    } else {
        (StatusCode::OK, "ready")
    }
}

/// Prometheus text exposition
async fn metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    let body = state.engine.metrics().encode()?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Engine error rendered as a JSON body with a matching status code
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(Error::ApiValidation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!(error = %self.0, status = status.as_u16(), "Request failed");
        } else {
            warn!(error = %self.0, status = status.as_u16(), "Request rejected");
        }

        (status, Json(ApiErrorResponse::from(&self.0))).into_response()
    }
}

/// Stable machine-readable error identifier
fn error_kind(e: &Error) -> &'static str {
    match e {
        Error::ApiValidation(_) => "invalid_request",
        Error::ListFailed { .. } | Error::Kube(_) => "cluster_unavailable",
        Error::DeadlineExceeded(_) => "deadline_exceeded",
        Error::Cancelled => "cancelled",
        Error::Configuration(_) | Error::Yaml(_) | Error::Io(_) => "configuration_error",
        Error::Internal(_) => "internal_error",
    }
}
