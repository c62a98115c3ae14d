//! Terminal route handlers for health, readiness, and version introspection.

use crate::error::ApiError;
use crate::models::{
    Envelope, HealthResponse, READY_STATUS_ERROR, READY_STATUS_OK, ReadyResponse, VersionResponse,
};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::error;

/// Health route path.
pub const HEALTH_ROUTE: &str = "/health";
/// Readiness route path.
pub const READY_ROUTE: &str = "/ready";
/// Version route path.
pub const VERSION_ROUTE: &str = "/version";

/// `GET /health`: liveness probe reporting uptime.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Envelope<HealthResponse>> {
    Json(Envelope::new(HealthResponse {
        uptime: state.uptime_secs(),
    }))
}

/// `GET /ready`: readiness probe over the injected dependencies.
///
/// The overall status is an OR over dependency statuses: any failing
/// dependency turns the response into a 500 with the same body shape.
pub async fn ready(State(state): State<Arc<AppState>>) -> Response {
    let db_status = match state.db.ready().await {
        Ok(()) => READY_STATUS_OK,
        Err(err) => {
            error!(error = %err, "database readiness check failed");
            READY_STATUS_ERROR
        }
    };

    let body = ReadyResponse {
        health: HealthResponse {
            uptime: state.uptime_secs(),
        },
        service: READY_STATUS_OK,
        db: db_status,
        db_type: state.db.kind().to_string(),
    };

    let statuses = [body.service, body.db];
    let status = if statuses.contains(&READY_STATUS_ERROR) {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };

    (status, Json(Envelope::new(body))).into_response()
}

/// `GET /version`: reports the configured release version.
pub async fn version(State(state): State<Arc<AppState>>) -> Json<Envelope<VersionResponse>> {
    Json(Envelope::new(VersionResponse {
        health: HealthResponse {
            uptime: state.uptime_secs(),
        },
        version: state.config.release_version.clone(),
    }))
}

/// Fallback for non-GET methods on routed paths.
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Fallback for unrouted paths.
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
