//! Error types for the HTTP API.

use crate::models::{Envelope, ErrorEnvelope};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};


/// Request-scoped API errors. Every variant ends in a written HTTP
/// response; none of them propagate past the pipeline boundary.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The negotiated API version is not in the supported set.
    #[error("Unsupported version: {version}. Supported versions: {supported}")]
    UnsupportedVersion {
        /// The normalized version token that was rejected.
        version: String,
        /// Comma-joined list of supported versions, in configured order.
        supported: String,
    },

    /// The request method is not allowed for the path.
    #[error("method not allowed")]
    MethodNotAllowed,

    /// The request path is not routed.
    #[error("not found")]
    NotFound,

    /// Unhandled failure while processing the request.
    #[error("internal server error")]
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::UnsupportedVersion { .. } => {
                let body = Json(ErrorEnvelope::new(self.to_string()));
                (StatusCode::BAD_REQUEST, body).into_response()
            }
            ApiError::MethodNotAllowed => {
                empty_resource(StatusCode::METHOD_NOT_ALLOWED).into_response()
            }
            ApiError::NotFound => empty_resource(StatusCode::NOT_FOUND).into_response(),
            // The panic payload is logged, never echoed to the client.
            ApiError::Internal => {
                empty_resource(StatusCode::INTERNAL_SERVER_ERROR).into_response()
            }
        }
    }
}

/// Status-only response in the standard envelope, `data` set to `null`.
fn empty_resource(status: StatusCode) -> (StatusCode, Json<Envelope<Option<()>>>) {
    (status, Json(Envelope::new(None)))
}
