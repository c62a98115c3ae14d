//! Response DTOs and the JSON envelope shared by every endpoint.

use serde::Serialize;

/// Ready status reported for the service and each dependency.
pub const READY_STATUS_OK: &str = "ok";
/// Ready status reported for a failing dependency.
pub const READY_STATUS_ERROR: &str = "error";

/// Meta information attached to every response. Serializes as `{}`.
#[derive(Debug, Default, Serialize)]
pub struct Meta {}

/// Envelope wrapping a single resource: `{"meta":{},"data":...}`.
///
/// Responses without a body payload (404, 405, 500) use `Envelope<Option<()>>`
/// so `data` serializes as `null`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    /// Meta information about the response.
    pub meta: Meta,
    /// The wrapped resource.
    pub data: T,
}

impl<T> Envelope<T> {
    /// Wraps `data` in the standard envelope.
    pub fn new(data: T) -> Self {
        Self {
            meta: Meta::default(),
            data,
        }
    }
}

/// Envelope wrapping one or more errors: `{"meta":{},"errors":[...]}`.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    /// Meta information about the response.
    pub meta: Meta,
    /// The errors being reported.
    pub errors: Vec<ErrorBody>,
}

impl ErrorEnvelope {
    /// Wraps a single error message in the error envelope.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            meta: Meta::default(),
            errors: vec![ErrorBody {
                message: message.into(),
            }],
        }
    }
}

/// A single error within an [`ErrorEnvelope`].
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable error message.
    pub message: String,
}

/// Properties every health-style response contains.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Whole seconds since the service started.
    pub uptime: u64,
}

/// Response body for `/ready`.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Common health properties.
    #[serde(flatten)]
    pub health: HealthResponse,
    /// Status of the service itself.
    pub service: &'static str,
    /// Status of the database dependency.
    pub db: &'static str,
    /// Kind identifier of the database dependency.
    #[serde(rename = "db-type")]
    pub db_type: String,
}

/// Response body for `/version`.
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    /// Common health properties.
    #[serde(flatten)]
    pub health: HealthResponse,
    /// Configured release version of the application.
    pub version: String,
}
