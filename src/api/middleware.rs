//! Request middleware: version negotiation, preflight headers, request
//! logging, and the panic-recovery response.
//!
//! The composition order is fixed in [`crate::server::apply_middleware`];
//! each stage here keeps all of its working state on the request task, so
//! concurrent requests can never observe one another's negotiation results.

use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderValue, Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use regex::Regex;
use std::any::Any;
use std::net::SocketAddr;
use std::sync::{Arc, LazyLock};
use std::time::Instant;
use tracing::{info, warn};

/// Response header carrying the normalized API version.
pub const DETECTED_VERSION_HEADER: &str = "X-Detected-Version";

/// Response header carrying the serving application name.
pub const POWERED_BY_HEADER: &str = "X-Powered-By";

/// Pattern extracting a version token from the `Accept` header.
pub const ACCEPT_HEADER_PATTERN: &str = r"application/vnd\.fxclock\.v(\d+(?:\.\d+)?)\+json";

/// Strict shape every negotiated version must have before the supported-set
/// membership check.
pub const VERSION_PATTERN: &str = r"^\d+\.\d+$";

static ACCEPT_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(ACCEPT_HEADER_PATTERN).expect("accept header pattern is valid"));

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(VERSION_PATTERN).expect("version pattern is valid"));

// ============================================================================
// Version negotiation
// ============================================================================

/// Version negotiation middleware.
///
/// Extracts a version token from the `Accept` header (first pattern match
/// wins), falling back to the configured default, and appends a `.0` minor
/// component when missing. Unsupported versions short-circuit with a 400
/// error body naming the rejected token and the supported set; accepted
/// requests proceed and the response gains `X-Detected-Version`.
pub async fn negotiate_version(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let accept = request
        .headers()
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok());
    let version = resolve_version(accept, &state.config.api.default_version);

    let supported = &state.config.api.supported_versions;
    if !VERSION_RE.is_match(&version) || !supported.iter().any(|v| v == &version) {
        return ApiError::UnsupportedVersion {
            version,
            supported: supported.join(", "),
        }
        .into_response();
    }

    let mut response = next.run(request).await;
    response.headers_mut().insert(
        DETECTED_VERSION_HEADER,
        HeaderValue::from_str(&version).expect("validated version is a valid header value"),
    );
    response
}

/// Resolves and normalizes the version token for one request.
///
/// Absent or non-matching headers fall back to `default`; a token without a
/// minor component gets `.0` appended. The result still needs the strict
/// [`VERSION_PATTERN`] check, since a malformed default passes through here.
fn resolve_version(accept: Option<&str>, default: &str) -> String {
    let token = accept
        .and_then(|header| ACCEPT_HEADER_RE.captures(header))
        .and_then(|captures| captures.get(1))
        .map_or_else(|| default.to_string(), |m| m.as_str().to_string());

    if VERSION_RE.is_match(&token) {
        token
    } else {
        format!("{token}.0")
    }
}

// ============================================================================
// Preflight headers
// ============================================================================

/// Preflight middleware: stamps `X-Powered-By` on every response.
///
/// OPTIONS preflight requests themselves are answered by the CORS layer.
pub async fn preflight_headers(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(POWERED_BY_HEADER, state.powered_by.clone());
    response
}

// ============================================================================
// Request logging
// ============================================================================

/// Request logging middleware.
///
/// Emits exactly one log line per request after the downstream stack
/// returns, carrying latency, client address, method, and path. The
/// timestamp comes from the tracing formatter. The response passes through
/// unaltered.
pub async fn log_requests(request: Request<Body>, next: Next) -> Response {
    let client = extract_client_ip(&request);
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let start = Instant::now();

    let response = next.run(request).await;

    info!(
        latency = ?start.elapsed(),
        client = %client,
        method = %method,
        path = %path,
        "request"
    );
    response
}

/// Extract the client address from a request.
fn extract_client_ip(request: &Request<Body>) -> String {
    // Try X-Forwarded-For header first
    if let Some(forwarded) = request.headers().get("X-Forwarded-For")
        && let Ok(value) = forwarded.to_str()
        && let Some(ip) = value.split(',').next()
    {
        return ip.trim().to_string();
    }

    // Try X-Real-IP header
    if let Some(real_ip) = request.headers().get("X-Real-IP")
        && let Ok(value) = real_ip.to_str()
    {
        return value.to_string();
    }

    // Fall back to the peer address recorded by the listener
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.to_string();
    }

    "unknown".to_string()
}

// ============================================================================
// Panic recovery
// ============================================================================

/// Converts a panic caught anywhere in the pipeline into a generic 500.
///
/// Installed as the outermost layer, so a failure in any stage — not just
/// the terminal handler — ends in a written response instead of a dead
/// request task. The payload is logged at warning level and never echoed.
pub fn recover_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };

    warn!(error = %detail, "recovering from panic");
    ApiError::Internal.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;

    // ========================================================================
    // Version resolution tests
    // ========================================================================

    #[test]
    fn test_resolve_version_absent_header() {
        assert_eq!(resolve_version(None, "1.0"), "1.0");
    }

    #[test]
    fn test_resolve_version_non_matching_header() {
        assert_eq!(resolve_version(Some("application/json"), "1.0"), "1.0");
    }

    #[test]
    fn test_resolve_version_full_token() {
        assert_eq!(
            resolve_version(Some("application/vnd.fxclock.v2.1+json"), "1.0"),
            "2.1"
        );
    }

    #[test]
    fn test_resolve_version_missing_minor() {
        assert_eq!(
            resolve_version(Some("application/vnd.fxclock.v2+json"), "1.0"),
            "2.0"
        );
    }

    #[test]
    fn test_resolve_version_first_match_wins() {
        let accept = "application/vnd.fxclock.v3+json, application/vnd.fxclock.v1.0+json";
        assert_eq!(resolve_version(Some(accept), "1.0"), "3.0");
    }

    #[test]
    fn test_resolve_version_default_missing_minor() {
        assert_eq!(resolve_version(Some("text/html"), "2"), "2.0");
    }

    #[test]
    fn test_resolve_version_malformed_default_fails_strict_check() {
        let version = resolve_version(None, "2.");
        assert!(!VERSION_RE.is_match(&version));
    }

    // ========================================================================
    // Client IP extraction tests
    // ========================================================================

    #[test]
    fn test_extract_client_ip_forwarded() {
        let request = Request::builder()
            .uri("/test")
            .header("X-Forwarded-For", "192.168.1.1, 10.0.0.1")
            .body(Body::empty())
            .unwrap();

        let ip = extract_client_ip(&request);
        assert_eq!(ip, "192.168.1.1");
    }

    #[test]
    fn test_extract_client_ip_real_ip() {
        let request = Request::builder()
            .uri("/test")
            .header("X-Real-IP", "192.168.1.2")
            .body(Body::empty())
            .unwrap();

        let ip = extract_client_ip(&request);
        assert_eq!(ip, "192.168.1.2");
    }

    #[test]
    fn test_extract_client_ip_connect_info() {
        let mut request = Request::builder()
            .uri("/test")
            .body(Body::empty())
            .unwrap();
        let addr: SocketAddr = "127.0.0.1:4567".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));

        let ip = extract_client_ip(&request);
        assert_eq!(ip, "127.0.0.1:4567");
    }

    #[test]
    fn test_extract_client_ip_unknown() {
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();

        let ip = extract_client_ip(&request);
        assert_eq!(ip, "unknown");
    }
}
