//! HTTP server lifecycle and middleware pipeline assembly.
//!
//! [`Server::start`] wires the route table into the middleware pipeline and
//! launches the listen/accept loop on a spawned task without blocking the
//! caller. Binding happens asynchronously: `start` returns before the
//! socket is bound, and callers that need confirmation await the returned
//! [`Bound`] handle instead of probing or sleeping.
//!
//! [`Server::stop`] performs a graceful shutdown — stop accepting, drain
//! in-flight requests — bounded by the configured shutdown timeout. A
//! timed-out stop leaves the server marked running, matching the contract
//! that only a successful stop transitions the state.

use crate::api::middleware::{log_requests, negotiate_version, preflight_headers, recover_panic};
use crate::api::routes::create_router;
use crate::state::AppState;
use axum::Router;
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tracing::{error, info};

/// Server lifecycle error types.
#[derive(Debug, Error)]
pub enum ServerError {
    /// `start` was called while the server is running.
    #[error("attempted to start a server that is already running")]
    AlreadyRunning,
    /// `stop` was called while the server is not running.
    #[error("attempted to stop a non-running server")]
    NotRunning,
    /// Graceful shutdown did not drain within the configured timeout.
    /// The server remains marked running.
    #[error("graceful shutdown timed out after {0:?}")]
    ShutdownTimeout(Duration),
    /// The listener could not be bound.
    #[error("failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),
    /// The serve task failed.
    #[error("server task failed: {0}")]
    Serve(String),
}

/// Confirmation handle for an in-progress bind.
///
/// Resolves to the bound local address once the listener is accepting
/// connections, or to an error if binding failed.
#[derive(Debug)]
pub struct Bound {
    rx: oneshot::Receiver<Result<SocketAddr, std::io::Error>>,
}

impl Bound {
    /// Waits for the listener bind to complete.
    ///
    /// # Errors
    /// Returns error if binding failed or the serve task exited early.
    pub async fn wait(self) -> Result<SocketAddr, ServerError> {
        self.rx
            .await
            .map_err(|_| ServerError::Serve("server task exited before binding".to_string()))?
            .map_err(ServerError::Bind)
    }
}

struct ServeHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

/// The application HTTP server.
///
/// Exactly one instance is meaningful per process. State transitions go
/// through `&mut self`, so concurrent start/stop calls are ruled out at
/// compile time rather than synchronized at runtime.
pub struct Server {
    state: Arc<AppState>,
    handle: Option<ServeHandle>,
}

impl Server {
    /// Creates a stopped server over the given application state.
    #[must_use]
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            handle: None,
        }
    }

    /// Starts a non-running server.
    ///
    /// Assembles routes and middleware, spawns the listen/accept loop, and
    /// marks the server running immediately — without waiting for the bind
    /// to succeed or fail. Await the returned [`Bound`] handle for bind
    /// confirmation.
    ///
    /// # Errors
    /// Returns [`ServerError::AlreadyRunning`] if the server is running.
    pub fn start(&mut self) -> Result<Bound, ServerError> {
        if self.is_running() {
            return Err(ServerError::AlreadyRunning);
        }

        let app = apply_middleware(create_router(Arc::clone(&self.state)), &self.state);
        Ok(self.spawn(app))
    }

    /// Spawns the listen/accept loop for an assembled app and marks the
    /// server running.
    fn spawn(&mut self, app: Router) -> Bound {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.server.port));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (bound_tx, bound_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let listener = match TcpListener::bind(addr).await {
                Ok(listener) => listener,
                Err(err) => {
                    error!(%addr, error = %err, "failed to bind listener");
                    let _ = bound_tx.send(Err(err));
                    return;
                }
            };

            let local = match listener.local_addr() {
                Ok(local) => local,
                Err(err) => {
                    error!(error = %err, "failed to read bound address");
                    let _ = bound_tx.send(Err(err));
                    return;
                }
            };
            info!(addr = %local, "listening for requests");
            let _ = bound_tx.send(Ok(local));

            let serve = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });

            if let Err(err) = serve.await {
                error!(error = %err, "server error");
            }
        });

        self.handle = Some(ServeHandle {
            shutdown: Some(shutdown_tx),
            task,
        });

        Bound { rx: bound_rx }
    }

    /// Stops a running server gracefully.
    ///
    /// Signals the accept loop to stop taking connections and waits for
    /// in-flight requests to drain, bounded by the configured shutdown
    /// timeout.
    ///
    /// # Errors
    /// Returns [`ServerError::NotRunning`] if the server is stopped, and
    /// [`ServerError::ShutdownTimeout`] if draining did not finish in time —
    /// in which case the server stays marked running.
    pub async fn stop(&mut self) -> Result<(), ServerError> {
        let mut handle = self.handle.take().ok_or(ServerError::NotRunning)?;

        if let Some(shutdown) = handle.shutdown.take() {
            let _ = shutdown.send(());
        }

        let timeout = Duration::from_secs(self.state.config.server.timeouts.shutdown);
        match tokio::time::timeout(timeout, &mut handle.task).await {
            Err(_elapsed) => {
                // Drain still in progress: restore the handle so the server
                // keeps reporting running and a later stop can retry.
                self.handle = Some(handle);
                Err(ServerError::ShutdownTimeout(timeout))
            }
            Ok(Err(join_err)) => Err(ServerError::Serve(join_err.to_string())),
            Ok(Ok(())) => {
                info!("server stopped");
                Ok(())
            }
        }
    }

    /// Reports whether the server is currently marked running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

/// Wraps the route table in the fixed middleware pipeline.
///
/// Execution order on the way in: panic recovery (outermost, so a failure
/// in any later stage still ends in a 500 response), version negotiation,
/// preflight headers, CORS, request logging, request timeout, terminal
/// handler. Composition is fixed here at construction; nothing reorders it
/// per request.
pub(crate) fn apply_middleware(router: Router, state: &Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let read_timeout = Duration::from_secs(state.config.server.timeouts.read);

    // `layer` wraps outside-in: the first layer added sits closest to the
    // handler, the last added runs first.
    router
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            read_timeout,
        ))
        .layer(from_fn(log_requests))
        .layer(cors)
        .layer(from_fn_with_state(Arc::clone(state), preflight_headers))
        .layer(from_fn_with_state(Arc::clone(state), negotiate_version))
        .layer(CatchPanicLayer::custom(recover_panic))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::middleware::{DETECTED_VERSION_HEADER, POWERED_BY_HEADER};
    use crate::config::Config;
    use crate::db::{Database, DbError};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use axum::routing::get;
    use sqlx::PgPool;
    use tower::util::ServiceExt;

    struct StubDb;

    #[async_trait]
    impl Database for StubDb {
        async fn ready(&self) -> Result<(), DbError> {
            Ok(())
        }

        async fn close(&self) -> Result<(), DbError> {
            Ok(())
        }

        fn kind(&self) -> &str {
            "stub-db"
        }

        fn pool(&self) -> Option<&PgPool> {
            None
        }
    }

    fn test_state() -> Arc<AppState> {
        let mut config = Config::default();
        // Ephemeral port so tests never collide
        config.server.port = 0;
        config.server.timeouts.shutdown = 2;
        Arc::new(AppState::new(config, Arc::new(StubDb)).expect("state should build"))
    }

    // ========================================================================
    // Lifecycle tests
    // ========================================================================

    #[tokio::test]
    async fn test_start_binds_and_reports_running() {
        let mut server = Server::new(test_state());
        assert!(!server.is_running());

        let bound = server.start().expect("start should succeed");
        assert!(server.is_running());

        let addr = bound.wait().await.expect("bind should succeed");
        assert_ne!(addr.port(), 0);

        server.stop().await.expect("stop should succeed");
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn test_start_twice_returns_already_running() {
        let mut server = Server::new(test_state());
        let bound = server.start().expect("first start should succeed");
        bound.wait().await.expect("bind should succeed");

        let err = server.start().expect_err("second start should fail");
        assert!(matches!(err, ServerError::AlreadyRunning));
        assert!(server.is_running());

        server.stop().await.expect("stop should succeed");
    }

    #[tokio::test]
    async fn test_stop_twice_returns_not_running() {
        let mut server = Server::new(test_state());
        let bound = server.start().expect("start should succeed");
        bound.wait().await.expect("bind should succeed");

        server.stop().await.expect("first stop should succeed");

        let err = server.stop().await.expect_err("second stop should fail");
        assert!(matches!(err, ServerError::NotRunning));
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn test_stop_without_start_returns_not_running() {
        let mut server = Server::new(test_state());
        let err = server.stop().await.expect_err("stop should fail");
        assert!(matches!(err, ServerError::NotRunning));
    }

    #[tokio::test]
    async fn test_stop_timeout_keeps_server_running() {
        let mut config = Config::default();
        config.server.port = 0;
        config.server.timeouts.shutdown = 1;
        let state = Arc::new(AppState::new(config, Arc::new(StubDb)).expect("state should build"));

        async fn slow() -> &'static str {
            tokio::time::sleep(Duration::from_secs(3)).await;
            "done"
        }

        let mut server = Server::new(Arc::clone(&state));
        let app = apply_middleware(Router::new().route("/slow", get(slow)), &state);
        let addr = server.spawn(app).wait().await.expect("bind should succeed");
        assert!(server.is_running());

        let inflight = tokio::spawn(async move {
            reqwest::get(format!("http://{addr}/slow"))
                .await
                .expect("request should complete")
        });
        // Let the request reach the handler before draining starts.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let err = server.stop().await.expect_err("drain should time out");
        assert!(matches!(err, ServerError::ShutdownTimeout(_)));
        // A timed-out stop leaves the server running; the in-flight request
        // still finishes once the handler returns.
        assert!(server.is_running());

        let response = inflight.await.expect("client task should join");
        assert_eq!(response.status(), StatusCode::OK);

        server.stop().await.expect("stop should succeed once drained");
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn test_bind_failure_reported_through_bound_handle() {
        let state = test_state();

        // Occupy a port, then start a second server on it.
        let occupied = TcpListener::bind("0.0.0.0:0")
            .await
            .expect("bind should succeed");
        let port = occupied.local_addr().expect("local addr").port();

        let mut config = Config::default();
        config.server.port = port;
        let state_on_taken_port = Arc::new(
            AppState::new(config, Arc::clone(&state.db)).expect("state should build"),
        );

        let mut server = Server::new(state_on_taken_port);
        let bound = server.start().expect("start itself does not bind");
        // Start already reported success; only the confirmation handle
        // carries the failure.
        assert!(server.is_running());

        let err = bound.wait().await.expect_err("bind should fail");
        assert!(matches!(err, ServerError::Bind(_)));
    }

    // ========================================================================
    // Pipeline tests
    // ========================================================================

    #[tokio::test]
    async fn test_panic_in_handler_recovers_with_500() {
        async fn boom() {
            panic!("kaboom")
        }

        let state = test_state();
        let app = apply_middleware(Router::new().route("/boom", get(boom)), &state);

        let response = app
            .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_pipeline_stamps_headers() {
        let state = test_state();
        let app = apply_middleware(create_router(Arc::clone(&state)), &state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(POWERED_BY_HEADER).unwrap(),
            "fxclock"
        );
        assert_eq!(
            response.headers().get(DETECTED_VERSION_HEADER).unwrap(),
            "1.0"
        );
    }

    #[tokio::test]
    async fn test_pipeline_rejects_unsupported_version() {
        let state = test_state();
        let app = apply_middleware(create_router(Arc::clone(&state)), &state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ACCEPT, "application/vnd.fxclock.v2+json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(DETECTED_VERSION_HEADER).is_none());
    }
}
