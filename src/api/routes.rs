//! Route configuration.

use crate::api::handlers;
use crate::state::AppState;
use axum::Router;
use axum::routing::{MethodFilter, on};
use std::sync::Arc;

/// Creates the API router.
///
/// The route table is a fixed, tiny set: health, readiness, and version
/// introspection. Each path registers an explicit HEAD responder because
/// axum otherwise dispatches HEAD to the GET handler; every method other
/// than GET then reaches the 405 fallback, and unrouted paths reach the
/// 404 fallback.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            handlers::HEALTH_ROUTE,
            on(MethodFilter::GET, handlers::health)
                .on(MethodFilter::HEAD, handlers::method_not_allowed)
                .fallback(handlers::method_not_allowed),
        )
        .route(
            handlers::READY_ROUTE,
            on(MethodFilter::GET, handlers::ready)
                .on(MethodFilter::HEAD, handlers::method_not_allowed)
                .fallback(handlers::method_not_allowed),
        )
        .route(
            handlers::VERSION_ROUTE,
            on(MethodFilter::GET, handlers::version)
                .on(MethodFilter::HEAD, handlers::method_not_allowed)
                .fallback(handlers::method_not_allowed),
        )
        .fallback(handlers::not_found)
        .with_state(state)
}
