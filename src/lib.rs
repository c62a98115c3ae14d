//! # Forex Clock Backend - HTTP Service Skeleton
//!
//! Infrastructure scaffolding for the forex-clock API: health, readiness,
//! and version-introspection endpoints behind a fixed middleware pipeline,
//! with an explicit start/stop lifecycle and graceful shutdown. Built with
//! [Axum](https://crates.io/crates/axum); no market logic lives here.
//!
//! ## Request pipeline
//!
//! Every request flows through the same ordered stack:
//!
//! ```text
//! panic recovery → version negotiation → preflight headers → CORS
//!               → request logging → timeout → route handler
//! ```
//!
//! Recovery sits outermost so a failure in any stage ends in a written
//! 500 response. Version negotiation parses the `Accept` header
//! (`application/vnd.fxclock.v<major>[.<minor>]+json`), normalizes the
//! token, and rejects unsupported versions with a 400 before anything else
//! runs.
//!
//! ## HTTP surface
//!
//! | Method | Endpoint   | Description                                  |
//! |--------|------------|----------------------------------------------|
//! | GET    | `/health`  | Liveness: uptime in seconds                  |
//! | GET    | `/ready`   | Readiness over injected dependencies         |
//! | GET    | `/version` | Configured release version                   |
//!
//! Non-GET methods on these paths return 405; anything else returns 404.
//! All responses are JSON in a `{"meta":{},"data":...}` envelope and carry
//! `X-Powered-By` and `X-Detected-Version` headers.
//!
//! ## Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | Route handlers, middleware, and router configuration |
//! | [`config`] | File/environment configuration loading |
//! | [`db`] | Database capability trait and Postgres implementation |
//! | [`error`] | API error types with `IntoResponse` implementation |
//! | [`models`] | Response DTOs and the JSON envelope |
//! | [`server`] | Server lifecycle and pipeline assembly |
//! | [`state`] | Application state management |

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod server;
pub mod state;
