//! Database collaborators: the capability trait and its Postgres implementation.

mod pool;

pub use pool::{DB_KIND, FxDb, form_dsn};

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

/// Database error types.
#[derive(Debug, Error)]
pub enum DbError {
    /// Underlying driver failure.
    #[error("database error: {0}")]
    Driver(#[from] sqlx::Error),
    /// The database handle is not usable.
    #[error("database unavailable: {0}")]
    Unavailable(String),
}

/// Capability every database implementation must provide.
///
/// Injected into [`crate::state::AppState`] as a trait object so handlers
/// and tests can substitute implementations.
#[async_trait]
pub trait Database: Send + Sync {
    /// Probes the database for readiness. Used by `/ready`.
    async fn ready(&self) -> Result<(), DbError>;

    /// Closes the underlying connection handles.
    async fn close(&self) -> Result<(), DbError>;

    /// Returns the textual kind of database. Used by `/ready`.
    fn kind(&self) -> &str;

    /// Returns the raw connection pool, when the implementation has one.
    fn pool(&self) -> Option<&PgPool>;
}
