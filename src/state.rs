//! Application state shared across all handlers and middleware.

use crate::config::{Config, ConfigError};
use crate::db::Database;
use axum::http::HeaderValue;
use std::sync::Arc;
use std::time::Instant;

/// Application state, constructed once at bootstrap and shared via `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The loaded application configuration.
    pub config: Config,
    /// The injected database dependency.
    pub db: Arc<dyn Database>,
    /// Value of the `X-Powered-By` response header, validated at construction.
    pub powered_by: HeaderValue,
    /// Instant the state was created; `/health` reports seconds since.
    start_time: Instant,
}

impl AppState {
    /// Creates the application state from configuration and an injected
    /// database handle.
    ///
    /// # Errors
    /// Returns error if the configured application name is not a valid
    /// header value.
    pub fn new(config: Config, db: Arc<dyn Database>) -> Result<Self, ConfigError> {
        let powered_by = HeaderValue::from_str(&config.name).map_err(|_| {
            ConfigError::InvalidValue(format!(
                "application name {:?} is not a valid header value",
                config.name
            ))
        })?;

        Ok(Self {
            config,
            db,
            powered_by,
            start_time: Instant::now(),
        })
    }

    /// Whole seconds since the service started.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
