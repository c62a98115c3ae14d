//! Configuration module: defaults, file/environment loading, validation.
//!
//! Settings come from an optional TOML file named by the `FXCLOCK_CONFIG`
//! environment variable, overridden by `FXCLOCK__*` environment variables.
//! Every field has a default, so an empty environment yields a usable
//! configuration. The loaded [`Config`] is constructed once in `main` and
//! injected into the server and handlers; nothing reads it through a global.

use axum::http::HeaderValue;
use serde::Deserialize;
use thiserror::Error;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "FXCLOCK";

/// Environment variable naming an optional TOML configuration file.
pub const CONFIG_FILE_ENV: &str = "FXCLOCK_CONFIG";

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read or merge configuration sources.
    #[error("failed to load config: {0}")]
    LoadError(#[from] config::ConfigError),
    /// Failed to parse TOML configuration.
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    /// Invalid configuration value.
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name of the application, stamped on responses as `X-Powered-By`.
    pub name: String,
    /// Release version reported by `/version`.
    pub release_version: String,
    /// API version negotiation settings.
    pub api: ApiConfig,
    /// Database connection settings.
    pub db: DbConfig,
    /// Logging settings, consumed once at bootstrap.
    pub log: LogConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
}

/// API version negotiation configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Version assumed when the `Accept` header carries none.
    pub default_version: String,
    /// Versions the service accepts, in configured order.
    pub supported_versions: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            default_version: "1.0".to_string(),
            supported_versions: vec!["1.0".to_string()],
        }
    }
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Username for the database server.
    pub username: String,
    /// Password for the database server.
    pub password: String,
    /// Name of the database to use.
    pub database_name: String,
    /// Database server host.
    pub host: String,
    /// Database server port.
    pub port: u16,
    /// Max time (in seconds) to wait for connection operations.
    pub timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            database_name: String::new(),
            host: "localhost".to_string(),
            port: 5432,
            timeout_secs: 5,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log output format: `text` or `json`.
    pub formatter: String,
    /// Log level filter (e.g. `info`, `debug`).
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            formatter: "text".to_string(),
            level: "info".to_string(),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port the server listens on. Port 0 requests an ephemeral port.
    pub port: u16,
    /// Server timeouts, all in seconds.
    pub timeouts: ServerTimeouts,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 6010,
            timeouts: ServerTimeouts::default(),
        }
    }
}

/// Server timeout settings in seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerTimeouts {
    /// Timeout allowed for handling a request.
    pub read: u64,
    /// Timeout allowed for writing a response. Kept for deployment parity;
    /// the serve loop exposes no per-connection write deadline.
    pub write: u64,
    /// Timeout allowed for graceful shutdown to drain in-flight requests.
    pub shutdown: u64,
}

impl Default for ServerTimeouts {
    fn default() -> Self {
        Self {
            read: 30,
            write: 30,
            shutdown: 5,
        }
    }
}

impl Config {
    /// Loads configuration from the environment.
    ///
    /// Reads the TOML file named by `FXCLOCK_CONFIG` when set, then applies
    /// `FXCLOCK__*` environment variable overrides (`__` separates nesting,
    /// e.g. `FXCLOCK__SERVER__PORT=8080`).
    ///
    /// # Errors
    /// Returns error if a source cannot be read or the result is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            builder = builder.add_source(config::File::with_name(&path));
        }

        let sources = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let config: Config = sources.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    /// Returns error if content cannot be parsed or is invalid.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::InvalidValue(
                "application name cannot be empty".to_string(),
            ));
        }
        if HeaderValue::from_str(&self.name).is_err() {
            return Err(ConfigError::InvalidValue(format!(
                "application name {:?} is not a valid header value",
                self.name
            )));
        }
        if self.api.default_version.is_empty() {
            return Err(ConfigError::InvalidValue(
                "default API version cannot be empty".to_string(),
            ));
        }
        if self.api.supported_versions.is_empty() {
            return Err(ConfigError::InvalidValue(
                "at least one supported API version must be configured".to_string(),
            ));
        }
        if self.server.timeouts.read == 0
            || self.server.timeouts.write == 0
            || self.server.timeouts.shutdown == 0
        {
            return Err(ConfigError::InvalidValue(
                "server timeouts must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "fxclock".to_string(),
            release_version: String::new(),
            api: ApiConfig::default(),
            db: DbConfig::default(),
            log: LogConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
name = "fxclock"
release_version = "1.4.2"

[api]
default_version = "2.0"
supported_versions = ["1.0", "2.0"]

[db]
username = "fx"
database_name = "fxclock"
host = "127.0.0.1"
port = 5433

[log]
formatter = "json"
level = "debug"

[server]
port = 3000

[server.timeouts]
read = 10
write = 10
shutdown = 2
"#;

        let config = Config::parse(toml_content).expect("should parse");
        assert_eq!(config.name, "fxclock");
        assert_eq!(config.release_version, "1.4.2");
        assert_eq!(config.api.default_version, "2.0");
        assert_eq!(config.api.supported_versions, vec!["1.0", "2.0"]);
        assert_eq!(config.db.host, "127.0.0.1");
        assert_eq!(config.db.port, 5433);
        assert_eq!(config.log.formatter, "json");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.timeouts.shutdown, 2);
    }

    #[test]
    fn test_defaults() {
        let config = Config::parse("").expect("empty config should parse");
        assert_eq!(config.name, "fxclock");
        assert_eq!(config.api.default_version, "1.0");
        assert_eq!(config.api.supported_versions, vec!["1.0"]);
        assert_eq!(config.db.host, "localhost");
        assert_eq!(config.db.port, 5432);
        assert_eq!(config.server.port, 6010);
        assert_eq!(config.server.timeouts.read, 30);
        assert_eq!(config.server.timeouts.shutdown, 5);
    }

    #[test]
    fn test_validation_empty_name() {
        let err = Config::parse(r#"name = """#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn test_validation_non_header_name() {
        let err = Config::parse("name = \"fx\\nclock\"").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn test_validation_no_supported_versions() {
        let toml_content = r#"
[api]
supported_versions = []
"#;
        let err = Config::parse(toml_content).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn test_validation_zero_timeout() {
        let toml_content = r#"
[server.timeouts]
shutdown = 0
"#;
        let err = Config::parse(toml_content).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }
}
