//! # Configuration
//!
//! Typed configuration for the workflow service. Every section has serde
//! defaults, so an empty `config/lims.toml` yields a runnable development setup
//! on the in-memory backend. See [`ConfigManager`] for source precedence.

pub mod error;
pub mod loader;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LimsConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub workflow: WorkflowConfig,
    pub events: EventsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub request_timeout_ms: u64,
    pub cors_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_ms: 30_000,
            cors_enabled: true,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Which [`LimsStore`](crate::database::LimsStore) implementation backs the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    #[default]
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    pub url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub run_migrations: bool,
    /// JSON seed file for the memory backend
    pub fixtures_path: Option<PathBuf>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            url: None,
            max_connections: 10,
            acquire_timeout_seconds: 5,
            run_migrations: true,
            fixtures_path: None,
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }
}

/// Caller identity is established upstream; we only read the trusted header
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub user_header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            user_header: "x-user-id".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Attempts for `assign` when the workflow moves between read and write
    pub assign_retry_limit: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            assign_retry_limit: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: Option<String>,
    pub json: bool,
}

impl LimsConfig {
    /// Validate configuration for consistency and required fields
    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.bind_address.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "server.bind_address",
                "server configuration",
            ));
        }

        if self.database.backend == StorageBackend::Postgres
            && self.database.url.as_deref().map_or(true, str::is_empty)
        {
            return Err(ConfigurationError::missing_required_field(
                "database.url",
                "the postgres backend (or set DATABASE_URL)",
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigurationError::invalid_value(
                "database.max_connections",
                "0",
                "pool size must be greater than 0",
            ));
        }

        if self.workflow.assign_retry_limit == 0 {
            return Err(ConfigurationError::invalid_value(
                "workflow.assign_retry_limit",
                "0",
                "at least one attempt is required",
            ));
        }

        if self.events.channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "events.channel_capacity",
                "0",
                "channel capacity must be greater than 0",
            ));
        }

        if self.auth.user_header.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "auth.user_header",
                "auth configuration",
            ));
        }

        Ok(())
    }
}
