//! Configuration Loader
//!
//! Environment-aware loading. Sources are merged in increasing precedence:
//!
//! 1. `config/lims.toml`
//! 2. `config/lims.<environment>.toml`
//! 3. `LIMS__SECTION__KEY` environment variables
//! 4. `DATABASE_URL`, which always wins for `database.url`
//!
//! Missing files are skipped; a missing base file simply means defaults.

use config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use super::error::{ConfigResult, ConfigurationError};
use super::LimsConfig;

pub struct ConfigManager {
    config: LimsConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "Loading configuration"
        );

        let mut config = Self::load_and_merge_config(&config_directory, environment)?;

        if let Ok(url) = env::var("DATABASE_URL") {
            if !url.is_empty() {
                config.database.url = Some(url);
            }
        }

        config.validate()?;

        tracing::info!(
            environment = %environment,
            backend = ?config.database.backend,
            bind_address = %config.server.bind_address,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration, e.g. in tests
    pub fn from_config(config: LimsConfig, environment: &str) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: PathBuf::from("config"),
        }))
    }

    pub fn config(&self) -> &LimsConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// `LIMS_ENV`, then `APP_ENV`, defaulting to `development`
    pub fn detect_environment() -> String {
        env::var("LIMS_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn load_and_merge_config(directory: &Path, environment: &str) -> ConfigResult<LimsConfig> {
        let base = directory.join("lims.toml");
        let overlay = directory.join(format!("lims.{environment}.toml"));

        let settings = Config::builder()
            .add_source(File::from(base).required(false))
            .add_source(File::from(overlay).required(false))
            .add_source(
                Environment::with_prefix("LIMS")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::load_error(environment, e))?;

        settings
            .try_deserialize::<LimsConfig>()
            .map_err(|e| ConfigurationError::load_error(environment, e))
    }
}
