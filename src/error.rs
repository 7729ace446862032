use thiserror::Error;

use crate::config::ConfigurationError;
use crate::database::StoreError;

/// Top-level error for wiring the service together
#[derive(Debug, Error)]
pub enum LimsError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LimsError>;
