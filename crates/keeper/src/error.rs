//! Error types for the keeper service

use thiserror::Error;
use tiervault_core::VaultError;

#[derive(Error, Debug)]
pub enum KeeperError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: VaultError },

    #[error("Unhealthy vaults: {0}")]
    Unhealthy(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type KeeperResult<T> = Result<T, KeeperError>;

impl From<toml::ser::Error> for KeeperError {
    fn from(err: toml::ser::Error) -> Self {
        KeeperError::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for KeeperError {
    fn from(err: serde_json::Error) -> Self {
        KeeperError::SerializationError(err.to_string())
    }
}
