//! Configuration errors

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load env file {path}: {source}")]
    EnvFileLoad {
        path: PathBuf,
        source: dotenv::Error,
    },

    #[error("Missing required configuration: {name}")]
    MissingRequired { name: String },

    #[error("Invalid value for {name}: {value} ({reason})")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
