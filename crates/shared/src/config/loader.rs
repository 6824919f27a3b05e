//! Configuration loader
//!
//! Loads configuration from an optional `.env` file and the process
//! environment, then validates it. Values from the `.env` file take
//! precedence over the system environment, which keeps local development
//! overrides out of the shell profile.

use std::path::Path;

use super::dto::AtrioConfig;
use super::error::{ConfigError, Result};
use super::validator::validate_config;

#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Optional path to .env file
    env_file_path: Option<std::path::PathBuf>,
}

impl ConfigLoader {
    /// Create a new ConfigLoader.
    ///
    /// ```
    /// use atrio_shared::config::ConfigLoader;
    ///
    /// // Without .env file
    /// let loader = ConfigLoader::new(None);
    ///
    /// // With .env file
    /// let loader = ConfigLoader::new(Some(".env".into()));
    /// ```
    pub fn new(env_file_path: Option<std::path::PathBuf>) -> Self {
        Self { env_file_path }
    }

    /// Load and validate the server configuration.
    pub fn load(&self) -> Result<AtrioConfig> {
        if let Some(path) = &self.env_file_path {
            self.load_env_file(path)?;
        }

        let config = AtrioConfig::from_env()?;
        validate_config(&config)?;

        Ok(config)
    }

    fn load_env_file(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(ConfigError::EnvFileLoad {
                path: path.to_path_buf(),
                source: dotenv::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path.display()),
                )),
            });
        }

        dotenv::from_path(path).map_err(|source| ConfigError::EnvFileLoad {
            path: path.to_path_buf(),
            source,
        })
    }
}
