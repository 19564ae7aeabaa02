//! Configuration loading and persistence.

use super::{Config, WRAP_ALGORITHM};
use crate::error::ConfigError;
use crate::{env, paths};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = paths::config_file()?;
        Self::load(&path)
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        debug!(path = %path.display(), "loading configuration");
        Self::parse(&content)
    }

    /// Parse configuration from a string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        json5::from_str(content).map_err(|e| ConfigError::Json5(e.to_string()))
    }

    /// Load configuration from the default path, falling back to defaults if no file exists.
    ///
    /// `SATGUARD_DATA_DIR` overrides the storage directory either way.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        let mut config = match Self::load_default() {
            Ok(config) => config,
            Err(ConfigError::NotFound(_)) => Self::default(),
            Err(e) => return Err(e),
        };

        if let Some(dir) = env::get_var(env::vars::SATGUARD_DATA_DIR) {
            config.storage.data_dir = Some(paths::expand_tilde(&dir));
        }

        Ok(config)
    }

    /// Save configuration to the default path.
    pub fn save_default(&self) -> Result<(), ConfigError> {
        let path = paths::config_file()?;
        self.save(&path)
    }

    /// Save configuration to a file path.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_json5()?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write atomically
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, path)?;
        debug!(path = %path.display(), "saved configuration");

        Ok(())
    }

    /// Serialize to JSON5 string.
    pub fn to_json5(&self) -> Result<String, ConfigError> {
        // json5 doesn't have a serializer, so we use serde_json with pretty print
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate the configuration, collecting all errors before returning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.keystore.algorithm != WRAP_ALGORITHM {
            errors.push(format!(
                "Unsupported keystore algorithm '{}', expected '{}'",
                self.keystore.algorithm, WRAP_ALGORITHM
            ));
        }

        if self.registry.event_capacity == 0 {
            errors.push("Registry event_capacity must be greater than 0".to_string());
        }

        if let Some(dir) = &self.storage.data_dir {
            if dir.as_os_str().is_empty() {
                errors.push("Storage data_dir must not be empty".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }

    /// Resolved data directory.
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.storage.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => paths::base_dir(),
        }
    }

    /// Resolved private key location.
    pub fn key_file(&self) -> Result<PathBuf, ConfigError> {
        match &self.keystore.key_file {
            Some(path) => Ok(path.clone()),
            None => Ok(paths::device_key_file(&self.data_dir()?)),
        }
    }
}
