//! Path resolution utilities.

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Get the SatGuard base directory (~/.satguard).
pub fn base_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or_else(|| {
        ConfigError::Validation("Could not determine home directory".to_string())
    })?;
    Ok(home.join(".satguard"))
}

/// Get the main config file path (~/.satguard/satguard.json5).
pub fn config_file() -> Result<PathBuf, ConfigError> {
    Ok(base_dir()?.join("satguard.json5"))
}

/// File holding this device's stable id.
pub fn device_id_file(data_dir: &Path) -> PathBuf {
    data_dir.join("device-id")
}

/// File holding this device's private key.
pub fn device_key_file(data_dir: &Path) -> PathBuf {
    data_dir.join("device.key")
}

/// Directory holding the synced store tables.
pub fn store_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("store")
}

/// Ensure the data directory and its store directory exist.
pub fn ensure_dirs(data_dir: &Path) -> Result<(), ConfigError> {
    std::fs::create_dir_all(store_dir(data_dir))?;
    Ok(())
}

/// Expand tilde (~) in a path.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
