//! Error types for trust and vault operations.

use satguard_core::ConfigError;
use thiserror::Error;

/// Errors that can occur during trust registry and vault operations.
///
/// `PreconditionFailed`, `NotFound`, `Unauthorized` and `Unavailable` are
/// local and recoverable. `CryptographicOperationFailed` and `StoreIoFailed`
/// raised while refreshing the registry escalate the device to
/// `EstablishingFailed`.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: this device holds no vault secret")]
    Unauthorized,

    #[error("Vault secret unavailable")]
    Unavailable,

    #[error("Cryptographic operation failed: {0}")]
    CryptographicOperationFailed(String),

    #[error("Store I/O failed: {0}")]
    StoreIoFailed(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl VaultError {
    /// Whether this error, raised during a refresh, makes the vault unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            VaultError::CryptographicOperationFailed(_) | VaultError::StoreIoFailed(_)
        )
    }
}

impl From<std::io::Error> for VaultError {
    fn from(e: std::io::Error) -> Self {
        VaultError::StoreIoFailed(e.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        VaultError::StoreIoFailed(e.to_string())
    }
}

/// Convenience result alias for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
