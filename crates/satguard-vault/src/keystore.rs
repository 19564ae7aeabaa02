//! Device keystores holding the private half of a device's key pair.
//!
//! A [`Keystore`] owns exactly one X25519 key pair, generated lazily on first
//! use. The private key never leaves the keystore: callers only ever see the
//! public key and the results of hybrid encryption and decryption.
//!
//! Two implementations are provided:
//! - [`FileKeystore`] persists the key hex-encoded in a `0600` file.
//! - [`MemoryKeystore`] keeps the key for the lifetime of the process.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rand::rngs::OsRng;
use satguard_core::config::WRAP_ALGORITHM;
use satguard_core::SecretBytes;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::ecies;
use crate::error::{Result, VaultError};

/// Async trait for device keystores.
#[async_trait]
pub trait Keystore: Send + Sync {
    /// Identifier of the hybrid-encryption algorithm this keystore implements.
    fn algorithm(&self) -> &str;

    /// Public half of the device key pair, generating the pair if needed.
    async fn public_key(&self) -> Result<Vec<u8>>;

    /// Hybrid-encrypt `plaintext` for the holder of `public_key`.
    async fn encrypt(&self, public_key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt a blob that was encrypted for this device's public key.
    async fn decrypt(&self, ciphertext: &[u8]) -> Result<SecretBytes>;

    /// Destroy the key pair. The next use generates a fresh one.
    async fn delete_key(&self) -> Result<()>;
}

/// Whether `algorithm` names the hybrid-encryption scheme used for wrapping.
pub fn is_algorithm_supported(algorithm: &str) -> bool {
    algorithm == WRAP_ALGORITHM
}

/// Fail cleanly when a keystore cannot provide the fixed wrap algorithm.
pub fn ensure_supported(keystore: &dyn Keystore) -> Result<()> {
    if is_algorithm_supported(keystore.algorithm()) {
        Ok(())
    } else {
        Err(VaultError::CryptographicOperationFailed(format!(
            "unsupported keystore algorithm '{}', expected '{}'",
            keystore.algorithm(),
            WRAP_ALGORITHM
        )))
    }
}

fn public_bytes(secret: &StaticSecret) -> Vec<u8> {
    PublicKey::from(secret).as_bytes().to_vec()
}

/// Process-local keystore. The key pair is lost when the value is dropped.
pub struct MemoryKeystore {
    key: Mutex<Option<StaticSecret>>,
}

impl Default for MemoryKeystore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryKeystore {
    /// Create an empty keystore; the key is generated on first use.
    pub fn new() -> Self {
        Self {
            key: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Keystore for MemoryKeystore {
    fn algorithm(&self) -> &str {
        WRAP_ALGORITHM
    }

    async fn public_key(&self) -> Result<Vec<u8>> {
        let mut key = self.key.lock().await;
        let secret = key.get_or_insert_with(|| {
            debug!("generating in-memory device key");
            StaticSecret::random_from_rng(OsRng)
        });
        Ok(public_bytes(secret))
    }

    async fn encrypt(&self, public_key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        ecies::seal(public_key, plaintext)
    }

    async fn decrypt(&self, ciphertext: &[u8]) -> Result<SecretBytes> {
        let key = self.key.lock().await;
        let secret = key.as_ref().ok_or_else(|| {
            VaultError::CryptographicOperationFailed("no device key present".to_string())
        })?;
        ecies::open(secret, ciphertext).map(SecretBytes::new)
    }

    async fn delete_key(&self) -> Result<()> {
        self.key.lock().await.take();
        Ok(())
    }
}

/// Keystore persisting the device key to a file readable only by its owner.
pub struct FileKeystore {
    path: PathBuf,
    key: Mutex<Option<StaticSecret>>,
}

impl FileKeystore {
    /// Create a keystore backed by `path`. Nothing is read until first use.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            key: Mutex::new(None),
        }
    }

    /// Location of the key file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_key(&self) -> Result<Option<StaticSecret>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let data = Zeroizing::new(tokio::fs::read_to_string(&self.path).await?);
        let bytes = Zeroizing::new(hex::decode(data.trim()).map_err(|e| {
            VaultError::CryptographicOperationFailed(format!("device key is not valid hex: {e}"))
        })?);
        let arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            VaultError::CryptographicOperationFailed(format!(
                "device key has wrong length: {} (expected 32)",
                bytes.len()
            ))
        })?;
        Ok(Some(StaticSecret::from(arr)))
    }

    async fn write_key(&self, secret: &StaticSecret) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let encoded = Zeroizing::new(hex::encode(secret.to_bytes()));
        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, encoded.as_bytes()).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(&tmp_path, perms).await?;
        }

        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }

    /// Load the cached key, reading or generating it on first use.
    async fn load_or_create(&self, create: bool) -> Result<MutexGuard<'_, Option<StaticSecret>>> {
        let mut key = self.key.lock().await;
        if key.is_none() {
            *key = self.read_key().await?;
        }
        if key.is_none() && create {
            info!(path = %self.path.display(), "generating device key");
            let secret = StaticSecret::random_from_rng(OsRng);
            self.write_key(&secret).await?;
            *key = Some(secret);
        }
        Ok(key)
    }
}

#[async_trait]
impl Keystore for FileKeystore {
    fn algorithm(&self) -> &str {
        WRAP_ALGORITHM
    }

    async fn public_key(&self) -> Result<Vec<u8>> {
        let key = self.load_or_create(true).await?;
        key.as_ref().map(public_bytes).ok_or_else(|| {
            VaultError::CryptographicOperationFailed("device key unavailable".to_string())
        })
    }

    async fn encrypt(&self, public_key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        ecies::seal(public_key, plaintext)
    }

    async fn decrypt(&self, ciphertext: &[u8]) -> Result<SecretBytes> {
        let key = self.load_or_create(false).await?;
        let secret = key.as_ref().ok_or_else(|| {
            VaultError::CryptographicOperationFailed("no device key present".to_string())
        })?;
        ecies::open(secret, ciphertext).map(SecretBytes::new)
    }

    async fn delete_key(&self) -> Result<()> {
        let mut key = self.key.lock().await;
        key.take();
        if self.path.exists() {
            debug!(path = %self.path.display(), "deleting device key");
            tokio::fs::remove_file(&self.path).await?;
        }
        Ok(())
    }
}
