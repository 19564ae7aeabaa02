//! This device's identity: a stable id plus a keystore-held key pair.

use std::path::Path;
use std::sync::Arc;

use satguard_core::{DeviceId, PlatformTag, SecretBytes};
use tracing::{debug, info};

use crate::error::{Result, VaultError};
use crate::keystore::{ensure_supported, Keystore, MemoryKeystore};
use crate::verifier;

/// The local device.
///
/// The id outlives the key pair: deleting the key (on reset) keeps the id,
/// and the next use of the keystore generates a fresh pair.
#[derive(Clone)]
pub struct DeviceIdentity {
    id: DeviceId,
    platform: PlatformTag,
    keystore: Arc<dyn Keystore>,
}

impl DeviceIdentity {
    /// Build an identity from a known id and a keystore.
    ///
    /// Fails with `CryptographicOperationFailed` if the keystore cannot
    /// provide the wrap algorithm.
    pub fn new(id: DeviceId, keystore: Arc<dyn Keystore>) -> Result<Self> {
        ensure_supported(keystore.as_ref())?;
        Ok(Self {
            id,
            platform: PlatformTag::current(),
            keystore,
        })
    }

    /// A fresh identity with a process-local keystore.
    pub fn in_memory() -> Self {
        Self {
            id: DeviceId::new(),
            platform: PlatformTag::current(),
            keystore: Arc::new(MemoryKeystore::new()),
        }
    }

    /// Load the device id from `id_file`, generating and persisting one on first run.
    pub async fn load_or_create(id_file: &Path, keystore: Arc<dyn Keystore>) -> Result<Self> {
        let id = if id_file.exists() {
            let content = tokio::fs::read_to_string(id_file).await?;
            content.parse::<DeviceId>().map_err(|e| {
                VaultError::StoreIoFailed(format!(
                    "invalid device id in {}: {e}",
                    id_file.display()
                ))
            })?
        } else {
            let id = DeviceId::new();
            if let Some(parent) = id_file.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let tmp_path = id_file.with_extension("tmp");
            tokio::fs::write(&tmp_path, id.to_string()).await?;
            tokio::fs::rename(&tmp_path, id_file).await?;
            info!(device_id = %id, "generated device id");
            id
        };

        Self::new(id, keystore)
    }

    /// Override the platform tag published at enrollment.
    pub fn with_platform(mut self, platform: PlatformTag) -> Self {
        self.platform = platform;
        self
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn platform(&self) -> PlatformTag {
        self.platform
    }

    /// Public key to publish in the registry. May generate the key pair.
    pub async fn public_key_bytes(&self) -> Result<Vec<u8>> {
        self.keystore.public_key().await
    }

    /// Wrap `secret` for the holder of `target_public_key`.
    pub async fn wrap(&self, target_public_key: &[u8], secret: &SecretBytes) -> Result<Vec<u8>> {
        debug!(device_id = %self.id, "wrapping vault secret");
        self.keystore
            .encrypt(target_public_key, secret.expose_secret())
            .await
    }

    /// Unwrap a secret that was wrapped for this device.
    pub async fn unwrap(&self, ciphertext: &[u8]) -> Result<SecretBytes> {
        self.keystore.decrypt(ciphertext).await
    }

    /// Verifier code of this device's public key.
    pub async fn verifier(&self) -> Result<Vec<String>> {
        let public_key = self.public_key_bytes().await?;
        Ok(verifier::emoji_code(&public_key))
    }

    /// Destroy the key pair. The device id is kept.
    pub async fn delete_key(&self) -> Result<()> {
        info!(device_id = %self.id, "deleting device key");
        self.keystore.delete_key().await
    }
}

impl std::fmt::Debug for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceIdentity")
            .field("id", &self.id)
            .field("platform", &self.platform)
            .field("algorithm", &self.keystore.algorithm())
            .finish()
    }
}
