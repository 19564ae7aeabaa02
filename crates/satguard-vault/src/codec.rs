//! Sealing vault entries under the vault secret.

use satguard_core::{DeviceId, RecordId};
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use crate::crypto;
use crate::error::{Result, VaultError};
use crate::secret::SecretCell;
use crate::types::{Endpoint, VaultRecord};

/// A plaintext payload that can be stored in the vault.
///
/// Only `id` and `name` are kept in the clear; everything else is sealed.
pub trait VaultEntry: Serialize + DeserializeOwned + Send + Sync {
    fn id(&self) -> RecordId;
    fn name(&self) -> &str;
}

impl VaultEntry for Endpoint {
    fn id(&self) -> RecordId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Encrypts and decrypts [`VaultRecord`]s with the secret held in a [`SecretCell`].
///
/// The record id is bound as associated data, so a ciphertext moved to a
/// different record fails authentication.
#[derive(Debug, Clone)]
pub struct EncryptedRecordCodec {
    secret: SecretCell,
    device_id: DeviceId,
}

impl EncryptedRecordCodec {
    pub fn new(secret: SecretCell, device_id: DeviceId) -> Self {
        Self { secret, device_id }
    }

    /// Whether the vault secret is present.
    pub fn is_available(&self) -> bool {
        self.secret.is_held()
    }

    pub fn encrypt<T: VaultEntry>(&self, entry: &T) -> Result<VaultRecord> {
        let secret = self.secret.get().ok_or(VaultError::Unavailable)?;
        let id = entry.id();
        let plaintext = zeroize::Zeroizing::new(serde_json::to_vec(entry)?);

        Ok(VaultRecord {
            id,
            name: entry.name().to_string(),
            ciphertext: crypto::seal(&secret, &plaintext, id.as_bytes())?,
            creator_device_id: self.device_id,
        })
    }

    pub fn decrypt<T: VaultEntry>(&self, record: &VaultRecord) -> Result<T> {
        let secret = self.secret.get().ok_or(VaultError::Unavailable)?;
        let plaintext = zeroize::Zeroizing::new(crypto::open(
            &secret,
            &record.ciphertext,
            record.id.as_bytes(),
        )?);

        let entry: T = serde_json::from_slice(&plaintext).map_err(|e| {
            VaultError::CryptographicOperationFailed(format!(
                "record {} has a malformed payload: {e}",
                record.id
            ))
        })?;
        if entry.id() != record.id {
            return Err(VaultError::CryptographicOperationFailed(format!(
                "record {} contains payload for {}",
                record.id,
                entry.id()
            )));
        }
        Ok(entry)
    }

    /// Decrypt a full set of records, or none of them.
    ///
    /// A single failure discards everything decrypted so far and returns the error.
    pub fn decrypt_all<T: VaultEntry>(&self, records: &[VaultRecord]) -> Result<Vec<T>> {
        records
            .iter()
            .map(|record| {
                self.decrypt(record).map_err(|e| {
                    warn!(record_id = %record.id, error = %e, "vault record failed to decrypt");
                    e
                })
            })
            .collect()
    }
}
