//! Vault record storage.

use std::collections::HashSet;
use std::sync::Arc;

use satguard_core::{DeviceId, RecordId};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::codec::{EncryptedRecordCodec, VaultEntry};
use crate::error::{Result, VaultError};
use crate::keyvalue::{self, KeyValueStore};
use crate::store::SyncedStore;

/// Encrypted vault entries over the synced record table.
///
/// Entries are sealed before anything is written, so a failed encryption
/// never leaves a record behind. Writes are serialized.
pub struct VaultStore {
    store: Arc<dyn SyncedStore>,
    codec: EncryptedRecordCodec,
    metadata: KeyValueStore,
    write_lock: Mutex<()>,
}

impl VaultStore {
    pub fn new(store: Arc<dyn SyncedStore>, codec: EncryptedRecordCodec) -> Self {
        Self {
            metadata: KeyValueStore::new(store.clone()),
            store,
            codec,
            write_lock: Mutex::new(()),
        }
    }

    pub fn codec(&self) -> &EncryptedRecordCodec {
        &self.codec
    }

    fn ensure_available(&self) -> Result<()> {
        if self.codec.is_available() {
            Ok(())
        } else {
            Err(VaultError::Unavailable)
        }
    }

    /// Insert or replace an entry.
    pub async fn store<T: VaultEntry>(&self, entry: &T) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let record = self.codec.encrypt(entry)?;
        let id = record.id;
        self.store.upsert_record(record).await?;
        info!(record_id = %id, name = entry.name(), "stored vault record");
        Ok(())
    }

    /// A single entry.
    pub async fn fetch<T: VaultEntry>(&self, id: RecordId) -> Result<T> {
        self.ensure_available()?;
        let record = self
            .store
            .fetch_record(id)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("record {id}")))?;
        self.codec.decrypt(&record)
    }

    /// Every entry, or an error if any one of them fails to decrypt.
    pub async fn fetch_all<T: VaultEntry>(&self) -> Result<Vec<T>> {
        self.ensure_available()?;
        let records = self.store.fetch_records().await?;
        debug!(count = records.len(), "decrypting vault records");
        self.codec.decrypt_all(&records)
    }

    /// Delete an entry and drop it from this device's active list.
    pub async fn delete(&self, id: RecordId, device: DeviceId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.ensure_available()?;

        if !self.store.delete_record(id).await? {
            return Err(VaultError::NotFound(format!("record {id}")));
        }
        info!(record_id = %id, "deleted vault record");

        if let Err(e) = self.update_active(device, id, false).await {
            warn!(record_id = %id, error = %e, "failed to clear active flag");
        }
        Ok(())
    }

    /// Block record writes until the guard is dropped.
    pub(crate) async fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    /// Delete every entry.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.store.clear_records().await
    }

    /// Mark an endpoint as switched on or off for `device`.
    pub async fn set_active(&self, device: DeviceId, endpoint: RecordId, active: bool) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.ensure_available()?;

        if self.store.fetch_record(endpoint).await?.is_none() {
            return Err(VaultError::NotFound(format!("record {endpoint}")));
        }
        self.update_active(device, endpoint, active).await
    }

    async fn update_active(&self, device: DeviceId, endpoint: RecordId, active: bool) -> Result<()> {
        let key = keyvalue::active_endpoints(device);
        let mut ids = self.metadata.get(&key).await?.unwrap_or_default();

        let present = ids.contains(&endpoint);
        match (active, present) {
            (true, false) => ids.push(endpoint),
            (false, true) => ids.retain(|id| *id != endpoint),
            _ => return Ok(()),
        }

        if ids.is_empty() {
            self.metadata.remove(&key).await
        } else {
            self.metadata.set(&key, &ids).await
        }
    }

    /// Endpoints `device` has switched on.
    ///
    /// Ids of records deleted from another device are skipped.
    pub async fn active_endpoints(&self, device: DeviceId) -> Result<Vec<RecordId>> {
        let ids: Vec<RecordId> = self
            .metadata
            .get(&keyvalue::active_endpoints(device))
            .await?
            .unwrap_or_default();
        if ids.is_empty() {
            return Ok(ids);
        }

        let existing: HashSet<RecordId> = self
            .store
            .fetch_records()
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect();
        Ok(ids.into_iter().filter(|id| existing.contains(id)).collect())
    }
}
