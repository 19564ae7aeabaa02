//! Synced store backends.
//!
//! The replicated store is an external collaborator; this module defines the
//! repository interface the core needs from it and two local backends:
//!
//! - [`MemorySyncedStore`] shares one set of tables between every handle,
//!   which lets several in-process devices talk through it.
//! - [`FileSyncedStore`] keeps each table in a JSON file under a directory and
//!   rewrites the file atomically (tmp + rename) after every mutation.
//!
//! Neither backend enforces uniqueness of device ids. Duplicate device rows
//! are a normal sync artifact and are reconciled by the trust registry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use satguard_core::RecordId;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, VaultError};
use crate::types::{DeviceRecord, VaultRecord};

/// Device record table.
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// Insert a new row.
    async fn insert_device(&self, record: DeviceRecord) -> Result<()>;

    /// All rows, duplicates included.
    async fn fetch_devices(&self) -> Result<Vec<DeviceRecord>>;

    /// Replace the row with the same `row_id`.
    async fn update_device(&self, record: DeviceRecord) -> Result<()>;

    /// Delete a row by `row_id`. Deleting a missing row is not an error.
    async fn delete_device(&self, row_id: Uuid) -> Result<()>;

    /// Delete every row.
    async fn clear_devices(&self) -> Result<()>;
}

/// Vault record table.
#[async_trait]
pub trait VaultRepository: Send + Sync {
    /// Insert or replace a record.
    async fn upsert_record(&self, record: VaultRecord) -> Result<()>;

    /// All records, ordered by id.
    async fn fetch_records(&self) -> Result<Vec<VaultRecord>>;

    /// A single record.
    async fn fetch_record(&self, id: RecordId) -> Result<Option<VaultRecord>>;

    /// Delete a record, returning whether it existed.
    async fn delete_record(&self, id: RecordId) -> Result<bool>;

    /// Delete every record.
    async fn clear_records(&self) -> Result<()>;
}

/// Small key-value metadata table.
#[async_trait]
pub trait MetadataRepository: Send + Sync {
    async fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>>;

    async fn set_value(&self, key: &str, value: serde_json::Value) -> Result<()>;

    async fn remove_value(&self, key: &str) -> Result<()>;

    async fn clear_values(&self) -> Result<()>;
}

/// The full replicated store: all three tables.
pub trait SyncedStore: DeviceRepository + VaultRepository + MetadataRepository {}

impl<T> SyncedStore for T where T: DeviceRepository + VaultRepository + MetadataRepository {}

#[derive(Debug, Default)]
struct Tables {
    devices: Vec<DeviceRecord>,
    records: BTreeMap<RecordId, VaultRecord>,
    metadata: BTreeMap<String, serde_json::Value>,
}

fn replace_device(devices: &mut [DeviceRecord], record: DeviceRecord) -> Result<()> {
    let row = devices
        .iter_mut()
        .find(|r| r.row_id == record.row_id)
        .ok_or_else(|| VaultError::NotFound(format!("device row {}", record.row_id)))?;
    *row = record;
    Ok(())
}

/// In-memory synced store.
#[derive(Debug, Default)]
pub struct MemorySyncedStore {
    tables: RwLock<Tables>,
}

impl MemorySyncedStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceRepository for MemorySyncedStore {
    async fn insert_device(&self, record: DeviceRecord) -> Result<()> {
        self.tables.write().await.devices.push(record);
        Ok(())
    }

    async fn fetch_devices(&self) -> Result<Vec<DeviceRecord>> {
        Ok(self.tables.read().await.devices.clone())
    }

    async fn update_device(&self, record: DeviceRecord) -> Result<()> {
        replace_device(&mut self.tables.write().await.devices, record)
    }

    async fn delete_device(&self, row_id: Uuid) -> Result<()> {
        self.tables
            .write()
            .await
            .devices
            .retain(|r| r.row_id != row_id);
        Ok(())
    }

    async fn clear_devices(&self) -> Result<()> {
        self.tables.write().await.devices.clear();
        Ok(())
    }
}

#[async_trait]
impl VaultRepository for MemorySyncedStore {
    async fn upsert_record(&self, record: VaultRecord) -> Result<()> {
        self.tables.write().await.records.insert(record.id, record);
        Ok(())
    }

    async fn fetch_records(&self) -> Result<Vec<VaultRecord>> {
        Ok(self.tables.read().await.records.values().cloned().collect())
    }

    async fn fetch_record(&self, id: RecordId) -> Result<Option<VaultRecord>> {
        Ok(self.tables.read().await.records.get(&id).cloned())
    }

    async fn delete_record(&self, id: RecordId) -> Result<bool> {
        Ok(self.tables.write().await.records.remove(&id).is_some())
    }

    async fn clear_records(&self) -> Result<()> {
        self.tables.write().await.records.clear();
        Ok(())
    }
}

#[async_trait]
impl MetadataRepository for MemorySyncedStore {
    async fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.tables.read().await.metadata.get(key).cloned())
    }

    async fn set_value(&self, key: &str, value: serde_json::Value) -> Result<()> {
        self.tables
            .write()
            .await
            .metadata
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn remove_value(&self, key: &str) -> Result<()> {
        self.tables.write().await.metadata.remove(key);
        Ok(())
    }

    async fn clear_values(&self) -> Result<()> {
        self.tables.write().await.metadata.clear();
        Ok(())
    }
}

const DEVICES_FILE: &str = "devices.json";
const RECORDS_FILE: &str = "records.json";
const METADATA_FILE: &str = "metadata.json";

/// File-backed synced store with JSON persistence.
///
/// All mutations are persisted to disk via atomic writes (write to tmp, then rename).
pub struct FileSyncedStore {
    dir: PathBuf,
    tables: RwLock<Tables>,
}

fn load_table<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

async fn save_table<T: Serialize + ?Sized>(path: &Path, table: &T) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    let data = serde_json::to_string_pretty(table)?;
    tokio::fs::write(&tmp_path, data).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    debug!(path = %path.display(), "persisted table");
    Ok(())
}

impl FileSyncedStore {
    /// Open the store rooted at `dir`, loading any tables already on disk.
    pub fn open(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)?;

        let devices: Vec<DeviceRecord> = load_table(&dir.join(DEVICES_FILE))?;
        let records: Vec<VaultRecord> = load_table(&dir.join(RECORDS_FILE))?;
        let metadata: BTreeMap<String, serde_json::Value> =
            load_table(&dir.join(METADATA_FILE))?;

        Ok(Self {
            dir,
            tables: RwLock::new(Tables {
                devices,
                records: records.into_iter().map(|r| (r.id, r)).collect(),
                metadata,
            }),
        })
    }

    async fn save_devices(&self, devices: &[DeviceRecord]) -> Result<()> {
        save_table(&self.dir.join(DEVICES_FILE), devices).await
    }

    async fn save_records(&self, records: &BTreeMap<RecordId, VaultRecord>) -> Result<()> {
        let records: Vec<&VaultRecord> = records.values().collect();
        save_table(&self.dir.join(RECORDS_FILE), &records).await
    }

    async fn save_metadata(&self, metadata: &BTreeMap<String, serde_json::Value>) -> Result<()> {
        save_table(&self.dir.join(METADATA_FILE), metadata).await
    }
}

// Mutators persist a modified copy of the table and swap it in afterwards.
// A failed write leaves memory untouched.
#[async_trait]
impl DeviceRepository for FileSyncedStore {
    async fn insert_device(&self, record: DeviceRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        let mut devices = tables.devices.clone();
        devices.push(record);
        self.save_devices(&devices).await?;
        tables.devices = devices;
        Ok(())
    }

    async fn fetch_devices(&self) -> Result<Vec<DeviceRecord>> {
        Ok(self.tables.read().await.devices.clone())
    }

    async fn update_device(&self, record: DeviceRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        let mut devices = tables.devices.clone();
        replace_device(&mut devices, record)?;
        self.save_devices(&devices).await?;
        tables.devices = devices;
        Ok(())
    }

    async fn delete_device(&self, row_id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        let mut devices = tables.devices.clone();
        devices.retain(|r| r.row_id != row_id);
        self.save_devices(&devices).await?;
        tables.devices = devices;
        Ok(())
    }

    async fn clear_devices(&self) -> Result<()> {
        let mut tables = self.tables.write().await;
        self.save_devices(&[]).await?;
        tables.devices.clear();
        Ok(())
    }
}

#[async_trait]
impl VaultRepository for FileSyncedStore {
    async fn upsert_record(&self, record: VaultRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        let mut records = tables.records.clone();
        records.insert(record.id, record);
        self.save_records(&records).await?;
        tables.records = records;
        Ok(())
    }

    async fn fetch_records(&self) -> Result<Vec<VaultRecord>> {
        Ok(self.tables.read().await.records.values().cloned().collect())
    }

    async fn fetch_record(&self, id: RecordId) -> Result<Option<VaultRecord>> {
        Ok(self.tables.read().await.records.get(&id).cloned())
    }

    async fn delete_record(&self, id: RecordId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if !tables.records.contains_key(&id) {
            return Ok(false);
        }
        let mut records = tables.records.clone();
        records.remove(&id);
        self.save_records(&records).await?;
        tables.records = records;
        Ok(true)
    }

    async fn clear_records(&self) -> Result<()> {
        let mut tables = self.tables.write().await;
        self.save_records(&BTreeMap::new()).await?;
        tables.records.clear();
        Ok(())
    }
}

#[async_trait]
impl MetadataRepository for FileSyncedStore {
    async fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.tables.read().await.metadata.get(key).cloned())
    }

    async fn set_value(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let mut tables = self.tables.write().await;
        let mut metadata = tables.metadata.clone();
        metadata.insert(key.to_string(), value);
        self.save_metadata(&metadata).await?;
        tables.metadata = metadata;
        Ok(())
    }

    async fn remove_value(&self, key: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.metadata.contains_key(key) {
            return Ok(());
        }
        let mut metadata = tables.metadata.clone();
        metadata.remove(key);
        self.save_metadata(&metadata).await?;
        tables.metadata = metadata;
        Ok(())
    }

    async fn clear_values(&self) -> Result<()> {
        let mut tables = self.tables.write().await;
        self.save_metadata(&BTreeMap::new()).await?;
        tables.metadata.clear();
        Ok(())
    }
}
