//! Application root wiring identity, registry, records and metadata together.

use std::sync::Arc;

use satguard_core::{paths, Config, DeviceId, RecordId};
use tokio::sync::{broadcast, watch};
use tracing::info;

use crate::authorization::AuthorizationStatus;
use crate::codec::{EncryptedRecordCodec, VaultEntry};
use crate::error::{Result, VaultError};
use crate::identity::DeviceIdentity;
use crate::keystore::FileKeystore;
use crate::keyvalue::KeyValueStore;
use crate::records::VaultStore;
use crate::registry::{RegistryEvent, TrustRegistry};
use crate::secret::SecretCell;
use crate::store::{FileSyncedStore, SyncedStore};
use crate::types::{DeviceRecord, PendingDevice};

/// A device's view of the shared vault.
pub struct Vault {
    registry: TrustRegistry,
    records: VaultStore,
    metadata: KeyValueStore,
}

impl Vault {
    /// Open the file-backed vault described by `config`.
    ///
    /// The store, key file and device id all live under the configured data
    /// directory. Call [`Vault::refresh`] afterwards to recover the secret.
    pub async fn open(config: &Config) -> Result<Self> {
        config.validate()?;
        let data_dir = config.data_dir()?;
        paths::ensure_dirs(&data_dir)?;

        let store = Arc::new(FileSyncedStore::open(paths::store_dir(&data_dir))?);
        let keystore = Arc::new(FileKeystore::new(config.key_file()?));
        let identity =
            DeviceIdentity::load_or_create(&paths::device_id_file(&data_dir), keystore).await?;

        info!(device_id = %identity.id(), data_dir = %data_dir.display(), "opened vault");
        Ok(Self::with_parts(identity, store, config.registry.event_capacity))
    }

    /// Build a vault from explicit parts.
    pub fn with_parts(
        identity: DeviceIdentity,
        store: Arc<dyn SyncedStore>,
        event_capacity: usize,
    ) -> Self {
        let secret = SecretCell::new();
        let codec = EncryptedRecordCodec::new(secret.clone(), identity.id());
        Self {
            records: VaultStore::new(store.clone(), codec),
            metadata: KeyValueStore::new(store.clone()),
            registry: TrustRegistry::new(identity, store, secret, event_capacity),
        }
    }

    pub fn device_id(&self) -> DeviceId {
        self.registry.identity().id()
    }

    pub fn identity(&self) -> &DeviceIdentity {
        self.registry.identity()
    }

    pub fn registry(&self) -> &TrustRegistry {
        &self.registry
    }

    pub fn metadata(&self) -> &KeyValueStore {
        &self.metadata
    }

    pub async fn enroll(&self) -> Result<AuthorizationStatus> {
        self.registry.enroll().await
    }

    pub async fn mint_vault_secret(&self) -> Result<AuthorizationStatus> {
        self.registry.mint_vault_secret().await
    }

    pub async fn trust(&self, device: DeviceId) -> Result<AuthorizationStatus> {
        self.registry.trust(device).await
    }

    pub async fn deny(&self, device: DeviceId) -> Result<AuthorizationStatus> {
        self.registry.deny(device).await
    }

    pub async fn refresh(&self) -> Result<AuthorizationStatus> {
        self.registry.refresh().await
    }

    /// Erase the vault and this device's key.
    ///
    /// Record writes already in flight finish before the wipe; later ones
    /// fail with `Unavailable`.
    pub async fn reset(&self) -> Result<AuthorizationStatus> {
        let _writes = self.records.lock_writes().await;
        self.registry.reset().await
    }

    pub fn status(&self) -> AuthorizationStatus {
        self.registry.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<AuthorizationStatus> {
        self.registry.subscribe_status()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<RegistryEvent> {
        self.registry.subscribe_events()
    }

    pub async fn devices(&self) -> Result<Vec<DeviceRecord>> {
        self.registry.devices().await
    }

    pub async fn pending_devices(&self) -> Result<Vec<PendingDevice>> {
        self.registry.pending_devices().await
    }

    fn ensure_established(&self) -> Result<()> {
        if self.status() == AuthorizationStatus::EstablishingFailed {
            Err(VaultError::PreconditionFailed(
                "vault failed to establish; reset required".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    /// Seal and store an entry.
    pub async fn store<T: VaultEntry>(&self, entry: &T) -> Result<()> {
        self.ensure_established()?;
        self.records.store(entry).await
    }

    /// Every entry in the vault, or none if any fails to decrypt.
    pub async fn fetch_all<T: VaultEntry>(&self) -> Result<Vec<T>> {
        self.ensure_established()?;
        self.records.fetch_all().await
    }

    pub async fn fetch<T: VaultEntry>(&self, id: RecordId) -> Result<T> {
        self.ensure_established()?;
        self.records.fetch(id).await
    }

    pub async fn delete(&self, id: RecordId) -> Result<()> {
        self.ensure_established()?;
        self.records.delete(id, self.device_id()).await
    }

    /// Switch an endpoint on or off for this device.
    pub async fn set_active(&self, endpoint: RecordId, active: bool) -> Result<()> {
        self.ensure_established()?;
        self.records.set_active(self.device_id(), endpoint, active).await
    }

    /// Endpoints switched on for this device.
    pub async fn active_endpoints(&self) -> Result<Vec<RecordId>> {
        self.ensure_established()?;
        self.records.active_endpoints(self.device_id()).await
    }
}
