//! Trust registry: the device table and the protocol that moves the vault
//! secret between devices.
//!
//! Lifecycle of a device:
//!
//! 1. [`TrustRegistry::enroll`] publishes an untrusted [`DeviceRecord`].
//! 2. Either the device is alone and mints the secret
//!    ([`TrustRegistry::mint_vault_secret`]), or an authorized peer wraps the
//!    secret for it ([`TrustRegistry::trust`]) or removes it
//!    ([`TrustRegistry::deny`]).
//! 3. [`TrustRegistry::refresh`] reconciles sync duplicates and unwraps the
//!    secret once this device's record carries one.
//!
//! All mutating operations are serialized by one async mutex. Each one
//! recomputes the [`AuthorizationStatus`] and broadcasts a
//! [`RegistryEvent`] on completion.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use satguard_core::DeviceId;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::authorization::{evaluate, AuthorizationStatus};
use crate::crypto::generate_vault_secret;
use crate::error::{Result, VaultError};
use crate::identity::DeviceIdentity;
use crate::keyvalue::{self, KeyValueStore};
use crate::secret::SecretCell;
use crate::store::SyncedStore;
use crate::types::{DeviceRecord, PendingDevice};
use crate::verifier;

/// Notification sent after every registry operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    Changed {
        status: AuthorizationStatus,
        pending: Vec<PendingDevice>,
    },
}

#[derive(Debug, Default)]
struct RegistryState {
    /// Set by a fatal refresh error; cleared only by a successful reset.
    failed: bool,
}

/// Split raw rows into one winner per device id and the losing duplicates.
///
/// Latest `added_at` wins, then a row carrying a wrapped secret, then the
/// greatest `row_id`.
fn reconcile(rows: Vec<DeviceRecord>) -> (Vec<DeviceRecord>, Vec<DeviceRecord>) {
    fn precedence(record: &DeviceRecord) -> (DateTime<Utc>, bool, Uuid) {
        (record.added_at, record.is_trusted(), record.row_id)
    }

    let mut winners: BTreeMap<DeviceId, DeviceRecord> = BTreeMap::new();
    let mut losers = Vec::new();

    for row in rows {
        match winners.entry(row.id) {
            Entry::Vacant(slot) => {
                slot.insert(row);
            }
            Entry::Occupied(mut slot) => {
                if precedence(&row) > precedence(slot.get()) {
                    losers.push(slot.insert(row));
                } else {
                    losers.push(row);
                }
            }
        }
    }

    let mut devices: Vec<DeviceRecord> = winners.into_values().collect();
    devices.sort_by_key(|d| (d.added_at, d.id));
    (devices, losers)
}

fn find(devices: &[DeviceRecord], id: DeviceId) -> Option<&DeviceRecord> {
    devices.iter().find(|d| d.id == id)
}

/// Registry of devices sharing one vault.
pub struct TrustRegistry {
    identity: DeviceIdentity,
    store: Arc<dyn SyncedStore>,
    metadata: KeyValueStore,
    secret: SecretCell,
    state: Mutex<RegistryState>,
    events: broadcast::Sender<RegistryEvent>,
    status: watch::Sender<AuthorizationStatus>,
}

impl TrustRegistry {
    /// Create a registry for `identity` over `store`.
    ///
    /// The status starts as `Establishing` until the first refresh.
    pub fn new(
        identity: DeviceIdentity,
        store: Arc<dyn SyncedStore>,
        secret: SecretCell,
        event_capacity: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        let (status, _) = watch::channel(AuthorizationStatus::Establishing);
        Self {
            identity,
            metadata: KeyValueStore::new(store.clone()),
            store,
            secret,
            state: Mutex::new(RegistryState::default()),
            events,
            status,
        }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// The cell holding the vault secret once it is recovered.
    pub fn secret_cell(&self) -> &SecretCell {
        &self.secret
    }

    /// Current status.
    pub fn status(&self) -> AuthorizationStatus {
        *self.status.borrow()
    }

    /// Watch status changes.
    pub fn subscribe_status(&self) -> watch::Receiver<AuthorizationStatus> {
        self.status.subscribe()
    }

    /// Receive a [`RegistryEvent`] for every completed operation.
    pub fn subscribe_events(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    /// Reconciled device list, without deleting duplicates.
    pub async fn devices(&self) -> Result<Vec<DeviceRecord>> {
        let (devices, _) = reconcile(self.store.fetch_devices().await?);
        Ok(devices)
    }

    /// Other devices still waiting for a trust decision.
    pub async fn pending_devices(&self) -> Result<Vec<PendingDevice>> {
        let devices = self.devices().await?;
        Ok(self.pending_from(&devices))
    }

    fn pending_from(&self, devices: &[DeviceRecord]) -> Vec<PendingDevice> {
        devices
            .iter()
            .filter(|d| d.id != self.identity.id() && !d.is_trusted())
            .map(|d| PendingDevice {
                id: d.id,
                added_at: d.added_at,
                platform: d.platform,
                verifier: verifier::emoji_code(&d.public_key),
            })
            .collect()
    }

    fn compute_status(&self, state: &RegistryState, devices: &[DeviceRecord]) -> AuthorizationStatus {
        if state.failed {
            return AuthorizationStatus::EstablishingFailed;
        }
        evaluate(
            find(devices, self.identity.id()).is_some(),
            self.secret.is_held(),
            devices.len(),
        )
    }

    fn publish(&self, state: &RegistryState, devices: &[DeviceRecord]) -> AuthorizationStatus {
        let status = self.compute_status(state, devices);
        let previous = self.status.send_replace(status);
        if previous != status {
            info!(device_id = %self.identity.id(), %previous, %status, "authorization status changed");
        }
        let _ = self.events.send(RegistryEvent::Changed {
            status,
            pending: self.pending_from(devices),
        });
        status
    }

    fn ensure_usable(state: &RegistryState) -> Result<()> {
        if state.failed {
            Err(VaultError::PreconditionFailed(
                "vault failed to establish; reset required".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    /// Publish this device's record if it is not registered yet.
    ///
    /// An untrusted record carrying an outdated public key (the key pair was
    /// lost since enrolling) is republished with the current key. A trusted
    /// record is never rewritten; its secret is wrapped for the old key and
    /// only a reset recovers from that.
    pub async fn enroll(&self) -> Result<AuthorizationStatus> {
        let state = self.state.lock().await;
        Self::ensure_usable(&state)?;

        let (mut devices, _) = reconcile(self.store.fetch_devices().await?);
        let id = self.identity.id();
        let public_key = self.identity.public_key_bytes().await?;

        match devices.iter().position(|d| d.id == id) {
            Some(idx) if devices[idx].public_key == public_key => {
                debug!(device_id = %id, "already enrolled");
            }
            Some(idx) if devices[idx].is_trusted() => {
                warn!(device_id = %id, "trusted record holds a stale public key");
            }
            Some(idx) => {
                let mut updated = devices[idx].clone();
                updated.public_key = public_key;
                self.store.update_device(updated.clone()).await?;
                info!(device_id = %id, "republished device key");
                devices[idx] = updated;
            }
            None => {
                let record = DeviceRecord::new(id, self.identity.platform(), public_key);
                self.store.insert_device(record.clone()).await?;
                info!(device_id = %id, platform = %record.platform, "enrolled device");
                devices.push(record);
            }
        }

        Ok(self.publish(&state, &devices))
    }

    /// Create the vault secret. Only valid for a lone, enrolled, secretless device.
    pub async fn mint_vault_secret(&self) -> Result<AuthorizationStatus> {
        let state = self.state.lock().await;
        Self::ensure_usable(&state)?;

        let (mut devices, _) = reconcile(self.store.fetch_devices().await?);
        let id = self.identity.id();

        let own = find(&devices, id).ok_or_else(|| {
            VaultError::PreconditionFailed("device is not enrolled".to_string())
        })?;
        if devices.len() != 1 {
            return Err(VaultError::PreconditionFailed(format!(
                "cannot mint with {} devices registered",
                devices.len()
            )));
        }
        if own.is_trusted() || self.secret.is_held() {
            return Err(VaultError::PreconditionFailed(
                "vault secret already exists".to_string(),
            ));
        }

        let public_key = self.identity.public_key_bytes().await?;
        if own.public_key != public_key {
            return Err(VaultError::PreconditionFailed(
                "device key changed since enrollment; enroll again".to_string(),
            ));
        }

        let secret = generate_vault_secret();
        let mut updated = own.clone();
        updated.wrapped_secret = Some(self.identity.wrap(&public_key, &secret).await?);
        self.store.update_device(updated.clone()).await?;
        self.secret.set(secret);
        info!(device_id = %id, "minted vault secret");

        if let Err(e) = self.metadata.set(&keyvalue::secret_created(), &Utc::now()).await {
            warn!(error = %e, "failed to record secret creation time");
        }
        if let Err(e) = self.metadata.set(&keyvalue::secret_creator(), &id).await {
            warn!(error = %e, "failed to record secret creator");
        }

        devices[0] = updated;
        Ok(self.publish(&state, &devices))
    }

    /// Hand the vault secret to device `target`.
    pub async fn trust(&self, target: DeviceId) -> Result<AuthorizationStatus> {
        let state = self.state.lock().await;
        Self::ensure_usable(&state)?;

        let secret = self.secret.get().ok_or(VaultError::Unauthorized)?;
        let (mut devices, _) = reconcile(self.store.fetch_devices().await?);

        let idx = devices
            .iter()
            .position(|d| d.id == target)
            .ok_or_else(|| VaultError::NotFound(format!("device {target}")))?;

        if devices[idx].is_trusted() {
            debug!(device_id = %target, "device already trusted");
        } else {
            let mut updated = devices[idx].clone();
            updated.wrapped_secret = Some(self.identity.wrap(&updated.public_key, &secret).await?);
            self.store.update_device(updated.clone()).await?;
            info!(device_id = %target, by = %self.identity.id(), "trusted device");
            devices[idx] = updated;
        }

        Ok(self.publish(&state, &devices))
    }

    /// Remove device `target` before it is trusted.
    ///
    /// A device that already holds a wrapped secret cannot be denied.
    pub async fn deny(&self, target: DeviceId) -> Result<AuthorizationStatus> {
        let state = self.state.lock().await;
        Self::ensure_usable(&state)?;

        if !self.secret.is_held() {
            return Err(VaultError::Unauthorized);
        }

        let rows = self.store.fetch_devices().await?;
        let (mut devices, _) = reconcile(rows.clone());

        let record = find(&devices, target)
            .ok_or_else(|| VaultError::NotFound(format!("device {target}")))?;
        if record.is_trusted() {
            return Err(VaultError::PreconditionFailed(format!(
                "device {target} is already trusted"
            )));
        }

        for row in rows.iter().filter(|r| r.id == target) {
            self.store.delete_device(row.row_id).await?;
        }
        info!(device_id = %target, by = %self.identity.id(), "denied device");
        devices.retain(|d| d.id != target);

        Ok(self.publish(&state, &devices))
    }

    /// Re-read the registry, drop sync duplicates and recover the vault secret.
    ///
    /// Store and crypto faults are fatal here: the status becomes
    /// `EstablishingFailed` and stays there until [`TrustRegistry::reset`].
    pub async fn refresh(&self) -> Result<AuthorizationStatus> {
        let mut state = self.state.lock().await;
        Self::ensure_usable(&state)?;

        match self.reload().await {
            Ok(devices) => Ok(self.publish(&state, &devices)),
            Err(e) if e.is_fatal() => {
                error!(device_id = %self.identity.id(), error = %e, "refresh failed, vault unavailable");
                state.failed = true;
                self.publish(&state, &[]);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn reload(&self) -> Result<Vec<DeviceRecord>> {
        let (devices, losers) = reconcile(self.store.fetch_devices().await?);

        for loser in &losers {
            warn!(device_id = %loser.id, row_id = %loser.row_id, "removing duplicate device record");
            self.store.delete_device(loser.row_id).await?;
        }

        let id = self.identity.id();
        match find(&devices, id) {
            None => {
                if self.secret.is_held() {
                    warn!(device_id = %id, "device record gone, discarding vault secret");
                    self.secret.clear();
                }
            }
            Some(DeviceRecord {
                wrapped_secret: Some(wrapped),
                ..
            }) => {
                if !self.secret.is_held() {
                    let secret = self.identity.unwrap(wrapped).await?;
                    self.secret.set(secret);
                    info!(device_id = %id, "recovered vault secret");
                }
            }
            Some(_) => {
                if self.secret.is_held() {
                    warn!(device_id = %id, "device record lost its wrapped secret, discarding vault secret");
                    self.secret.clear();
                }
            }
        }

        Ok(devices)
    }

    /// Erase the registry, the vault records, the metadata and the device key.
    ///
    /// Valid from any status. The device id is kept.
    pub async fn reset(&self) -> Result<AuthorizationStatus> {
        let mut state = self.state.lock().await;
        self.secret.clear();

        match self.wipe().await {
            Ok(()) => {
                state.failed = false;
                info!(device_id = %self.identity.id(), "vault reset");
                Ok(self.publish(&state, &[]))
            }
            Err(e) => {
                error!(device_id = %self.identity.id(), error = %e, "reset failed");
                state.failed = true;
                self.publish(&state, &[]);
                Err(e)
            }
        }
    }

    async fn wipe(&self) -> Result<()> {
        self.store.clear_devices().await?;
        self.store.clear_records().await?;
        self.store.clear_values().await?;
        self.identity.delete_key().await
    }
}
