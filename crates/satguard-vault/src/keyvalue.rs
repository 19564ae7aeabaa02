//! Typed access to the synced metadata table.

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use satguard_core::{DeviceId, RecordId};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Result, VaultError};
use crate::store::SyncedStore;

/// A metadata key bound to the type of its value.
#[derive(Debug, Clone)]
pub struct Key<V> {
    name: String,
    _value: PhantomData<fn() -> V>,
}

impl<V> Key<V> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            _value: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// When the vault secret was minted.
pub fn secret_created() -> Key<DateTime<Utc>> {
    Key::new("secret_created")
}

/// Which device minted the vault secret.
pub fn secret_creator() -> Key<DeviceId> {
    Key::new("secret_creator")
}

/// Endpoints a device has switched on.
pub fn active_endpoints(device: DeviceId) -> Key<Vec<RecordId>> {
    Key::new(format!("active_endpoints.{device}"))
}

/// Key-value view over the metadata table of a [`SyncedStore`].
#[derive(Clone)]
pub struct KeyValueStore {
    store: Arc<dyn SyncedStore>,
}

impl KeyValueStore {
    pub fn new(store: Arc<dyn SyncedStore>) -> Self {
        Self { store }
    }

    pub async fn get<V: DeserializeOwned>(&self, key: &Key<V>) -> Result<Option<V>> {
        match self.store.get_value(key.name()).await? {
            Some(value) => serde_json::from_value(value).map(Some).map_err(|e| {
                VaultError::StoreIoFailed(format!("invalid value for key '{}': {e}", key.name()))
            }),
            None => Ok(None),
        }
    }

    pub async fn set<V: Serialize>(&self, key: &Key<V>, value: &V) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.store.set_value(key.name(), value).await
    }

    pub async fn remove<V>(&self, key: &Key<V>) -> Result<()> {
        self.store.remove_value(key.name()).await
    }

    /// Remove every key.
    pub async fn clear(&self) -> Result<()> {
        self.store.clear_values().await
    }
}
