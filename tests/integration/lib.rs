//! Shared fixtures for multi-device scenarios.

use std::sync::{Arc, Once};

use satguard_vault::{DeviceIdentity, MemorySyncedStore, SyncedStore, Vault};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness, filtered by `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Several in-process devices sharing one synced store.
pub struct Cluster {
    pub store: Arc<MemorySyncedStore>,
}

impl Default for Cluster {
    fn default() -> Self {
        Self::new()
    }
}

impl Cluster {
    pub fn new() -> Self {
        init_tracing();
        Self {
            store: Arc::new(MemorySyncedStore::new()),
        }
    }

    /// A new device attached to the shared store.
    pub fn device(&self) -> Vault {
        let store: Arc<dyn SyncedStore> = self.store.clone();
        Vault::with_parts(DeviceIdentity::in_memory(), store, 16)
    }

    /// A device that enrolled first and minted the vault secret.
    pub async fn founder(&self) -> Vault {
        let vault = self.device();
        vault.enroll().await.unwrap();
        vault.mint_vault_secret().await.unwrap();
        vault
    }

    /// A device that enrolled and was trusted by `by`.
    pub async fn member(&self, by: &Vault) -> Vault {
        let vault = self.device();
        vault.enroll().await.unwrap();
        by.trust(vault.device_id()).await.unwrap();
        vault.refresh().await.unwrap();
        vault
    }
}
