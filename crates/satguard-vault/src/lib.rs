//! # satguard-vault
//!
//! Multi-device trust registry and encrypted vault.
//!
//! Every device holds one key pair in a [`Keystore`]. Devices publish their
//! public keys to a replicated [`SyncedStore`]; the first device mints a
//! random vault secret and later devices receive it wrapped for their own
//! public key by a device that already holds it. The vault secret then seals
//! [`VaultRecord`]s with AES-256-GCM, keeping only id and name in the clear.
//!
//! ## Example
//!
//! ```rust,ignore
//! use satguard_core::Config;
//! use satguard_vault::{AuthorizationStatus, Endpoint, Vault};
//!
//! let vault = Vault::open(&Config::load_or_default()?).await?;
//! vault.enroll().await?;
//! if vault.refresh().await? == AuthorizationStatus::MissingSecretCreateStrategy {
//!     vault.mint_vault_secret().await?;
//! }
//! vault.store(&Endpoint::new("office", private_key)).await?;
//! let endpoints: Vec<Endpoint> = vault.fetch_all().await?;
//! ```

pub mod authorization;
pub mod codec;
pub mod crypto;
pub mod ecies;
pub mod error;
pub mod identity;
pub mod keystore;
pub mod keyvalue;
pub mod logging;
pub mod records;
pub mod registry;
pub mod secret;
pub mod store;
pub mod types;
pub mod vault;
pub mod verifier;

pub use authorization::{evaluate, Action, AuthorizationStatus};
pub use codec::{EncryptedRecordCodec, VaultEntry};
pub use error::{Result, VaultError};
pub use identity::DeviceIdentity;
pub use keystore::{is_algorithm_supported, FileKeystore, Keystore, MemoryKeystore};
pub use keyvalue::{Key, KeyValueStore};
pub use logging::init_tracing;
pub use records::VaultStore;
pub use registry::{RegistryEvent, TrustRegistry};
pub use secret::SecretCell;
pub use store::{
    DeviceRepository, FileSyncedStore, MemorySyncedStore, MetadataRepository, SyncedStore,
    VaultRepository,
};
pub use types::{DeviceRecord, Endpoint, PendingDevice, Peer, VaultRecord};
pub use vault::Vault;
