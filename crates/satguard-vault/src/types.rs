//! Core types for the trust registry and the vault.
//!
//! [`DeviceRecord`] and [`VaultRecord`] are the two synced tables. Everything
//! sensitive inside them is ciphertext; [`Endpoint`] is the plaintext payload
//! that only ever exists in memory after a successful decrypt.

use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use satguard_core::encoding::{base64_bytes, base64_bytes_opt};
use satguard_core::{DeviceId, PlatformTag, RecordId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A device's entry in the trust registry.
///
/// `row_id` identifies the stored row; `id` identifies the physical device.
/// The sync layer can deliver several rows sharing one `id`; the registry
/// reconciles those down to one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Storage identity of this row.
    pub row_id: Uuid,

    /// Stable device identifier.
    pub id: DeviceId,

    /// When the device enrolled.
    pub added_at: DateTime<Utc>,

    /// Operating system family of the device.
    pub platform: PlatformTag,

    /// Raw X25519 public key.
    #[serde(with = "base64_bytes")]
    pub public_key: Vec<u8>,

    /// Vault secret wrapped for `public_key`, present once the device is trusted.
    #[serde(
        default,
        with = "base64_bytes_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub wrapped_secret: Option<Vec<u8>>,
}

impl DeviceRecord {
    /// A fresh, untrusted record for `id`.
    pub fn new(id: DeviceId, platform: PlatformTag, public_key: Vec<u8>) -> Self {
        Self {
            row_id: Uuid::new_v4(),
            id,
            added_at: Utc::now(),
            platform,
            public_key,
            wrapped_secret: None,
        }
    }

    /// Whether this device has been handed the vault secret.
    pub fn is_trusted(&self) -> bool {
        self.wrapped_secret.is_some()
    }
}

/// An encrypted vault entry as stored in the synced store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultRecord {
    /// Record identifier, kept in the clear for indexing.
    pub id: RecordId,

    /// Display name, kept in the clear for listing.
    pub name: String,

    /// `salt || nonce || AES-256-GCM(serialized payload)`.
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,

    /// Device that sealed this record.
    pub creator_device_id: DeviceId,
}

/// An untrusted device awaiting a trust decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDevice {
    pub id: DeviceId,
    pub added_at: DateTime<Utc>,
    pub platform: PlatformTag,
    /// Emoji code derived from the device's public key.
    pub verifier: Vec<String>,
}

/// A VPN endpoint profile, the plaintext payload of a vault record.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub active: bool,

    #[serde(default)]
    pub peers: Vec<Peer>,
    /// Interface addresses in CIDR notation.
    #[serde(default)]
    pub addresses: Vec<String>,

    #[serde(with = "base64_bytes")]
    pub private_key: Vec<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<Vec<IpAddr>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u16>,

    #[serde(default = "default_true")]
    pub disconnects_on_sleep: bool,
    #[serde(default)]
    pub exclude_apn: bool,
    #[serde(default)]
    pub enforce_routes: bool,
    #[serde(default)]
    pub include_all_networks: bool,
    #[serde(default)]
    pub exclude_cellular_services: bool,
    #[serde(default)]
    pub allow_access_to_local_network: bool,
    #[serde(default)]
    pub exclude_device_communication: bool,
}

fn default_true() -> bool {
    true
}

impl Endpoint {
    /// A new inactive endpoint with no peers.
    pub fn new(name: impl Into<String>, private_key: Vec<u8>) -> Self {
        Self {
            id: RecordId::new(),
            name: name.into(),
            active: false,
            peers: Vec::new(),
            addresses: Vec::new(),
            private_key,
            dns: None,
            listen_port: None,
            mtu: None,
            disconnects_on_sleep: true,
            exclude_apn: false,
            enforce_routes: false,
            include_all_networks: false,
            exclude_cellular_services: false,
            allow_access_to_local_network: false,
            exclude_device_communication: false,
        }
    }

    /// Add a peer.
    pub fn with_peer(mut self, peer: Peer) -> Self {
        self.peers.push(peer);
        self
    }

    /// Add an interface address.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.addresses.push(address.into());
        self
    }
}

// Private keys must never reach logs.
impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("active", &self.active)
            .field("peers", &self.peers)
            .field("addresses", &self.addresses)
            .field("private_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// A remote peer of an endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    #[serde(with = "base64_bytes")]
    pub public_key: Vec<u8>,
    #[serde(
        default,
        with = "base64_bytes_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub pre_shared_key: Option<Vec<u8>>,

    /// `host:port` of the remote peer.
    pub endpoint: String,

    /// Allowed IP ranges in CIDR notation.
    #[serde(default)]
    pub routes: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_keep_alive: Option<u16>,
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer")
            .field("endpoint", &self.endpoint)
            .field("routes", &self.routes)
            .field("pre_shared_key", &self.pre_shared_key.as_ref().map(|_| "[REDACTED]"))
            .field("persistent_keep_alive", &self.persistent_keep_alive)
            .finish_non_exhaustive()
    }
}
