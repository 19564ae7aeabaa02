//! The in-memory vault secret.

use std::sync::Arc;

use parking_lot::RwLock;
use satguard_core::SecretBytes;

/// Shared holder for the decrypted vault secret.
///
/// The registry writes it; the record codec reads it. Cloning the cell
/// shares the same slot. The secret is zeroized when it is replaced or
/// cleared.
#[derive(Clone, Default)]
pub struct SecretCell {
    inner: Arc<RwLock<Option<SecretBytes>>>,
}

impl SecretCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the current secret, if one is held.
    pub fn get(&self) -> Option<SecretBytes> {
        self.inner.read().clone()
    }

    pub fn set(&self, secret: SecretBytes) {
        *self.inner.write() = Some(secret);
    }

    pub fn clear(&self) {
        self.inner.write().take();
    }

    pub fn is_held(&self) -> bool {
        self.inner.read().is_some()
    }
}

impl std::fmt::Debug for SecretCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCell")
            .field("held", &self.is_held())
            .finish()
    }
}
