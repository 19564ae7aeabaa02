//! AES-256-GCM sealing with HKDF-SHA256 key derivation.
//!
//! Each sealed blob gets a unique random salt; the vault secret is never used
//! directly as a cipher key. Salt and nonce are prepended to the ciphertext,
//! so a sealed blob is self-contained: `salt || nonce || ciphertext_with_tag`.

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use hkdf::Hkdf;
use rand::RngCore;
use satguard_core::SecretBytes;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};

pub(crate) const NONCE_SIZE: usize = 12;
pub(crate) const SALT_SIZE: usize = 32;
pub(crate) const TAG_SIZE: usize = 16;

/// Size of a vault secret and of every derived cipher key.
pub const KEY_SIZE: usize = 32;

/// HKDF info string used to domain-separate record keys.
const HKDF_INFO: &[u8] = b"satguard-record-v1";

/// Derive a 256-bit cipher key from `secret` and `salt` via HKDF-SHA256.
pub(crate) fn derive_key(
    secret: &[u8],
    salt: &[u8],
    info: &[u8],
) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
    let hk = Hkdf::<Sha256>::new(Some(salt), secret);
    let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
    hk.expand(info, &mut okm[..])
        .map_err(|e| VaultError::CryptographicOperationFailed(format!("HKDF expand: {e}")))?;
    Ok(okm)
}

/// Encrypt with AES-256-GCM under `key`, returning `nonce || ciphertext_with_tag`.
pub(crate) fn aead_encrypt(key: &[u8; KEY_SIZE], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| VaultError::CryptographicOperationFailed(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| VaultError::CryptographicOperationFailed(e.to_string()))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Decrypt `nonce || ciphertext_with_tag` produced by [`aead_encrypt`].
pub(crate) fn aead_decrypt(key: &[u8; KEY_SIZE], data: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    if data.len() < NONCE_SIZE + TAG_SIZE {
        return Err(VaultError::CryptographicOperationFailed(
            "ciphertext too short".to_string(),
        ));
    }

    let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| VaultError::CryptographicOperationFailed(e.to_string()))?;

    cipher
        .decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| {
            VaultError::CryptographicOperationFailed("authentication tag mismatch".to_string())
        })
}

/// Seal `plaintext` under the vault secret, binding it to `aad`.
pub fn seal(secret: &SecretBytes, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);

    let key = derive_key(secret.expose_secret(), &salt, HKDF_INFO)?;
    let sealed = aead_encrypt(&key, plaintext, aad)?;

    let mut result = Vec::with_capacity(SALT_SIZE + sealed.len());
    result.extend_from_slice(&salt);
    result.extend_from_slice(&sealed);
    Ok(result)
}

/// Open a blob produced by [`seal`]. Any tampering yields `CryptographicOperationFailed`.
pub fn open(secret: &SecretBytes, sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < SALT_SIZE {
        return Err(VaultError::CryptographicOperationFailed(
            "sealed blob too short".to_string(),
        ));
    }

    let (salt, rest) = sealed.split_at(SALT_SIZE);
    let key = derive_key(secret.expose_secret(), salt, HKDF_INFO)?;
    aead_decrypt(&key, rest, aad)
}

/// Generate a new random 256-bit vault secret.
pub fn generate_vault_secret() -> SecretBytes {
    let mut key = vec![0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut key);
    SecretBytes::new(key)
}
