//! ECIES-style hybrid encryption over X25519.
//!
//! Wrapping a secret for a device:
//!
//! ```text
//! eph            = fresh X25519 key pair
//! shared         = X25519(eph.secret, recipient_public)
//! key            = HKDF-SHA256(salt = eph.public || recipient_public,
//!                              ikm  = shared,
//!                              info = "satguard-wrap-v1")
//! wrapped        = eph.public || nonce || AES-256-GCM(key, secret, aad = recipient_public)
//! ```
//!
//! Anyone holding a public key can wrap; only the holder of the matching
//! private key can unwrap.

use rand::rngs::OsRng;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use crate::crypto::{aead_decrypt, aead_encrypt, derive_key, NONCE_SIZE, TAG_SIZE};
use crate::error::{Result, VaultError};

/// Size of an encoded X25519 public key.
pub const PUBLIC_KEY_SIZE: usize = 32;

const WRAP_INFO: &[u8] = b"satguard-wrap-v1";

/// Parse raw public key bytes as published in a device record.
pub fn parse_public_key(bytes: &[u8]) -> Result<PublicKey> {
    let arr: [u8; PUBLIC_KEY_SIZE] = bytes.try_into().map_err(|_| {
        VaultError::CryptographicOperationFailed(format!(
            "invalid public key length: expected {PUBLIC_KEY_SIZE}, got {}",
            bytes.len()
        ))
    })?;
    Ok(PublicKey::from(arr))
}

fn kdf_salt(ephemeral: &PublicKey, recipient: &PublicKey) -> [u8; 2 * PUBLIC_KEY_SIZE] {
    let mut salt = [0u8; 2 * PUBLIC_KEY_SIZE];
    salt[..PUBLIC_KEY_SIZE].copy_from_slice(ephemeral.as_bytes());
    salt[PUBLIC_KEY_SIZE..].copy_from_slice(recipient.as_bytes());
    salt
}

/// Encrypt `plaintext` so that only the owner of `recipient` can read it.
pub fn seal(recipient: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let recipient = parse_public_key(recipient)?;

    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(&recipient);
    if !shared.was_contributory() {
        return Err(VaultError::CryptographicOperationFailed(
            "recipient public key is a low-order point".to_string(),
        ));
    }

    let key = derive_key(
        shared.as_bytes(),
        &kdf_salt(&ephemeral_public, &recipient),
        WRAP_INFO,
    )?;
    let sealed = aead_encrypt(&key, plaintext, recipient.as_bytes())?;

    let mut out = Vec::with_capacity(PUBLIC_KEY_SIZE + sealed.len());
    out.extend_from_slice(ephemeral_public.as_bytes());
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Decrypt a blob produced by [`seal`] with the recipient's private key.
pub fn open(secret: &StaticSecret, sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < PUBLIC_KEY_SIZE + NONCE_SIZE + TAG_SIZE {
        return Err(VaultError::CryptographicOperationFailed(
            "wrapped secret too short".to_string(),
        ));
    }

    let (ephemeral, rest) = sealed.split_at(PUBLIC_KEY_SIZE);
    let ephemeral = parse_public_key(ephemeral)?;
    let recipient = PublicKey::from(secret);

    let shared = secret.diffie_hellman(&ephemeral);
    if !shared.was_contributory() {
        return Err(VaultError::CryptographicOperationFailed(
            "ephemeral public key is a low-order point".to_string(),
        ));
    }

    let key = derive_key(
        shared.as_bytes(),
        &kdf_salt(&ephemeral, &recipient),
        WRAP_INFO,
    )?;
    aead_decrypt(&key, rest, recipient.as_bytes())
}
