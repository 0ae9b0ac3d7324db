//! Ambient crypto helpers shared by the CLI and the ratchet: passphrase
//! key derivation and context-bound AAD construction. The ratchet's own
//! AEAD calls live in [`crate::ratchet`] since they need a
//! chain-derived nonce, not the random-nonce scheme below.

pub mod aad;

use argon2::{Algorithm, Argon2, Params, Version};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
}

/// Derive a 32-byte ratchet shared secret from a passphrase and salt using
/// Argon2id. Grounded directly on the teacher's `crypto::derive_key`
/// (same parameters); used only by the CLI's `--passphrase` convenience
/// flag — the core ratchet takes a pre-shared secret directly, per spec's
/// "no key agreement protocol" non-goal.
pub fn derive_shared_secret(passphrase: &str, salt: &[u8]) -> Result<[u8; 32], CryptoError> {
    let params = Params::new(64 * 1024, 3, 1, Some(32))
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut key = [0u8; 32];
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(key)
}
