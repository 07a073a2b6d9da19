//! Authenticated encryption using XChaCha20-Poly1305.
//!
//! Secret snippet values are sealed as `nonce || ciphertext || tag` and stored
//! base64-encoded in the snippet's `encryptedValue` field.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{generic_array::GenericArray, Aead, AeadCore, KeyInit, OsRng},
    XChaCha20Poly1305,
};

use crate::keys::VaultKey;
use sklad_common::{Error, Result};

/// Nonce size for XChaCha20-Poly1305 (24 bytes).
pub const NONCE_SIZE: usize = 24;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

/// Encrypt plaintext under the vault key.
///
/// # Postconditions
/// - Returns nonce || ciphertext || tag
/// - The nonce is randomly generated
pub fn encrypt(key: &VaultKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(GenericArray::from_slice(key.as_bytes()));
    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);

    Ok(sealed)
}

/// Decrypt data produced by [`encrypt`].
///
/// # Errors
/// - Input shorter than NONCE_SIZE + TAG_SIZE
/// - Authentication failure (wrong key or tampered data)
pub fn decrypt(key: &VaultKey, sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(Error::Crypto("Ciphertext too short".to_string()));
    }

    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
    let cipher = XChaCha20Poly1305::new(GenericArray::from_slice(key.as_bytes()));

    cipher
        .decrypt(GenericArray::from_slice(nonce_bytes), ciphertext)
        .map_err(|e| Error::Crypto(format!("Decryption failed: {}", e)))
}

/// Seal a text value into its base64 ciphertext form.
pub fn seal_text(key: &VaultKey, plaintext: &str) -> Result<String> {
    Ok(STANDARD.encode(encrypt(key, plaintext.as_bytes())?))
}

/// Open a base64 ciphertext produced by [`seal_text`].
pub fn open_text(key: &VaultKey, sealed: &str) -> Result<String> {
    let bytes = STANDARD
        .decode(sealed)
        .map_err(|e| Error::Crypto(format!("Invalid ciphertext encoding: {}", e)))?;
    let plaintext = decrypt(key, &bytes)?;
    String::from_utf8(plaintext).map_err(|_| Error::Crypto("Plaintext is not UTF-8".to_string()))
}
