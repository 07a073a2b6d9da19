//! Key derivation using Argon2id.
//!
//! Argon2id is a memory-hard password hashing function that provides
//! resistance to both GPU and time-memory trade-off attacks.

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::aead::{decrypt, encrypt};
use crate::keys::{Salt, VaultKey, KEY_LENGTH};
use sklad_common::{Error, Result};

/// Known plaintext sealed under the vault key to verify passwords later.
const VERIFICATION_PLAINTEXT: &[u8] = b"SKLAD_KEY_VERIFICATION_V1";

/// Parameters for Argon2id key derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB (e.g., 65536 = 64 MiB).
    pub memory_cost: u32,
    /// Number of iterations.
    pub time_cost: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl KdfParams {
    /// Create parameters suitable for interactive use.
    ///
    /// Targets roughly half a second of derivation time on a desktop.
    pub fn interactive() -> Self {
        Self {
            memory_cost: 65536, // 64 MiB
            time_cost: 3,
            parallelism: 4,
        }
    }

    /// Create moderate parameters for constrained machines.
    pub fn moderate() -> Self {
        Self {
            memory_cost: 32768, // 32 MiB
            time_cost: 3,
            parallelism: 2,
        }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::interactive()
    }
}

/// Derive the vault key from a password and salt using Argon2id.
///
/// # Errors
/// - Returns error if password is empty
/// - Returns error if Argon2id parameters are invalid
pub fn derive_key(password: &[u8], salt: &Salt, params: &KdfParams) -> Result<VaultKey> {
    if password.is_empty() {
        return Err(Error::InvalidInput("Password cannot be empty".to_string()));
    }

    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(KEY_LENGTH),
    )
    .map_err(|e| Error::Crypto(format!("Invalid KDF parameters: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key_bytes = [0u8; KEY_LENGTH];
    argon2
        .hash_password_into(password, salt.as_bytes(), &mut key_bytes)
        .map_err(|e| Error::Crypto(format!("Key derivation failed: {}", e)))?;

    Ok(VaultKey::from_bytes(key_bytes))
}

/// Seal the verification constant under `key`.
///
/// The result is stored next to the salt; the key itself never is.
pub fn create_verifier(key: &VaultKey) -> Result<Vec<u8>> {
    encrypt(key, VERIFICATION_PLAINTEXT)
}

/// Check a candidate key against a stored verifier.
///
/// A decryption failure means the key is wrong, not that something broke.
pub fn check_verifier(key: &VaultKey, verifier: &[u8]) -> bool {
    match decrypt(key, verifier) {
        Ok(plaintext) => {
            plaintext.len() == VERIFICATION_PLAINTEXT.len()
                && bool::from(plaintext.as_slice().ct_eq(VERIFICATION_PLAINTEXT))
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_params() -> KdfParams {
        KdfParams {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_derive_key_deterministic() {
        let salt = Salt::from_bytes([42u8; 32]);

        let key1 = derive_key(b"test-password-123", &salt, &fast_params()).unwrap();
        let key2 = derive_key(b"test-password-123", &salt, &fast_params()).unwrap();

        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_different_salt() {
        let key1 = derive_key(b"pw", &Salt::from_bytes([1u8; 32]), &fast_params()).unwrap();
        let key2 = derive_key(b"pw", &Salt::from_bytes([2u8; 32]), &fast_params()).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_empty_password_fails() {
        assert!(derive_key(b"", &Salt::generate(), &fast_params()).is_err());
    }

    #[test]
    fn test_verifier_accepts_only_matching_key() {
        let salt = Salt::from_bytes([99u8; 32]);
        let key = derive_key(b"secure-password", &salt, &fast_params()).unwrap();
        let verifier = create_verifier(&key).unwrap();

        let wrong = derive_key(b"wrong-password", &salt, &fast_params()).unwrap();
        assert!(check_verifier(&key, &verifier));
        assert!(!check_verifier(&wrong, &verifier));
    }

    #[test]
    fn test_corrupt_verifier_rejects() {
        let key = derive_key(b"pw", &Salt::from_bytes([3u8; 32]), &fast_params()).unwrap();
        assert!(!check_verifier(&key, &[0u8; 8]));
    }
}
