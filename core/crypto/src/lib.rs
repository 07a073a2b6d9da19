//! Cryptographic primitives for Sklad.
//!
//! This module provides:
//! - Key derivation from the master password using Argon2id
//! - Authenticated sealing of secret snippet values using XChaCha20-Poly1305
//! - Key types that zeroize on drop
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - Password verification compares in constant time

pub mod aead;
pub mod kdf;
pub mod keys;

pub use aead::{decrypt, encrypt, open_text, seal_text};
pub use kdf::{check_verifier, create_verifier, derive_key, KdfParams};
pub use keys::{Salt, VaultKey, KEY_LENGTH, SALT_LENGTH};
