//! Vault credential record.
//!
//! Stored as `vault.json` next to the snippet tree. It holds what is needed
//! to re-derive and verify the vault key, never the key itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sklad_common::{Error, Result};
use sklad_crypto::{check_verifier, create_verifier, derive_key, KdfParams, Salt, VaultKey};

/// File name of the credential record in the data directory.
pub const CREDENTIALS_FILENAME: &str = "vault.json";

/// Key material parameters for one vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    /// Record format version.
    pub version: u32,
    /// Salt for key derivation.
    pub salt: Salt,
    pub kdf_params: KdfParams,
    pub created_at: DateTime<Utc>,
    /// Verification constant sealed under the derived key.
    pub key_verification: Vec<u8>,
}

impl CredentialRecord {
    /// Current record format version.
    pub const CURRENT_VERSION: u32 = 1;

    /// Create a record for a new master password.
    ///
    /// # Postconditions
    /// - Salt is randomly generated
    /// - Returns the derived key alongside the record
    ///
    /// # Errors
    /// - Password empty
    /// - KDF failure
    pub fn create(password: &[u8], kdf_params: KdfParams) -> Result<(Self, VaultKey)> {
        let salt = Salt::generate();
        let key = derive_key(password, &salt, &kdf_params)?;
        let key_verification = create_verifier(&key)?;

        let record = Self {
            version: Self::CURRENT_VERSION,
            salt,
            kdf_params,
            created_at: Utc::now(),
            key_verification,
        };
        Ok((record, key))
    }

    /// Derive the key for `password` if it is the right one.
    ///
    /// # Returns
    /// - `Ok(Some(key))` if the password is correct
    /// - `Ok(None)` if it is not
    ///
    /// # Errors
    /// - Unsupported record version
    /// - KDF failure
    pub fn unlock(&self, password: &[u8]) -> Result<Option<VaultKey>> {
        if self.version != Self::CURRENT_VERSION {
            return Err(Error::Vault(format!(
                "Unsupported credential record version: {}",
                self.version
            )));
        }
        if password.is_empty() {
            return Ok(None);
        }

        let key = derive_key(password, &self.salt, &self.kdf_params)?;
        if check_verifier(&key, &self.key_verification) {
            Ok(Some(key))
        } else {
            Ok(None)
        }
    }

    /// Verify a password against this record.
    pub fn verify_password(&self, password: &[u8]) -> Result<bool> {
        Ok(self.unlock(password)?.is_some())
    }

    /// Serialize the record to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize the record from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
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
    fn test_create_and_verify() {
        let (record, key) = CredentialRecord::create(b"hunter22", fast_params()).unwrap();

        assert!(record.verify_password(b"hunter22").unwrap());
        assert!(!record.verify_password(b"hunter23").unwrap());
        assert!(!record.verify_password(b"").unwrap());

        let again = record.unlock(b"hunter22").unwrap().unwrap();
        assert_eq!(again.as_bytes(), key.as_bytes());
    }

    #[test]
    fn test_json_roundtrip_still_verifies() {
        let (record, _) = CredentialRecord::create(b"pw", fast_params()).unwrap();
        let json = record.to_json().unwrap();
        assert!(json.contains("\"kdfParams\""));

        let loaded = CredentialRecord::from_json(&json).unwrap();
        assert!(loaded.verify_password(b"pw").unwrap());
    }

    #[test]
    fn test_unknown_version_rejected() {
        let (mut record, _) = CredentialRecord::create(b"pw", fast_params()).unwrap();
        record.version = 99;
        assert!(matches!(record.unlock(b"pw"), Err(Error::Vault(_))));
    }
}
