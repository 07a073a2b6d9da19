//! Common error types for Sklad.

use thiserror::Error;

/// Top-level error type for Sklad operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Cryptographic operation failed.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Vault operation failed.
    #[error("Vault error: {0}")]
    Vault(String),

    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation not permitted.
    #[error("Not permitted: {0}")]
    NotPermitted(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Secret content was requested while the vault is not unlocked.
    #[error("Vault is locked")]
    Locked,

    /// The master password did not verify. The caller may retry.
    #[error("Invalid password. Please try again.")]
    InvalidPassword,
}

impl Error {
    /// Whether the user can fix this by trying again (e.g. retyping a password).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::InvalidPassword | Error::Locked)
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_password_is_retryable() {
        assert!(Error::InvalidPassword.is_retryable());
        assert!(!Error::Storage("disk full".to_string()).is_retryable());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(Error::Locked.to_string(), "Vault is locked");
        assert_eq!(
            Error::NotFound("snippet-7".to_string()).to_string(),
            "Not found: snippet-7"
        );
    }
}
