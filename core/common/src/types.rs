//! Common types used throughout Sklad.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Unique identifier for a node in the snippet tree.
///
/// Ids are opaque. Freshly created nodes get a UUID v4, but ids loaded from
/// disk are accepted as-is so long as they are non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create a NodeId from a string.
    ///
    /// # Errors
    /// - Returns error if id is empty
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(crate::Error::InvalidInput(
                "NodeId cannot be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Generate a new unique id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Sensitive text (passwords) that zeroizes on drop.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SensitiveString(String);

impl SensitiveString {
    /// Wrap a string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the inner text.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Check if empty after trimming whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<String> for SensitiveString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SensitiveString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Debug for SensitiveString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SensitiveString([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_creation() {
        let id = NodeId::new("snippet-7").unwrap();
        assert_eq!(id.as_str(), "snippet-7");
        assert_eq!(id.to_string(), "snippet-7");
    }

    #[test]
    fn test_node_id_empty_fails() {
        assert!(NodeId::new("").is_err());
    }

    #[test]
    fn test_node_id_generate_unique() {
        assert_ne!(NodeId::generate(), NodeId::generate());
    }

    #[test]
    fn test_node_id_serializes_as_plain_string() {
        let id = NodeId::new("welcome-1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"welcome-1\"");
        let back: NodeId = serde_json::from_str("\"welcome-1\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_sensitive_string_redacted() {
        let secret = SensitiveString::new("hunter2");
        assert_eq!(format!("{:?}", secret), "SensitiveString([REDACTED])");
        assert_eq!(secret.expose(), "hunter2");
        assert!(SensitiveString::new("   ").is_blank());
    }
}
