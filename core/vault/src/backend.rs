//! Backend contract.
//!
//! The backend owns persistence, key material, the clipboard and the window.
//! The core only ever talks to it through this trait.

use async_trait::async_trait;

use sklad_common::{NodeId, Result};

use crate::config::Settings;
use crate::tree::Forest;

/// Storage and desktop collaborator for a session.
///
/// Implementations must be safe to share between tasks. Secret snippet
/// plaintext handed to `save_tree` is the backend's to seal; ciphertext in
/// `encrypted_value` must be preserved as-is.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Load the persisted forest.
    ///
    /// While the vault is unlocked secret snippets come back with their
    /// plaintext restored. While locked their `value` is empty.
    async fn load_tree(&self) -> Result<Forest>;

    /// Persist the whole forest.
    ///
    /// # Errors
    /// - `Locked` if the forest carries secret plaintext and there is no key
    async fn save_tree(&self, forest: &Forest) -> Result<()>;

    async fn load_settings(&self) -> Result<Settings>;

    async fn save_settings(&self, settings: &Settings) -> Result<()>;

    /// Whether the backend currently holds an unlocked key.
    async fn is_vault_unlocked(&self) -> Result<bool>;

    /// Create the vault credentials and leave the vault unlocked.
    async fn initialize_vault(&self, password: &str) -> Result<()>;

    /// Try a password.
    ///
    /// # Returns
    /// - `Ok(true)` if the vault is now unlocked
    /// - `Ok(false)` if the password was wrong
    async fn unlock_vault(&self, password: &str) -> Result<bool>;

    /// Drop the key. Secret plaintext is no longer obtainable afterwards.
    async fn lock_vault(&self) -> Result<()>;

    /// Destroy the vault credentials and all secret snippets.
    ///
    /// Returns the fresh forest and settings the backend now holds.
    async fn reset_vault(&self) -> Result<(Forest, Settings)>;

    /// Place a snippet's value on the clipboard.
    ///
    /// # Errors
    /// - `Locked` for a secret snippet while the vault is locked
    /// - `NotFound` if no snippet has this id
    /// - `InvalidInput` for folders and empty values
    async fn copy_snippet(&self, id: &NodeId) -> Result<()>;

    async fn hide_window(&self) -> Result<()>;

    /// Snippet most recently copied through this backend.
    async fn last_copied(&self) -> Option<NodeId> {
        None
    }
}
