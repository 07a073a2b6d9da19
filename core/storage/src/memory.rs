//! In-memory backend for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::warn;

use crate::desktop::{Desktop, MemoryDesktop};
use sklad_common::{Error, NodeId, Result};
use sklad_vault::secrets::{has_plain_secrets, strip_secrets};
use sklad_vault::{Backend, Forest, Node, Settings};

#[derive(Debug, Default)]
struct Inner {
    /// Tree as persisted: secret values moved out into `sealed`.
    forest: Forest,
    /// Stand-in for ciphertext, keyed by snippet id.
    sealed: HashMap<NodeId, String>,
    settings: Settings,
    password: Option<String>,
    unlocked: bool,
    last_copied: Option<NodeId>,
    saves: usize,
    copies: Vec<NodeId>,
    hides: usize,
    fail_saves: bool,
    fail_copies: bool,
    fail_reset: bool,
    fail_locks: bool,
}

impl Inner {
    fn store(&mut self, forest: &Forest, unlocked: bool) -> Result<()> {
        if !unlocked && has_plain_secrets(forest) {
            return Err(Error::Locked);
        }
        let mut stored = forest.clone();
        let mut sealed = Vec::new();
        stored.try_for_each_snippet_mut(|snippet| {
            if snippet.is_secret && !snippet.value.is_empty() {
                sealed.push((snippet.id.clone(), std::mem::take(&mut snippet.value)));
                snippet.encrypted_value = Some(format!("memory:{}", snippet.id));
            }
            Ok(())
        })?;

        self.sealed.extend(sealed);
        self.forest = stored;
        Ok(())
    }

    fn restored(&self) -> Forest {
        let mut forest = self.forest.clone();
        if self.unlocked {
            // Restoring cannot fail.
            let _ = forest.try_for_each_snippet_mut(|snippet| {
                if snippet.is_secret {
                    if let Some(value) = self.sealed.get(&snippet.id) {
                        snippet.value = value.clone();
                    }
                }
                Ok(())
            });
        }
        forest
    }
}

/// In-memory backend.
///
/// Useful for testing and development. Secret values never appear in the
/// stored tree; a side table keyed by id plays the role of ciphertext.
/// Every call that reaches a collaborator is journaled, and saves, copies
/// and resets can be made to fail.
pub struct MemoryBackend {
    inner: Mutex<Inner>,
    desktop: Arc<MemoryDesktop>,
}

impl MemoryBackend {
    /// Create an empty backend with default settings and no vault.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            desktop: Arc::new(MemoryDesktop::new()),
        }
    }

    /// Seed the stored tree. Secret plaintext in `forest` is sealed.
    pub fn with_tree(self, forest: Forest) -> Self {
        {
            let mut inner = self.lock();
            // Sealing while unlocked only fails on `Locked`.
            let _ = inner.store(&forest, true);
        }
        self
    }

    /// Set up a master password. The vault starts locked.
    pub fn with_password(self, password: &str) -> Self {
        {
            let mut inner = self.lock();
            inner.password = Some(password.to_string());
            inner.settings.security.master_password_enabled = true;
            inner.unlocked = false;
        }
        self
    }

    pub fn with_settings(self, settings: Settings) -> Self {
        self.lock().settings = settings;
        self
    }

    pub fn desktop(&self) -> &Arc<MemoryDesktop> {
        &self.desktop
    }

    /// The tree as persisted, secret values removed.
    pub fn stored_tree(&self) -> Forest {
        self.lock().forest.clone()
    }

    pub fn stored_settings(&self) -> Settings {
        self.lock().settings.clone()
    }

    /// Number of successful `save_tree` calls.
    pub fn saves(&self) -> usize {
        self.lock().saves
    }

    /// Ids copied to the clipboard, oldest first.
    pub fn copies(&self) -> Vec<NodeId> {
        self.lock().copies.clone()
    }

    pub fn hides(&self) -> usize {
        self.lock().hides
    }

    pub fn fail_saves(&self, fail: bool) {
        self.lock().fail_saves = fail;
    }

    pub fn fail_copies(&self, fail: bool) {
        self.lock().fail_copies = fail;
    }

    pub fn fail_reset(&self, fail: bool) {
        self.lock().fail_reset = fail;
    }

    /// Make `lock_vault` fail while keeping the vault unlocked.
    pub fn fail_locks(&self, fail: bool) {
        self.lock().fail_locks = fail;
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn load_tree(&self) -> Result<Forest> {
        Ok(self.lock().restored())
    }

    async fn save_tree(&self, forest: &Forest) -> Result<()> {
        let mut inner = self.lock();
        if inner.fail_saves {
            return Err(Error::Storage("Injected save failure".to_string()));
        }
        let unlocked = inner.unlocked;
        inner.store(forest, unlocked)?;
        inner.saves += 1;
        Ok(())
    }

    async fn load_settings(&self) -> Result<Settings> {
        Ok(self.lock().settings.clone())
    }

    async fn save_settings(&self, settings: &Settings) -> Result<()> {
        let mut inner = self.lock();
        if !settings.master_password_enabled() {
            inner.unlocked = false;
        }
        inner.settings = settings.clone();
        Ok(())
    }

    async fn is_vault_unlocked(&self) -> Result<bool> {
        Ok(self.lock().unlocked)
    }

    async fn initialize_vault(&self, password: &str) -> Result<()> {
        let mut inner = self.lock();
        if inner.password.is_some() {
            return Err(Error::AlreadyExists("Vault already initialized".to_string()));
        }
        inner.password = Some(password.to_string());
        inner.settings.security.master_password_enabled = true;
        inner.unlocked = true;
        Ok(())
    }

    async fn unlock_vault(&self, password: &str) -> Result<bool> {
        let mut inner = self.lock();
        let ok = inner.password.as_deref() == Some(password);
        if ok {
            inner.unlocked = true;
        }
        Ok(ok)
    }

    async fn lock_vault(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.fail_locks {
            return Err(Error::Storage("Injected lock failure".to_string()));
        }
        inner.unlocked = false;
        Ok(())
    }

    async fn reset_vault(&self) -> Result<(Forest, Settings)> {
        let mut inner = self.lock();
        if inner.fail_reset {
            return Err(Error::Storage("Injected reset failure".to_string()));
        }
        inner.forest = strip_secrets(&inner.forest);
        inner.sealed.clear();
        inner.password = None;
        inner.unlocked = false;
        inner.settings.security.master_password_enabled = false;
        Ok((inner.forest.clone(), inner.settings.clone()))
    }

    async fn copy_snippet(&self, id: &NodeId) -> Result<()> {
        let mut inner = self.lock();
        if inner.fail_copies {
            return Err(Error::Storage("Injected copy failure".to_string()));
        }

        let snippet = match inner.forest.find_by_id(id) {
            Some(Node::Snippet(snippet)) => snippet,
            Some(Node::Folder(_)) => {
                return Err(Error::InvalidInput("Cannot copy a folder".to_string()))
            }
            None => return Err(Error::NotFound(format!("Snippet not found: {}", id))),
        };
        let label = snippet.label.clone();
        let value = if snippet.is_secret {
            if !inner.unlocked {
                return Err(Error::Locked);
            }
            inner.sealed.get(id).cloned().unwrap_or_default()
        } else {
            snippet.value.clone()
        };
        if value.is_empty() {
            return Err(Error::InvalidInput("Empty value".to_string()));
        }

        self.desktop.write_clipboard(&value)?;
        inner.copies.push(id.clone());
        inner.last_copied = Some(id.clone());

        if inner.settings.notifications_enabled {
            if let Err(e) = self.desktop.notify("Sklad", &format!("Copied: {}", label)) {
                warn!("Notification failed: {}", e);
            }
        }
        Ok(())
    }

    async fn hide_window(&self) -> Result<()> {
        self.lock().hides += 1;
        self.desktop.hide_window()
    }

    async fn last_copied(&self) -> Option<NodeId> {
        self.lock().last_copied.clone()
    }
}
