//! Local filesystem backend.
//!
//! The data directory holds three JSON documents:
//! - `sklad.json`: the forest, secret values sealed into `encryptedValue`
//! - `settings.json`: user settings
//! - `vault.json`: the credential record, present only once a master
//!   password exists
//!
//! Documents are written to a temporary sibling first and renamed over the
//! target, so a crash never leaves a half-written file behind.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use zeroize::Zeroize;

use crate::credentials::{CredentialRecord, CREDENTIALS_FILENAME};
use crate::desktop::Desktop;
use sklad_common::{Error, NodeId, Result};
use sklad_crypto::{open_text, seal_text, KdfParams, VaultKey};
use sklad_vault::config::SETTINGS_FILENAME;
use sklad_vault::secrets::{has_plain_secrets, strip_secrets};
use sklad_vault::{Backend, Forest, Node, Settings, Snippet};

/// File name of the snippet tree in the data directory.
pub const TREE_FILENAME: &str = "sklad.json";

/// Id of the snippet seeded into a fresh data directory.
pub const WELCOME_SNIPPET_ID: &str = "welcome-1";

/// Local filesystem backend.
pub struct LocalBackend {
    root: PathBuf,
    desktop: Arc<dyn Desktop>,
    kdf_params: KdfParams,
    /// Present while the vault is unlocked.
    key: RwLock<Option<VaultKey>>,
    last_copied: RwLock<Option<NodeId>>,
}

impl LocalBackend {
    /// Create a backend over `root`.
    ///
    /// # Postconditions
    /// - Root directory is created if it doesn't exist
    /// - The vault starts locked
    ///
    /// # Errors
    /// - Permission denied
    pub fn new(root: impl AsRef<Path>, desktop: Arc<dyn Desktop>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        if !root.exists() {
            std::fs::create_dir_all(&root)?;
        }

        Ok(Self {
            root,
            desktop,
            kdf_params: KdfParams::default(),
            key: RwLock::new(None),
            last_copied: RwLock::new(None),
        })
    }

    /// Use different Argon2id parameters for newly created credentials.
    pub fn with_kdf_params(mut self, kdf_params: KdfParams) -> Self {
        self.kdf_params = kdf_params;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tree_path(&self) -> PathBuf {
        self.root.join(TREE_FILENAME)
    }

    fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILENAME)
    }

    fn credentials_path(&self) -> PathBuf {
        self.root.join(CREDENTIALS_FILENAME)
    }

    async fn write_atomic(&self, path: &Path, contents: &str) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, contents).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Read the tree as stored, without restoring secret values.
    async fn read_tree(&self) -> Result<Forest> {
        let path = self.tree_path();
        if !fs::try_exists(&path).await? {
            info!("No snippet file found, seeding {}", path.display());
            let forest = welcome_tree()?;
            self.write_atomic(&path, &forest.to_json()?).await?;
            return Ok(forest);
        }

        let json = fs::read_to_string(&path).await?;
        let forest = Forest::from_json(&json)?.normalize_parents();
        forest.validate()?;
        Ok(forest)
    }

    async fn read_settings(&self) -> Result<Settings> {
        let path = self.settings_path();
        if !fs::try_exists(&path).await? {
            return Ok(Settings::default());
        }

        let json = fs::read_to_string(&path).await?;
        match Settings::from_json(&json) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                warn!("Ignoring unreadable settings file: {}", e);
                Ok(Settings::default())
            }
        }
    }

    async fn write_tree(&self, forest: &Forest) -> Result<()> {
        self.write_atomic(&self.tree_path(), &forest.to_json()?).await
    }

    async fn write_settings(&self, settings: &Settings) -> Result<()> {
        self.write_atomic(&self.settings_path(), &settings.to_json()?)
            .await
    }

    async fn read_credentials(&self) -> Result<Option<CredentialRecord>> {
        let path = self.credentials_path();
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }
        let json = fs::read_to_string(&path).await?;
        CredentialRecord::from_json(&json).map(Some)
    }
}

fn welcome_tree() -> Result<Forest> {
    let mut welcome =
        Snippet::new("Welcome to Sklad", None).with_value("This is your first snippet.");
    welcome.id = NodeId::new(WELCOME_SNIPPET_ID)?;
    Ok(Forest::new(vec![welcome.into()]))
}

#[async_trait]
impl Backend for LocalBackend {
    async fn load_tree(&self) -> Result<Forest> {
        let mut forest = self.read_tree().await?;

        let key = self.key.read().await;
        if let Some(key) = key.as_ref() {
            forest.try_for_each_snippet_mut(|snippet| {
                if !snippet.is_secret {
                    return Ok(());
                }
                if let Some(sealed) = &snippet.encrypted_value {
                    match open_text(key, sealed) {
                        Ok(value) => snippet.value = value,
                        Err(e) => warn!("Could not decrypt snippet {}: {}", snippet.id, e),
                    }
                }
                Ok(())
            })?;
        }
        Ok(forest)
    }

    async fn save_tree(&self, forest: &Forest) -> Result<()> {
        let mut stored = forest.clone();
        {
            let key = self.key.read().await;
            match key.as_ref() {
                Some(key) => stored.try_for_each_snippet_mut(|snippet| {
                    if snippet.is_secret && !snippet.value.is_empty() {
                        snippet.encrypted_value = Some(seal_text(key, &snippet.value)?);
                        snippet.value.zeroize();
                    }
                    Ok(())
                })?,
                None if has_plain_secrets(forest) => return Err(Error::Locked),
                None => {}
            }
        }

        debug!("Saving {} nodes", stored.len());
        self.write_tree(&stored).await
    }

    async fn load_settings(&self) -> Result<Settings> {
        self.read_settings().await
    }

    async fn save_settings(&self, settings: &Settings) -> Result<()> {
        if !settings.master_password_enabled() {
            *self.key.write().await = None;
        }
        self.write_settings(settings).await
    }

    async fn is_vault_unlocked(&self) -> Result<bool> {
        Ok(self.key.read().await.is_some())
    }

    async fn initialize_vault(&self, password: &str) -> Result<()> {
        if self.read_credentials().await?.is_some() {
            return Err(Error::AlreadyExists(
                "Vault already initialized".to_string(),
            ));
        }

        let (record, key) = CredentialRecord::create(password.as_bytes(), self.kdf_params.clone())?;
        self.write_atomic(&self.credentials_path(), &record.to_json()?)
            .await?;

        let mut settings = self.read_settings().await?;
        settings.security.master_password_enabled = true;
        self.write_settings(&settings).await?;

        *self.key.write().await = Some(key);
        info!("Vault initialized");
        Ok(())
    }

    async fn unlock_vault(&self, password: &str) -> Result<bool> {
        let record = self
            .read_credentials()
            .await?
            .ok_or_else(|| Error::NotFound("Vault has not been initialized".to_string()))?;

        match record.unlock(password.as_bytes())? {
            Some(key) => {
                *self.key.write().await = Some(key);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn lock_vault(&self) -> Result<()> {
        *self.key.write().await = None;
        Ok(())
    }

    async fn reset_vault(&self) -> Result<(Forest, Settings)> {
        let forest = strip_secrets(&self.read_tree().await?);
        let mut settings = self.read_settings().await?;
        settings.security.master_password_enabled = false;

        self.write_tree(&forest).await?;
        self.write_settings(&settings).await?;

        let credentials = self.credentials_path();
        if fs::try_exists(&credentials).await? {
            fs::remove_file(&credentials).await?;
        }

        *self.key.write().await = None;
        *self.last_copied.write().await = None;
        info!("Vault reset");
        Ok((forest, settings))
    }

    async fn copy_snippet(&self, id: &NodeId) -> Result<()> {
        let forest = self.read_tree().await?;
        let snippet = match forest.find_by_id(id) {
            Some(Node::Snippet(snippet)) => snippet,
            Some(Node::Folder(_)) => {
                return Err(Error::InvalidInput("Cannot copy a folder".to_string()))
            }
            None => return Err(Error::NotFound(format!("Snippet not found: {}", id))),
        };

        let mut value = if snippet.is_secret {
            let key = self.key.read().await;
            let key = key.as_ref().ok_or(Error::Locked)?;
            match &snippet.encrypted_value {
                Some(sealed) => open_text(key, sealed)?,
                None => String::new(),
            }
        } else {
            snippet.value.clone()
        };
        if value.is_empty() {
            return Err(Error::InvalidInput("Empty value".to_string()));
        }

        let written = self.desktop.write_clipboard(&value);
        value.zeroize();
        written?;

        *self.last_copied.write().await = Some(id.clone());

        if self.read_settings().await?.notifications_enabled {
            if let Err(e) = self
                .desktop
                .notify("Sklad", &format!("Copied: {}", snippet.label))
            {
                warn!("Notification failed: {}", e);
            }
        }
        Ok(())
    }

    async fn hide_window(&self) -> Result<()> {
        self.desktop.hide_window()
    }

    async fn last_copied(&self) -> Option<NodeId> {
        self.last_copied.read().await.clone()
    }
}
