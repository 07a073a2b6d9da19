//! Session orchestrator.
//!
//! All tree mutations and vault transitions go through a single `Session`
//! held by one task. A mutation is applied to the in-memory forest first and
//! then persisted; a failed save is logged and the in-memory state is kept.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use sklad_common::{Error, NodeId, Result, SensitiveString};
use sklad_vault::secrets::{purge_node, scrub_secrets};
use sklad_vault::{Backend, Forest, Node, NodeKind, Settings, VaultEvent, VaultMachine, VaultState};

use crate::events::{PendingAction, SessionEvent, SessionSignals};

pub struct Session {
    backend: Arc<dyn Backend>,
    forest: Forest,
    settings: Settings,
    vault: VaultMachine,
    vault_events: mpsc::UnboundedReceiver<VaultEvent>,
    unlock_tx: mpsc::UnboundedSender<NodeId>,
    unlock_rx: mpsc::UnboundedReceiver<NodeId>,
    /// Copy of the selected node, re-resolved by id after every change.
    selected: Option<Node>,
    pending: Option<PendingAction>,
    unlock_prompt: bool,
    reset_armed: bool,
    forwarder: Option<JoinHandle<()>>,
}

impl Session {
    /// Open a session over `backend`.
    ///
    /// Loads the tree, the settings and the unlock status concurrently and
    /// derives the vault state from them.
    pub async fn open(backend: Arc<dyn Backend>) -> Result<Self> {
        let (mut forest, settings, unlocked) = tokio::try_join!(
            backend.load_tree(),
            backend.load_settings(),
            backend.is_vault_unlocked(),
        )?;

        let state = VaultState::resolve(&settings, unlocked);
        if state != VaultState::Unlocked {
            scrub_secrets(&mut forest);
        }
        info!("Session opened, vault {}", state);

        let (vault, vault_events) =
            VaultMachine::new(backend.clone(), state, settings.lock_timeout());
        let (unlock_tx, unlock_rx) = mpsc::unbounded_channel();

        Ok(Self {
            backend,
            forest,
            settings,
            vault,
            vault_events,
            unlock_tx,
            unlock_rx,
            selected: None,
            pending: None,
            unlock_prompt: false,
            reset_armed: false,
            forwarder: None,
        })
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn vault_state(&self) -> VaultState {
        self.vault.state()
    }

    pub fn is_auto_lock_armed(&self) -> bool {
        self.vault.is_timer_armed()
    }

    pub fn selected(&self) -> Option<&Node> {
        self.selected.as_ref()
    }

    pub fn pending_action(&self) -> Option<&PendingAction> {
        self.pending.as_ref()
    }

    /// Whether the front end should be showing the unlock prompt.
    pub fn is_unlock_prompt_visible(&self) -> bool {
        self.unlock_prompt
    }

    pub fn is_reset_armed(&self) -> bool {
        self.reset_armed
    }

    /// Handle for sending unlock requests into this session.
    pub fn signals(&self) -> SessionSignals {
        SessionSignals::new(self.unlock_tx.clone())
    }

    /// Forward an external unlock-request subscription into the session.
    ///
    /// The forwarding task lives as long as the session, replacing any
    /// previously attached subscription.
    pub fn attach_unlock_requests(&mut self, mut requests: mpsc::Receiver<NodeId>) {
        let tx = self.unlock_tx.clone();
        let task = tokio::spawn(async move {
            while let Some(id) = requests.recv().await {
                if tx.send(id).is_err() {
                    break;
                }
            }
        });
        if let Some(previous) = self.forwarder.replace(task) {
            previous.abort();
        }
    }

    /// Select a node. `None`, or an unknown id, clears the selection.
    pub fn select(&mut self, id: Option<&NodeId>) {
        self.selected = id.and_then(|id| self.forest.find_by_id(id)).cloned();
    }

    // Tree intents

    /// Create a node with its default label and select it.
    ///
    /// Returns `None` when `parent` is missing or is a snippet.
    pub async fn add_node(&mut self, parent: Option<&NodeId>, kind: NodeKind) -> Option<NodeId> {
        let node = Node::new_of_kind(kind, parent.cloned());
        let id = node.id().clone();

        let next = self.forest.insert_under_parent(parent, node);
        if !next.contains(&id) {
            debug!("Cannot add a node under {:?}", parent);
            return None;
        }

        self.forest = next;
        self.select(Some(&id));
        self.persist().await;
        Some(id)
    }

    pub async fn delete_node(&mut self, id: &NodeId) {
        if !self.forest.contains(id) {
            return;
        }
        self.forest = self.forest.remove(id);
        self.reresolve_selection();
        self.persist().await;
    }

    /// Rename a node. The label is trimmed; empty or unchanged labels are ignored.
    pub async fn rename_node(&mut self, id: &NodeId, label: &str) {
        let label = label.trim();
        let current = match self.forest.find_by_id(id) {
            Some(node) => node.label(),
            None => return,
        };
        if label.is_empty() || label == current {
            return;
        }

        let label = label.to_string();
        self.forest = self.forest.update(id, |mut node| {
            node.set_label(label);
            node
        });
        self.reresolve_selection();
        self.persist().await;
    }

    /// Move `dragged` under `new_parent`, before the sibling `before`.
    ///
    /// Illegal moves leave everything as it was.
    pub async fn move_node(
        &mut self,
        dragged: &NodeId,
        new_parent: Option<&NodeId>,
        before: Option<&NodeId>,
    ) {
        let next = self.forest.move_node(dragged, new_parent, before);
        if next == self.forest {
            return;
        }
        self.forest = next;
        self.reresolve_selection();
        self.persist().await;
    }

    /// Replace a node's content with `node`.
    ///
    /// The node keeps its place in the tree; a folder keeps its children.
    ///
    /// # Errors
    /// - `NotFound` if no node has this id
    /// - `InvalidInput` if the kind changes
    /// - `NotPermitted` for secret content while no master password exists
    /// - `Locked` for secret content while the vault is locked
    pub async fn save_node(&mut self, mut node: Node) -> Result<()> {
        let existing = self
            .forest
            .find_by_id(node.id())
            .ok_or_else(|| Error::NotFound(format!("Node not found: {}", node.id())))?;
        if existing.kind() != node.kind() {
            return Err(Error::InvalidInput("Cannot change node kind".to_string()));
        }
        if node.is_secret() || existing.is_secret() {
            self.check_secret_authoring()?;
        }

        node.set_parent_id(existing.parent_id().cloned());
        if let (Node::Folder(folder), Some(current)) = (&mut node, existing.as_folder()) {
            folder.children = current.children.clone();
        }

        let id = node.id().clone();
        self.forest = self.forest.update(&id, move |_| node);
        self.reresolve_selection();
        self.persist().await;
        Ok(())
    }

    // Reads

    /// Plaintext of a snippet.
    ///
    /// # Errors
    /// - `Locked` for a secret snippet unless the vault is unlocked
    pub fn snippet_value(&self, id: &NodeId) -> Result<&str> {
        let node = self.node(id)?;
        if !self.vault.can_access(node) {
            return Err(Error::Locked);
        }
        node.as_snippet()
            .map(|snippet| snippet.value.as_str())
            .ok_or_else(|| Error::InvalidInput("Folders have no value".to_string()))
    }

    /// Copy a snippet to the clipboard through the backend.
    ///
    /// # Errors
    /// - `Locked` for a secret snippet unless the vault is unlocked
    /// - any backend failure, which is also logged
    pub async fn copy_snippet(&mut self, id: &NodeId) -> Result<()> {
        let node = self.node(id)?;
        if !self.vault.can_access(node) {
            return Err(Error::Locked);
        }
        self.backend.copy_snippet(id).await.map_err(|e| {
            warn!("Copy of {} failed: {}", id, e);
            e
        })
    }

    /// Copy a snippet, or defer the copy behind the unlock prompt if the
    /// snippet is secret and the vault locked.
    pub async fn request_copy(&mut self, id: &NodeId) -> Result<()> {
        match self.copy_snippet(id).await {
            Err(Error::Locked) if self.vault_state() == VaultState::Locked => {
                self.pending = Some(PendingAction::copy(id.clone()));
                self.unlock_prompt = true;
                Ok(())
            }
            other => other,
        }
    }

    /// Copy the snippet most recently copied through the backend.
    ///
    /// A secret snippet while locked is handled like an unlock request: the
    /// copy is deferred, hides the window afterwards and the prompt is shown.
    pub async fn copy_last_used(&mut self) -> Result<()> {
        let id = self
            .backend
            .last_copied()
            .await
            .ok_or_else(|| Error::NotFound("Nothing has been copied yet".to_string()))?;
        match self.copy_snippet(&id).await {
            Err(Error::Locked) if self.vault_state() == VaultState::Locked => {
                self.on_unlock_request(id).await;
                Ok(())
            }
            other => other,
        }
    }

    // Vault intents

    /// Set up the master password and unlock.
    pub async fn initialize_vault(&mut self, password: &SensitiveString) -> Result<()> {
        self.vault.initialize(password.expose()).await?;
        self.reload().await;
        Ok(())
    }

    /// Unlock the vault and run the pending action, if any.
    ///
    /// # Errors
    /// - `InvalidPassword` for a wrong password; the vault stays locked
    /// - `NotPermitted` if there is no vault
    pub async fn unlock(&mut self, password: &SensitiveString) -> Result<()> {
        if !self.vault.unlock(password.expose()).await? {
            return Err(Error::InvalidPassword);
        }
        self.unlock_prompt = false;
        self.reload().await;
        self.drain_pending().await;
        Ok(())
    }

    /// Lock the vault and purge secret plaintext from memory.
    pub async fn lock(&mut self) {
        if self.vault.lock().await {
            self.after_lock().await;
        }
    }

    /// First step of a reset; nothing is destroyed yet.
    pub fn request_reset(&mut self) {
        self.reset_armed = true;
    }

    pub fn cancel_reset(&mut self) {
        self.reset_armed = false;
    }

    /// Destroy every secret and the master password.
    ///
    /// # Errors
    /// - `NotPermitted` unless [`Session::request_reset`] was called first
    /// - any backend failure; the session is left as it was
    pub async fn confirm_reset(&mut self) -> Result<()> {
        if !self.reset_armed {
            return Err(Error::NotPermitted(
                "Reset must be requested before it is confirmed".to_string(),
            ));
        }
        self.reset_armed = false;

        let (forest, settings) = self.vault.reset().await?;
        self.forest = forest;
        self.vault.set_timeout(settings.lock_timeout());
        self.settings = settings;
        self.pending = None;
        self.unlock_prompt = false;
        self.reresolve_selection();
        info!("Vault reset, {} nodes kept", self.forest.len());
        Ok(())
    }

    /// Apply and persist new settings.
    ///
    /// Disabling the master password locks the vault.
    pub async fn update_settings(&mut self, settings: Settings) {
        if !settings.master_password_enabled() {
            self.lock().await;
        }
        self.vault.set_timeout(settings.lock_timeout());
        if let Err(e) = self.backend.save_settings(&settings).await {
            warn!("Failed to save settings: {}", e);
        }
        self.settings = settings;
        self.reload().await;
    }

    /// Hide the unlock prompt and forget the pending action.
    pub fn cancel_unlock_prompt(&mut self) {
        self.unlock_prompt = false;
        self.pending = None;
    }

    // Events

    /// Wait for the next auto-lock or unlock-request event and apply it.
    ///
    /// Returns `None` once no event can arrive any more.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        let event = tokio::select! {
            Some(VaultEvent::AutoLockElapsed { generation }) = self.vault_events.recv() => {
                SessionEvent::AutoLockElapsed { generation }
            }
            Some(id) = self.unlock_rx.recv() => SessionEvent::UnlockRequested(id),
            else => return None,
        };
        self.apply(event.clone()).await;
        Some(event)
    }

    /// Apply every event that is already queued. Returns how many there were.
    pub async fn drain_events(&mut self) -> usize {
        let mut events = Vec::new();
        while let Ok(VaultEvent::AutoLockElapsed { generation }) = self.vault_events.try_recv() {
            events.push(SessionEvent::AutoLockElapsed { generation });
        }
        while let Ok(id) = self.unlock_rx.try_recv() {
            events.push(SessionEvent::UnlockRequested(id));
        }

        let count = events.len();
        for event in events {
            self.apply(event).await;
        }
        count
    }

    /// Re-read tree, settings and unlock status from the backend.
    ///
    /// The selection is re-resolved by id and cleared if the node is gone.
    /// A failing backend is logged and the current state kept.
    pub async fn reload(&mut self) {
        let loaded = tokio::try_join!(
            self.backend.load_tree(),
            self.backend.load_settings(),
            self.backend.is_vault_unlocked(),
        );
        let (mut forest, settings, unlocked) = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!("Reload failed: {}", e);
                return;
            }
        };

        self.vault.sync(unlocked, &settings);
        if !self.vault.is_unlocked() {
            scrub_secrets(&mut forest);
        }
        self.forest = forest;
        self.settings = settings;
        self.reresolve_selection();
    }

    async fn apply(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::AutoLockElapsed { generation } => {
                if self.vault.on_auto_lock(generation).await {
                    self.after_lock().await;
                }
            }
            SessionEvent::UnlockRequested(id) => self.on_unlock_request(id).await,
        }
    }

    async fn on_unlock_request(&mut self, id: NodeId) {
        match self.vault_state() {
            VaultState::Locked => {
                debug!("Unlock requested for {}", id);
                self.pending = Some(PendingAction::copy_and_hide(id));
                self.unlock_prompt = true;
            }
            VaultState::Unlocked => {
                self.pending = Some(PendingAction::copy_and_hide(id));
                self.drain_pending().await;
            }
            VaultState::Uninitialized => {
                warn!("Ignoring unlock request for {}: no vault", id);
            }
        }
    }

    async fn drain_pending(&mut self) {
        let Some(action) = self.pending.take() else {
            return;
        };
        if let Err(e) = self.backend.copy_snippet(&action.target).await {
            warn!("Deferred copy of {} failed: {}", action.target, e);
        }
        if action.auto_hide_after {
            if let Err(e) = self.backend.hide_window().await {
                warn!("Failed to hide window: {}", e);
            }
        }
    }

    async fn after_lock(&mut self) {
        scrub_secrets(&mut self.forest);
        self.selected = self.selected.as_ref().map(purge_node);
        self.reload().await;
    }

    fn check_secret_authoring(&self) -> Result<()> {
        if self.vault.can_author_secrets() {
            return Ok(());
        }
        match self.vault_state() {
            VaultState::Uninitialized => Err(Error::NotPermitted(
                "Set a master password before storing secrets".to_string(),
            )),
            _ => Err(Error::Locked),
        }
    }

    fn node(&self, id: &NodeId) -> Result<&Node> {
        self.forest
            .find_by_id(id)
            .ok_or_else(|| Error::NotFound(format!("Node not found: {}", id)))
    }

    fn reresolve_selection(&mut self) {
        self.selected = self
            .selected
            .take()
            .and_then(|selected| self.forest.find_by_id(selected.id()).cloned());
    }

    async fn persist(&self) {
        if let Err(e) = self.backend.save_tree(&self.forest).await {
            warn!("Failed to save tree: {}", e);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}
