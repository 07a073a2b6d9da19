//! Session events and inbound signals.

use tokio::sync::mpsc;

use sklad_common::{Error, NodeId, Result};

/// Something the session reacted to outside of a direct call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The auto-lock countdown armed for `generation` elapsed.
    AutoLockElapsed { generation: u64 },
    /// A front end asked for the vault to be unlocked to copy a snippet.
    UnlockRequested(NodeId),
}

/// Action deferred until the vault is unlocked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    /// Snippet to copy once unlocked.
    pub target: NodeId,
    /// Hide the window after copying.
    pub auto_hide_after: bool,
}

impl PendingAction {
    pub fn copy(target: NodeId) -> Self {
        Self {
            target,
            auto_hide_after: false,
        }
    }

    pub fn copy_and_hide(target: NodeId) -> Self {
        Self {
            target,
            auto_hide_after: true,
        }
    }
}

/// Cloneable handle for sending signals into a session.
#[derive(Debug, Clone)]
pub struct SessionSignals {
    unlock_requests: mpsc::UnboundedSender<NodeId>,
}

impl SessionSignals {
    pub(crate) fn new(unlock_requests: mpsc::UnboundedSender<NodeId>) -> Self {
        Self { unlock_requests }
    }

    /// Ask the session to unlock and then copy `id`.
    ///
    /// # Errors
    /// - The session has been dropped
    pub fn request_unlock(&self, id: NodeId) -> Result<()> {
        self.unlock_requests
            .send(id)
            .map_err(|_| Error::Vault("Session is closed".to_string()))
    }
}
