//! Vault state machine.
//!
//! `VaultMachine` is the only place the lock state changes. Every
//! transition into `Unlocked` starts a fresh auto-lock countdown and every
//! transition out of it cancels the countdown.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use sklad_common::{Error, Result};

use crate::backend::Backend;
use crate::config::{Settings, DEFAULT_LOCK_TIMEOUT};
use crate::node::Node;
use crate::secrets;
use crate::timer::{AutoLockTimer, VaultEvent};
use crate::tree::Forest;

/// Lock state of the vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultState {
    /// No master password has been set up.
    Uninitialized,
    Locked,
    Unlocked,
}

impl VaultState {
    /// Derive the state from persisted settings and the backend's key status.
    pub fn resolve(settings: &Settings, unlocked: bool) -> Self {
        match (settings.master_password_enabled(), unlocked) {
            (false, _) => VaultState::Uninitialized,
            (true, false) => VaultState::Locked,
            (true, true) => VaultState::Unlocked,
        }
    }
}

impl fmt::Display for VaultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VaultState::Uninitialized => "uninitialized",
            VaultState::Locked => "locked",
            VaultState::Unlocked => "unlocked",
        };
        f.write_str(name)
    }
}

/// Owner of the lock state and the auto-lock timer.
pub struct VaultMachine {
    backend: Arc<dyn Backend>,
    state: VaultState,
    timeout: Duration,
    /// Bumped on every transition; identifies the current unlock period.
    generation: u64,
    timer: AutoLockTimer,
}

impl VaultMachine {
    /// Create a machine starting in `state`.
    ///
    /// Auto-lock events arrive on the returned receiver and must be fed
    /// back through [`VaultMachine::on_auto_lock`]. When `state` is
    /// `Unlocked` this must be called within a tokio runtime.
    pub fn new(
        backend: Arc<dyn Backend>,
        state: VaultState,
        timeout: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<VaultEvent>) {
        let (timer, events) = AutoLockTimer::new();
        let mut machine = Self {
            backend,
            state,
            timeout,
            generation: 0,
            timer,
        };
        if state == VaultState::Unlocked {
            machine.timer.arm(machine.generation, machine.timeout);
        }
        (machine, events)
    }

    pub fn state(&self) -> VaultState {
        self.state
    }

    pub fn is_unlocked(&self) -> bool {
        self.state == VaultState::Unlocked
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_timer_armed(&self) -> bool {
        self.timer.is_armed()
    }

    /// Change the auto-lock timeout.
    ///
    /// While unlocked the countdown restarts with the new timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        let timeout = if timeout.is_zero() {
            DEFAULT_LOCK_TIMEOUT
        } else {
            timeout
        };
        if timeout == self.timeout {
            return;
        }
        self.timeout = timeout;
        if self.is_unlocked() {
            // Invalidates an elapsed countdown that is still queued.
            self.generation += 1;
            self.timer.arm(self.generation, self.timeout);
        }
    }

    /// Set up the master password.
    ///
    /// # Errors
    /// - `NotPermitted` unless the vault is uninitialized
    /// - `InvalidInput` for an empty or whitespace-only password
    /// - any backend failure; the state is unchanged
    pub async fn initialize(&mut self, password: &str) -> Result<()> {
        if self.state != VaultState::Uninitialized {
            return Err(Error::NotPermitted(
                "Vault is already initialized".to_string(),
            ));
        }
        if password.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Master password cannot be empty".to_string(),
            ));
        }

        self.backend.initialize_vault(password).await?;
        self.transition(VaultState::Unlocked);
        Ok(())
    }

    /// Try to unlock with `password`.
    ///
    /// # Returns
    /// - `Ok(true)` if the vault is unlocked (or already was)
    /// - `Ok(false)` for a wrong password; the state stays `Locked`
    ///
    /// # Errors
    /// - `NotPermitted` if there is no vault to unlock
    pub async fn unlock(&mut self, password: &str) -> Result<bool> {
        match self.state {
            VaultState::Uninitialized => Err(Error::NotPermitted(
                "Vault has not been initialized".to_string(),
            )),
            VaultState::Unlocked => Ok(true),
            VaultState::Locked => {
                if !self.backend.unlock_vault(password).await? {
                    debug!("Unlock rejected");
                    return Ok(false);
                }
                self.transition(VaultState::Unlocked);
                Ok(true)
            }
        }
    }

    /// Lock the vault. Returns whether a transition happened.
    ///
    /// The state changes before the backend is told to drop its key; a
    /// failing backend is logged and does not revert the lock.
    pub async fn lock(&mut self) -> bool {
        if self.state != VaultState::Unlocked {
            return false;
        }
        self.transition(VaultState::Locked);
        if let Err(e) = self.backend.lock_vault().await {
            warn!("Backend failed to lock vault: {}", e);
        }
        true
    }

    /// Destroy the vault. Valid from any state.
    ///
    /// # Errors
    /// - any backend failure, in which case the state is unchanged
    pub async fn reset(&mut self) -> Result<(Forest, Settings)> {
        let fresh = self.backend.reset_vault().await?;
        self.transition(VaultState::Uninitialized);
        Ok(fresh)
    }

    /// Handle an elapsed auto-lock countdown. Returns whether it locked.
    ///
    /// Deliveries for an outdated generation are ignored.
    pub async fn on_auto_lock(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.state != VaultState::Unlocked {
            debug!("Ignoring stale auto-lock for generation {}", generation);
            return false;
        }
        info!("Auto-lock timeout elapsed");
        self.lock().await
    }

    /// Mirror the backend's state after a reload.
    ///
    /// A locked machine only becomes unlocked through [`VaultMachine::unlock`];
    /// a backend that still reports a key after a lock is not followed.
    pub fn sync(&mut self, unlocked: bool, settings: &Settings) {
        let next = VaultState::resolve(settings, unlocked);
        if self.state == VaultState::Locked && next == VaultState::Unlocked {
            warn!("Backend reports an unlocked vault after lock, staying locked");
            return;
        }
        self.transition(next);
    }

    /// Whether `node`'s plaintext is accessible in the current state.
    pub fn can_access(&self, node: &Node) -> bool {
        secrets::can_access(node, self.state)
    }

    pub fn can_author_secrets(&self) -> bool {
        secrets::can_author_secrets(self.state)
    }

    fn transition(&mut self, next: VaultState) {
        if next == self.state {
            return;
        }
        info!("Vault {} -> {}", self.state, next);
        self.state = next;
        self.generation += 1;
        if next == VaultState::Unlocked {
            self.timer.arm(self.generation, self.timeout);
        } else {
            self.timer.cancel();
        }
    }
}
