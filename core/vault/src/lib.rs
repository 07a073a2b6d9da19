//! Snippet tree and vault engine for Sklad.
//!
//! This crate provides:
//! - The folder/snippet node model and its on-disk JSON shape
//! - Pure tree operations (insert, remove, rename, move with cycle checks)
//! - Secret purging on lock and access gating
//! - The vault state machine with its auto-lock timer
//! - The `Backend` contract implemented by storage crates
//!
//! # Architecture
//! Nothing in here performs I/O directly. Persistence, key handling and the
//! clipboard are reached only through [`Backend`].

pub mod backend;
pub mod config;
pub mod node;
pub mod secrets;
pub mod state;
pub mod timer;
pub mod tree;

pub use backend::Backend;
pub use config::{SecuritySettings, Settings, Theme, DEFAULT_LOCK_TIMEOUT};
pub use node::{Folder, Node, NodeKind, Snippet};
pub use secrets::{purge_secrets, scrub_secrets};
pub use state::{VaultMachine, VaultState};
pub use timer::{AutoLockTimer, VaultEvent};
pub use tree::{insert_at_position, Forest};
