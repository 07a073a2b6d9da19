//! Backends for Sklad.
//!
//! This crate implements the vault's [`Backend`](sklad_vault::Backend)
//! contract:
//! - [`LocalBackend`] keeps the tree, settings and credentials as JSON files
//!   in a data directory and seals secret values with the vault key
//! - [`MemoryBackend`] keeps everything in memory, for tests and development
//!
//! Both reach the clipboard, the window and notifications through the
//! [`Desktop`] trait.

pub mod credentials;
pub mod desktop;
pub mod local;
pub mod memory;

pub use credentials::{CredentialRecord, CREDENTIALS_FILENAME};
pub use desktop::{Desktop, MemoryDesktop};
pub use local::LocalBackend;
pub use memory::MemoryBackend;
