//! Session orchestration for Sklad.
//!
//! A [`Session`] is the composition root a front end drives: it holds the
//! current forest, settings, selection and the single pending action, and
//! routes every intent through the tree engine and the vault state machine
//! before handing results to the [`Backend`](sklad_vault::Backend).

pub mod events;
pub mod session;

pub use events::{PendingAction, SessionEvent, SessionSignals};
pub use session::Session;
