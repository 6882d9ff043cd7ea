//! SQLite-backed stand-in for the CRM.
//!
//! Implements [`aeapi_core::CrmApi`] on top of [`tokio_rusqlite`] so the
//! gateway can run without a live CRM (local development, integration tests).
//! Every API call is written to a journal table that can be inspected with
//! [`SandboxCrm::journal`].
//!
//! The fuzzy matcher is emulated by a case-insensitive e-mail match and is
//! only available when the sandbox was opened with fuzzy matching enabled.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{JournalEntry, SandboxCrm};
