//! Core types, the CRM collaborator trait and the contact submission
//! workflow.
//!
//! This crate is free of HTTP and database dependencies. The REST client
//! (`aeapi-civicrm`), the SQLite sandbox (`aeapi-sandbox`) and the HTTP front
//! door (`aeapi-api`) all depend on it.

// Native `async fn` in traits; the `Send` bounds are spelled out on the
// returned futures in `crm::CrmApi`.
#![allow(async_fn_in_trait)]

pub mod attributes;
pub mod crm;
pub mod enrollment;
pub mod entity;
pub mod error;
pub mod params;
pub mod resolver;
pub mod submission;

#[cfg(test)]
mod fake;

pub use attributes::ContactAttributes;
pub use crm::CrmApi;
pub use error::{Error, ErrorKind, Result};
pub use resolver::MatchingStrategy;
pub use submission::{SubmissionResult, SubmissionService};
