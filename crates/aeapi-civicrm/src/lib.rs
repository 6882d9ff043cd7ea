//! [`aeapi_core::CrmApi`] over the CiviCRM APIv3 REST endpoint.
//!
//! Every trait method maps to one or two `entity`/`action` calls posted as
//! form data (`entity`, `action`, `api_key`, `key`, `json`). Responses use the
//! APIv3 envelope (`is_error`, `error_message`, `count`, `id`, `values`).

mod client;
mod crm;
mod decode;

pub mod error;

pub use client::{CivicrmClient, CivicrmConfig};
pub use error::{Error, Result};
