//! Error type for `aeapi-civicrm`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("CRM responded with HTTP {0}")]
  Status(reqwest::StatusCode),

  /// `is_error: 1`; the CRM's message is passed through as-is.
  #[error("{message}")]
  Api {
    message: String,
    code:    Option<String>,
  },

  #[error("unexpected response from {api}: {reason}")]
  UnexpectedResponse { api: String, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
