//! Error type for `aeapi-sandbox`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// A rejection worded the way the CRM's API reports it.
  #[error("{0}")]
  Api(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
