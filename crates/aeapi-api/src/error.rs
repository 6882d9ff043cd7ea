//! API error type and the APIv3-style response envelopes.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use aeapi_core::ErrorKind;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// The request body could not be read as JSON or form data.
  #[error("{0}")]
  BadRequest(String),

  #[error(transparent)]
  Submission(#[from] aeapi_core::Error),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Submission(e) => match e.kind() {
        ErrorKind::InputParse | ErrorKind::InvalidFormat => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Crm => StatusCode::BAD_GATEWAY,
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let message = self.to_string();
    tracing::warn!(%status, error = %message, "request failed");
    (status, Json(json!({ "is_error": 1, "error_message": message }))).into_response()
  }
}

/// Success envelope: `{"is_error":0,"version":3,"count":n,"values":...}`.
#[derive(Debug, Serialize)]
pub struct Success<T> {
  pub is_error: u8,
  pub version:  u8,
  pub count:    usize,
  pub values:   T,
}

impl<T> Success<T> {
  pub fn new(count: usize, values: T) -> Self {
    Self { is_error: 0, version: 3, count, values }
  }
}
