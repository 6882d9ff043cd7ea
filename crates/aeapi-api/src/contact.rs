//! Handlers for the `AEContact` entity.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/AEContact/Submit` | JSON or form body; see [`aeapi_core::params`] |
//! | `GET`  | `/AEContact/getfields` | Parameter declarations of `Submit` |

use std::collections::HashMap;

use axum::{
  Form, Json,
  extract::{FromRequest, Request, State},
  http::{HeaderValue, header},
};
use serde_json::{Map, Value};

use aeapi_core::{
  CrmApi, SubmissionResult, SubmissionService,
  params::{ParamSpec, SubmitParams, submit_fields},
};

use crate::error::{ApiError, Success};

// ─── Submit ───────────────────────────────────────────────────────────────────

/// `POST /AEContact/Submit`
pub async fn submit<C>(
  State(service): State<SubmissionService<C>>,
  req: Request,
) -> Result<Json<Success<SubmissionResult>>, ApiError>
where
  C: CrmApi + 'static,
{
  let raw = read_params(req).await?;
  let params = SubmitParams::from_map(&raw)?;
  let result = service.submit(params).await?;
  Ok(Json(Success::new(4, result)))
}

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Whether the body is a web form. Media types compare case-insensitively
/// and parameters such as `charset` are ignored.
fn is_form(req: &Request) -> bool {
  req
    .headers()
    .get(header::CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .and_then(|ct| ct.split(';').next())
    .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
}

/// Parameters from either body encoding. Form fields always arrive as
/// strings; structured values are decoded later.
async fn read_params(mut req: Request) -> Result<Map<String, Value>, ApiError> {
  if is_form(&req) {
    // `Form` only accepts the lowercase spelling.
    req
      .headers_mut()
      .insert(header::CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
    let Form(fields) = Form::<HashMap<String, String>>::from_request(req, &())
      .await
      .map_err(|e| ApiError::BadRequest(e.body_text()))?;
    Ok(fields.into_iter().map(|(k, v)| (k, Value::String(v))).collect())
  } else {
    let Json(map) = Json::<Map<String, Value>>::from_request(req, &())
      .await
      .map_err(|e| ApiError::BadRequest(e.body_text()))?;
    Ok(map)
  }
}

// ─── getfields ────────────────────────────────────────────────────────────────

/// `GET /AEContact/getfields`, keyed by parameter name.
pub async fn getfields() -> Json<Success<HashMap<&'static str, ParamSpec>>> {
  let fields: HashMap<_, _> = submit_fields().into_iter().map(|f| (f.name, f)).collect();
  Json(Success::new(fields.len(), fields))
}
