//! Low-level APIv3 REST client.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{Error, Result};

fn default_timeout_secs() -> u64 { 30 }

/// Connection settings for the CRM's REST endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CivicrmConfig {
  /// Full URL of the REST endpoint, e.g.
  /// `https://crm.example.org/civicrm/ajax/rest`.
  pub rest_url:     String,
  /// The API user's key.
  pub api_key:      String,
  /// The site key.
  pub site_key:     String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

/// A decoded APIv3 envelope with `is_error: 0`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiResponse {
  #[serde(default)]
  pub count:  Option<i64>,
  #[serde(default)]
  pub id:     Option<Value>,
  #[serde(default)]
  pub values: Value,
  #[serde(flatten)]
  pub rest:   Map<String, Value>,
}

/// Async HTTP client for the CRM's APIv3.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct CivicrmClient {
  client: reqwest::Client,
  config: CivicrmConfig,
}

impl CivicrmClient {
  pub fn new(config: CivicrmConfig) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    Ok(Self { client, config })
  }

  pub fn config(&self) -> &CivicrmConfig { &self.config }

  /// `POST <rest_url>` with `entity`, `action` and JSON-encoded `params`.
  pub async fn call(&self, entity: &str, action: &str, params: Value) -> Result<ApiResponse> {
    let api = format!("{entity}.{action}");
    tracing::debug!(%api, "calling CRM");

    let json = params.to_string();
    let resp = self
      .client
      .post(&self.config.rest_url)
      .form(&[
        ("entity", entity),
        ("action", action),
        ("api_key", self.config.api_key.as_str()),
        ("key", self.config.site_key.as_str()),
        ("json", json.as_str()),
      ])
      .send()
      .await?;

    if !resp.status().is_success() {
      return Err(Error::Status(resp.status()));
    }

    let body: Value = resp.json().await?;
    parse_envelope(&api, body)
  }
}

/// Split an APIv3 envelope into success payload or [`Error::Api`].
pub(crate) fn parse_envelope(api: &str, body: Value) -> Result<ApiResponse> {
  let Value::Object(map) = body else {
    return Err(Error::UnexpectedResponse {
      api:    api.to_owned(),
      reason: "body is not a JSON object".into(),
    });
  };

  let is_error = match map.get("is_error") {
    Some(Value::Bool(b)) => *b,
    Some(Value::Number(n)) => n.as_i64() != Some(0),
    Some(Value::String(s)) => s != "0",
    _ => false,
  };

  if is_error {
    let message = map
      .get("error_message")
      .and_then(Value::as_str)
      .unwrap_or("unknown CRM error")
      .to_owned();
    let code = map
      .get("error_code")
      .and_then(Value::as_str)
      .map(str::to_owned);
    return Err(Error::Api { message, code });
  }

  serde_json::from_value(Value::Object(map)).map_err(|e| Error::UnexpectedResponse {
    api:    api.to_owned(),
    reason: e.to_string(),
  })
}
