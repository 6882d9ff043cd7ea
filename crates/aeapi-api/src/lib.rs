//! HTTP front door for the contact submission gateway.
//!
//! Exposes an axum [`Router`] backed by a [`SubmissionService`] over any
//! [`aeapi_core::CrmApi`]. Authentication and TLS are the caller's concern.
//!
//! Success responses use the APIv3 envelope
//! (`{"is_error":0,"version":3,"count":..,"values":..}`); failures are
//! `{"is_error":1,"error_message":"..."}`.

pub mod contact;
pub mod error;

use axum::{
  Router,
  routing::{get, post},
};
use tower_http::trace::TraceLayer;

use aeapi_core::{CrmApi, SubmissionService};

pub use error::{ApiError, Success};

/// Build a fully-materialised API router for `service`.
pub fn api_router<C>(service: SubmissionService<C>) -> Router<()>
where
  C: CrmApi + 'static,
{
  Router::new()
    .route("/AEContact/Submit", post(contact::submit::<C>))
    .route("/AEContact/getfields", get(contact::getfields))
    .with_state(service)
    .layer(TraceLayer::new_for_http())
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use aeapi_core::MatchingStrategy;
  use aeapi_sandbox::SandboxCrm;
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  use super::*;

  async fn sandbox(fuzzy: bool) -> SandboxCrm {
    let crm = SandboxCrm::open_in_memory().await.unwrap();
    crm.set_fuzzy_matching(fuzzy).await.unwrap();
    crm.add_country("DE", 1082).await.unwrap();
    for group in ["Newsletter", "Petition", "Welcome", "Volunteers"] {
      crm.ensure_group(group).await.unwrap();
    }
    crm
  }

  fn service(crm: &SandboxCrm, strategy: MatchingStrategy) -> SubmissionService<SandboxCrm> {
    SubmissionService::new(Arc::new(crm.clone()), strategy)
  }

  async fn send(
    service: SubmissionService<SandboxCrm>,
    req: Request<Body>,
  ) -> (StatusCode, Value) {
    let resp = api_router(service).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
  }

  fn json_request(body: Value) -> Request<Body> {
    Request::builder()
      .method("POST")
      .uri("/AEContact/Submit")
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body.to_string()))
      .unwrap()
  }

  fn form_request(fields: &[(&str, &str)]) -> Request<Body> {
    form_request_as("application/x-www-form-urlencoded", fields)
  }

  fn form_request_as(content_type: &str, fields: &[(&str, &str)]) -> Request<Body> {
    let body = fields
      .iter()
      .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
      .collect::<Vec<_>>()
      .join("&");
    Request::builder()
      .method("POST")
      .uri("/AEContact/Submit")
      .header(header::CONTENT_TYPE, content_type)
      .body(Body::from(body))
      .unwrap()
  }

  // ── Submit ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn json_submission_creates_contact_and_enrolls() {
    let crm = sandbox(true).await;
    let (status, body) = send(
      service(&crm, MatchingStrategy::Fuzzy),
      json_request(json!({
        "contact": {
          "contact_type": "Individual",
          "first_name": "Ada",
          "email": "ada@example.org",
          "country": "DE",
        },
        "groups": ["Newsletter:Newsletter", "Petition"],
      })),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["is_error"], json!(0));
    assert_eq!(body["count"], json!(4));
    let values = &body["values"];
    let contact_id = values["Contact"]["id"].as_i64().unwrap();
    assert_eq!(values["Contact"]["country_id"], json!(1082));
    assert_eq!(values["MailingEventSubscribe"]["contact_id"], json!(contact_id));
    assert_eq!(values["Activity"]["subject"], json!("Requested: Newsletter (DoubleOptIn sent)"));
    assert_eq!(values["GroupContact"]["status"], json!("Added"));

    let memberships = crm.group_contacts(contact_id).await.unwrap();
    let statuses: Vec<&str> = memberships.iter().map(|m| m.status.as_str()).collect();
    assert_eq!(statuses, vec!["Pending", "Added"]);
  }

  #[tokio::test]
  async fn form_submission_with_encoded_parameters() {
    let crm = sandbox(false).await;
    let (status, body) = send(
      service(&crm, MatchingStrategy::ExactOrCreate),
      form_request(&[
        ("contact", r#"{"contact_type":"Individual","email":"grace@example.org","country":"1082"}"#),
        ("groups", r#"["Newsletter:newsletter","Volunteers:pending"]"#),
        ("want_newsletter", "0"),
      ]),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    let values = &body["values"];
    assert_eq!(values["Activity"]["subject"], json!("Requested: Volunteers (DoubleOptIn sent)"));
    assert_eq!(values["GroupContact"], Value::Null);

    let apis: Vec<String> = crm.journal().await.unwrap().iter().map(|e| e.api()).collect();
    assert_eq!(
      apis,
      vec![
        "Contact.get",
        "Contact.getsingle",
        "Contact.create",
        "Contact.getsingle",
        "Group.getsingle",
        "MailingEventSubscribe.create",
        "Activity.create",
      ]
    );
  }

  #[tokio::test]
  async fn form_content_type_is_case_insensitive() {
    for content_type in [
      "Application/X-WWW-Form-Urlencoded",
      "application/x-www-form-urlencoded; charset=UTF-8",
    ] {
      let crm = sandbox(true).await;
      let (status, body) = send(
        service(&crm, MatchingStrategy::Fuzzy),
        form_request_as(
          content_type,
          &[
            ("contact", r#"{"contact_type":"Individual","email":"ada@example.org"}"#),
            ("groups", r#"["Petition"]"#),
          ],
        ),
      )
      .await;

      assert_eq!(status, StatusCode::OK, "{content_type}: {body}");
      assert_eq!(body["values"]["GroupContact"]["status"], json!("Added"));
    }
  }

  #[tokio::test]
  async fn checked_newsletter_checkbox_opts_in() {
    let crm = sandbox(true).await;
    let (status, body) = send(
      service(&crm, MatchingStrategy::Fuzzy),
      form_request(&[
        ("contact", r#"{"contact_type":"Individual","email":"ada@example.org"}"#),
        ("groups", r#"["Newsletter:Newsletter"]"#),
        ("want_newsletter", "on"),
      ]),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["values"]["Activity"]["subject"], json!("Requested: Newsletter (DoubleOptIn sent)"));
  }

  #[tokio::test]
  async fn second_submission_reuses_contact() {
    let crm = sandbox(true).await;
    let submit = || {
      json_request(json!({
        "contact": {"contact_type": "Individual", "email": "ada@example.org"},
        "groups": ["Welcome:NewAndDoiAccepted"],
      }))
    };

    let (_, first) = send(service(&crm, MatchingStrategy::Fuzzy), submit()).await;
    let (_, second) = send(service(&crm, MatchingStrategy::Fuzzy), submit()).await;

    assert_eq!(first["values"]["Contact"]["id"], second["values"]["Contact"]["id"]);
    assert_eq!(first["values"]["GroupContact"]["status"], json!("Added"));
    assert_eq!(second["values"]["GroupContact"], Value::Null);
    assert_eq!(crm.contact_count().await.unwrap(), 1);
  }

  // ── Failures ────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn unknown_country_is_400() {
    let crm = sandbox(true).await;
    let (status, body) = send(
      service(&crm, MatchingStrategy::Fuzzy),
      json_request(json!({"contact": {"contact_type": "Individual", "country": "XX"}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"is_error": 1, "error_message": "Unknown country XX."}));
    assert_eq!(crm.contact_count().await.unwrap(), 0);
  }

  #[tokio::test]
  async fn malformed_contact_is_400() {
    let crm = sandbox(true).await;
    let (status, body) = send(
      service(&crm, MatchingStrategy::Fuzzy),
      form_request(&[("contact", "{oops")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_message"], json!("Could not parse parameter contact."));
  }

  #[tokio::test]
  async fn missing_group_is_404_and_not_rolled_back() {
    let crm = sandbox(true).await;
    let (status, body) = send(
      service(&crm, MatchingStrategy::Fuzzy),
      json_request(json!({
        "contact": {"contact_type": "Individual", "email": "ada@example.org"},
        "groups": ["Petition", "Ghost"],
      })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_message"], json!("Group Ghost not found."));
    assert!(body.get("values").is_none());
    assert_eq!(crm.contact_count().await.unwrap(), 1);
    let created = crm
      .journal()
      .await
      .unwrap()
      .iter()
      .filter(|e| e.api() == "GroupContact.create")
      .count();
    assert_eq!(created, 1);
  }

  #[tokio::test]
  async fn crm_failure_is_502() {
    // Fuzzy strategy configured, but the matcher is not installed.
    let crm = sandbox(false).await;
    let (status, body) = send(
      service(&crm, MatchingStrategy::Fuzzy),
      json_request(json!({"contact": {"contact_type": "Individual", "email": "ada@example.org"}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error_message"], json!("API (Contact, getorcreate) does not exist"));
  }

  // ── getfields ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn getfields_lists_submit_parameters() {
    let crm = sandbox(true).await;
    let req = Request::builder()
      .uri("/AEContact/getfields")
      .body(Body::empty())
      .unwrap();
    let (status, body) = send(service(&crm, MatchingStrategy::Fuzzy), req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], json!(3));
    assert_eq!(body["values"]["contact"]["api.required"], json!(true));
    assert_eq!(body["values"]["want_newsletter"]["type"], json!("boolean"));
  }
}
