//! [`CrmApi`] implementation for [`CivicrmClient`].

use aeapi_core::{
  ContactAttributes, CrmApi,
  entity::{
    Activity, Contact, EntityId, Group, GroupContact, MailingEventSubscribe,
    NewActivity, NewGroupContact, NewSubscription,
  },
};
use serde_json::{Value, json};

use crate::{
  CivicrmClient, Error, Result,
  client::ApiResponse,
  decode::{self, parse_id, records, response_id},
};

fn unexpected(api: &str, reason: impl Into<String>) -> Error {
  Error::UnexpectedResponse { api: api.to_owned(), reason: reason.into() }
}

fn created_id(api: &str, resp: &ApiResponse) -> Result<EntityId> {
  response_id(resp).ok_or_else(|| unexpected(api, "no id in response"))
}

/// Attributes plus APIv3 options, as one JSON params object.
fn query(attributes: ContactAttributes, options: Value) -> Value {
  let mut params = attributes.into_map();
  params.insert("sequential".into(), json!(1));
  params.insert("options".into(), options);
  Value::Object(params)
}

impl CrmApi for CivicrmClient {
  type Error = Error;

  async fn country_by_iso_code(&self, iso_code: String) -> Result<Option<EntityId>> {
    let resp = self
      .call("Country", "get", json!({ "iso_code": iso_code, "sequential": 1 }))
      .await?;
    // Only an unambiguous hit counts.
    if resp.count != Some(1) {
      return Ok(None);
    }
    Ok(response_id(&resp))
  }

  async fn group_by_name(&self, name: String) -> Result<Option<Group>> {
    let resp = self
      .call("Group", "get", json!({ "name": name, "sequential": 1 }))
      .await?;
    Ok(match records(&resp).as_slice() {
      [one] => decode::group(one),
      _ => None,
    })
  }

  async fn extension_installed(&self, key: String) -> Result<bool> {
    let resp = self
      .call("Extension", "get", json!({ "full_name": key, "sequential": 1 }))
      .await?;
    Ok(records(&resp).iter().any(|ext| {
      ext.get("status").and_then(Value::as_str) == Some("installed")
        && [ext.get("key"), ext.get("full_name")]
          .into_iter()
          .flatten()
          .any(|k| k.as_str() == Some(key.as_str()))
    }))
  }

  async fn find_contacts(&self, attributes: ContactAttributes) -> Result<Vec<EntityId>> {
    let params = query(attributes, json!({ "limit": 0 }));
    let resp = self.call("Contact", "get", params).await?;
    Ok(
      records(&resp)
        .iter()
        .filter_map(|r| r.get("id").or_else(|| r.get("contact_id")).and_then(parse_id))
        .collect(),
    )
  }

  async fn get_single_contact(&self, attributes: ContactAttributes) -> Result<Option<EntityId>> {
    let params = query(attributes.clone(), json!({ "limit": 2 }));
    let resp = self.call("Contact", "get", params).await?;
    let ids: Vec<EntityId> = records(&resp)
      .iter()
      .filter_map(|r| r.get("id").and_then(parse_id))
      .collect();
    match ids.as_slice() {
      [] => Ok(None),
      [id] => Ok(Some(*id)),
      _ => {
        // The page is capped at two; ask for the real number of matches.
        let resp = self
          .call("Contact", "getcount", Value::Object(attributes.into_map()))
          .await?;
        let found = resp
          .rest
          .get("result")
          .and_then(parse_id)
          .unwrap_or(ids.len() as i64);
        Err(Error::Api {
          message: format!("Expected one Contact but found {found}"),
          code:    None,
        })
      }
    }
  }

  async fn get_contact(&self, id: EntityId) -> Result<Option<Contact>> {
    let resp = self
      .call("Contact", "get", json!({ "id": id, "sequential": 1 }))
      .await?;
    Ok(records(&resp).first().and_then(|r| decode::contact(r)))
  }

  async fn create_contact(&self, attributes: ContactAttributes) -> Result<Contact> {
    let resp = self
      .call("Contact", "create", Value::Object(attributes.into_map()))
      .await?;
    let id = created_id("Contact.create", &resp)?;
    self
      .get_contact(id)
      .await?
      .ok_or_else(|| unexpected("Contact.create", format!("contact {id} vanished after create")))
  }

  async fn get_or_create_contact(&self, attributes: ContactAttributes) -> Result<Option<EntityId>> {
    let resp = self
      .call("Contact", "getorcreate", Value::Object(attributes.into_map()))
      .await?;
    Ok(response_id(&resp))
  }

  async fn create_group_contact(&self, input: NewGroupContact) -> Result<GroupContact> {
    let params = json!({
      "contact_id": input.contact_id,
      "group_id":   input.group_id,
      "status":     input.status,
    });
    self.call("GroupContact", "create", params).await?;

    // APIv3 answers `GroupContact.create` with counters only; load the row.
    let resp = self
      .call(
        "GroupContact",
        "get",
        json!({
          "contact_id": input.contact_id,
          "group_id":   input.group_id,
          "status":     input.status,
          "sequential": 1,
        }),
      )
      .await?;
    records(&resp)
      .first()
      .and_then(|r| decode::group_contact(r))
      .ok_or_else(|| unexpected("GroupContact.get", "membership not found after create"))
  }

  async fn create_mailing_subscription(
    &self,
    input: NewSubscription,
  ) -> Result<MailingEventSubscribe> {
    let params = json!({
      "contact_id": input.contact_id,
      "email":      input.email,
      "group_id":   input.group_id,
    });
    let resp = self.call("MailingEventSubscribe", "create", params).await?;
    let id = created_id("MailingEventSubscribe.create", &resp)?;
    let hash = records(&resp)
      .first()
      .and_then(|r| r.get("hash"))
      .and_then(Value::as_str)
      .map(str::to_owned);

    Ok(MailingEventSubscribe {
      id,
      contact_id: input.contact_id,
      group_id: input.group_id,
      email: input.email,
      hash,
    })
  }

  async fn create_activity(&self, input: NewActivity) -> Result<Activity> {
    let params = json!({
      "source_contact_id": input.source_contact_id,
      "activity_type_id":  input.activity_type,
      "subject":           input.subject,
      "status_id":         input.status,
    });
    let resp = self.call("Activity", "create", params).await?;
    Ok(Activity {
      id:                created_id("Activity.create", &resp)?,
      source_contact_id: input.source_contact_id,
      activity_type:     input.activity_type,
      subject:           input.subject,
      status:            input.status,
    })
  }
}

#[cfg(test)]
mod tests {
  use std::{collections::HashMap, sync::Arc};

  use axum::{Form, Json, Router, extract::State, routing::post};
  use serde_json::{Value, json};
  use tokio::{net::TcpListener, sync::Mutex};

  use super::*;
  use crate::CivicrmConfig;

  type Calls = Arc<Mutex<Vec<String>>>;

  /// Serve a fake REST endpoint answering `Entity.action` from `replies`.
  async fn start_mock_server(replies: HashMap<&'static str, Value>) -> (CivicrmClient, Calls) {
    let calls: Calls = Arc::default();
    let replies = Arc::new(replies);

    let app = Router::new()
      .route(
        "/civicrm/ajax/rest",
        post(
          |State((calls, replies)): State<(Calls, Arc<HashMap<&'static str, Value>>)>,
           Form(form): Form<HashMap<String, String>>| async move {
            let api = format!("{}.{}", form["entity"], form["action"]);
            calls.lock().await.push(api.clone());
            let body = replies
              .get(api.as_str())
              .cloned()
              .unwrap_or_else(|| json!({"is_error": 1, "error_message": format!("no reply for {api}")}));
            Json(body)
          },
        ),
      )
      .with_state((calls.clone(), replies));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    let client = CivicrmClient::new(CivicrmConfig {
      rest_url:     format!("http://127.0.0.1:{port}/civicrm/ajax/rest"),
      api_key:      "k".into(),
      site_key:     "s".into(),
      timeout_secs: 5,
    })
    .unwrap();
    (client, calls)
  }

  fn attrs(v: Value) -> ContactAttributes {
    serde_json::from_value(v).unwrap()
  }

  #[tokio::test]
  async fn ambiguous_exact_match_reports_the_real_count() {
    let (client, calls) = start_mock_server(HashMap::from([
      (
        "Contact.get",
        json!({"is_error": 0, "count": 2, "values": [{"id": "3"}, {"id": "4"}]}),
      ),
      ("Contact.getcount", json!({"is_error": 0, "result": 5})),
    ]))
    .await;

    let err = client
      .get_single_contact(attrs(json!({"contact_type": "Individual", "last_name": "Smith"})))
      .await
      .unwrap_err();

    assert_eq!(err.to_string(), "Expected one Contact but found 5");
    assert_eq!(*calls.lock().await, vec!["Contact.get", "Contact.getcount"]);
  }

  #[tokio::test]
  async fn single_exact_match_needs_no_count() {
    let (client, calls) = start_mock_server(HashMap::from([(
      "Contact.get",
      json!({"is_error": 0, "count": 1, "values": [{"id": "3"}]}),
    )]))
    .await;

    let id = client
      .get_single_contact(attrs(json!({"contact_type": "Individual", "last_name": "Smith"})))
      .await
      .unwrap();

    assert_eq!(id, Some(3));
    assert_eq!(*calls.lock().await, vec!["Contact.get"]);
  }
}
