//! Decoding APIv3 `values` payloads into `aeapi-core` entities.
//!
//! APIv3 returns ids and most scalars as strings and keys `values` by id
//! unless `sequential` was requested, so every accessor here is lenient.

use aeapi_core::entity::{Contact, EntityId, Group, GroupContact};
use serde_json::{Map, Value};

use crate::client::ApiResponse;

/// An id given as a JSON number or a numeric string.
pub fn parse_id(value: &Value) -> Option<EntityId> {
  match value {
    Value::Number(n) => n.as_i64(),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }
}

/// The records in `values`, whether sequential (array) or keyed by id.
pub fn records(resp: &ApiResponse) -> Vec<&Map<String, Value>> {
  match &resp.values {
    Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
    Value::Object(map) => map.values().filter_map(Value::as_object).collect(),
    _ => Vec::new(),
  }
}

/// The envelope's `id`, falling back to the first record's.
pub fn response_id(resp: &ApiResponse) -> Option<EntityId> {
  resp
    .id
    .as_ref()
    .and_then(parse_id)
    .or_else(|| records(resp).first().and_then(|r| r.get("id")).and_then(parse_id))
}

fn text(map: &Map<String, Value>, key: &str) -> Option<String> {
  match map.get(key)? {
    Value::String(s) if !s.is_empty() => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

pub fn contact(map: &Map<String, Value>) -> Option<Contact> {
  let id = map.get("id").or_else(|| map.get("contact_id")).and_then(parse_id)?;
  let mut extra = map.clone();
  for key in ["id", "contact_id", "contact_type", "display_name", "email"] {
    extra.remove(key);
  }
  Some(Contact {
    id,
    contact_type: text(map, "contact_type").unwrap_or_default(),
    display_name: text(map, "display_name"),
    email: text(map, "email"),
    extra,
  })
}

pub fn group(map: &Map<String, Value>) -> Option<Group> {
  Some(Group {
    id:    map.get("id").and_then(parse_id)?,
    name:  text(map, "name").unwrap_or_default(),
    title: text(map, "title"),
  })
}

pub fn group_contact(map: &Map<String, Value>) -> Option<GroupContact> {
  Some(GroupContact {
    id:         map.get("id").and_then(parse_id)?,
    contact_id: map.get("contact_id").and_then(parse_id)?,
    group_id:   map.get("group_id").and_then(parse_id)?,
    status:     text(map, "status").unwrap_or_default(),
  })
}
