//! Conversions between sandbox rows and `aeapi-core` entities.
//!
//! Contact attributes are stored as a compact JSON object; timestamps as
//! RFC 3339 strings.

use aeapi_core::{
  ContactAttributes,
  attributes::{CONTACT_TYPE, EMAIL},
  entity::{Contact, EntityId},
};
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::Result;

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn encode_attributes(attributes: &ContactAttributes) -> Result<String> {
  Ok(serde_json::to_string(attributes)?)
}

pub fn decode_attributes(s: &str) -> Result<ContactAttributes> {
  Ok(serde_json::from_str(s)?)
}

/// `"<first_name> <last_name>"`, falling back to the organization name and
/// then to the e-mail address.
pub fn display_name(attributes: &ContactAttributes) -> Option<String> {
  let text = |key: &str| {
    attributes
      .get(key)
      .and_then(Value::as_str)
      .filter(|s| !s.is_empty())
  };

  let person: Vec<&str> = ["first_name", "last_name"]
    .into_iter()
    .filter_map(text)
    .collect();
  if !person.is_empty() {
    return Some(person.join(" "));
  }
  text("organization_name")
    .or_else(|| text(EMAIL))
    .map(str::to_owned)
}

// ─── Raw row types ────────────────────────────────────────────────────────────

pub struct RawContact {
  pub id:           EntityId,
  pub contact_type: String,
  pub display_name: Option<String>,
  pub email:        Option<String>,
  pub attributes:   String,
  pub created_date: String,
}

pub const CONTACT_COLUMNS: &str =
  "id, contact_type, display_name, email, attributes, created_date";

impl RawContact {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:           row.get(0)?,
      contact_type: row.get(1)?,
      display_name: row.get(2)?,
      email:        row.get(3)?,
      attributes:   row.get(4)?,
      created_date: row.get(5)?,
    })
  }

  pub fn attributes(&self) -> Result<ContactAttributes> {
    decode_attributes(&self.attributes)
  }

  /// The full contact entity: typed columns plus every other stored
  /// attribute in `extra`.
  pub fn into_contact(self) -> Result<Contact> {
    let mut extra = self.attributes()?.into_map();
    extra.remove(CONTACT_TYPE);
    extra.remove(EMAIL);
    extra.insert("created_date".to_owned(), Value::from(self.created_date));

    Ok(Contact {
      id:           self.id,
      contact_type: self.contact_type,
      display_name: self.display_name,
      email:        self.email,
      extra,
    })
  }
}
