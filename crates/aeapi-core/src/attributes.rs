//! [`ContactAttributes`]: the free-form attribute map submitted for a
//! contact.
//!
//! Attribute names follow the CRM's contact API (`first_name`, `email`,
//! `country`, `contact_type`, ...). Values are kept as raw JSON so that the
//! map can be forwarded to the CRM without loss.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const CONTACT_TYPE: &str = "contact_type";
pub const COUNTRY: &str = "country";
pub const COUNTRY_ID: &str = "country_id";
pub const EMAIL: &str = "email";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactAttributes(Map<String, Value>);

impl ContactAttributes {
  pub fn new() -> Self { Self(Map::new()) }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn get(&self, key: &str) -> Option<&Value> { self.0.get(key) }

  pub fn contains_key(&self, key: &str) -> bool { self.0.contains_key(key) }

  pub fn insert(
    &mut self,
    key: impl Into<String>,
    value: impl Into<Value>,
  ) -> Option<Value> {
    self.0.insert(key.into(), value.into())
  }

  pub fn remove(&mut self, key: &str) -> Option<Value> { self.0.remove(key) }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> { self.0.iter() }

  /// The `contact_type` attribute, if present as a non-empty string.
  pub fn contact_type(&self) -> Option<&str> {
    self
      .0
      .get(CONTACT_TYPE)
      .and_then(Value::as_str)
      .filter(|s| !s.is_empty())
  }

  pub fn email(&self) -> Option<&str> {
    self.0.get(EMAIL).and_then(Value::as_str)
  }

  /// Return a copy with `contact_type` set, overriding any existing value.
  pub fn with_contact_type(mut self, contact_type: &str) -> Self {
    self.insert(CONTACT_TYPE, contact_type);
    self
  }

  pub fn as_map(&self) -> &Map<String, Value> { &self.0 }

  pub fn into_map(self) -> Map<String, Value> { self.0 }

  /// `true` if every attribute in `self` is present in `other` with an equal
  /// value. Numbers and numeric strings compare by their text form, which is
  /// how the CRM compares query parameters.
  pub fn is_subset_of(&self, other: &ContactAttributes) -> bool {
    self.0.iter().all(|(k, v)| {
      other
        .0
        .get(k)
        .is_some_and(|o| loosely_equal(v, o))
    })
  }
}

impl From<Map<String, Value>> for ContactAttributes {
  fn from(map: Map<String, Value>) -> Self { Self(map) }
}

impl FromIterator<(String, Value)> for ContactAttributes {
  fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}

// ─── Value predicates ─────────────────────────────────────────────────────────

/// Emptiness as the CRM's API layer understands it: `null`, `false`, `0`,
/// `""`, `"0"` and empty collections are all empty.
pub fn is_empty_value(value: &Value) -> bool {
  match value {
    Value::Null => true,
    Value::Bool(b) => !b,
    Value::Number(n) => n.as_f64() == Some(0.0),
    Value::String(s) => s.is_empty() || s == "0",
    Value::Array(a) => a.is_empty(),
    Value::Object(o) => o.is_empty(),
  }
}

/// A JSON number, or a string holding a plain decimal number (`"12"`,
/// `" 4.5"`, `"-3"`, `"1e3"`).
pub fn is_numeric_value(value: &Value) -> bool {
  match value {
    Value::Number(_) => true,
    Value::String(s) => {
      let s = s.trim();
      !s.is_empty()
        && s
          .bytes()
          .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
        && s.parse::<f64>().is_ok()
    }
    _ => false,
  }
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
  match (a, b) {
    (Value::String(x), Value::String(y)) => x == y,
    (Value::Number(x), Value::String(y)) | (Value::String(y), Value::Number(x)) => {
      x.to_string() == *y
    }
    _ => a == b,
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn attrs(v: Value) -> ContactAttributes {
    serde_json::from_value(v).unwrap()
  }

  #[test]
  fn contact_type_ignores_empty_and_non_string() {
    assert_eq!(attrs(json!({"contact_type": "Individual"})).contact_type(), Some("Individual"));
    assert_eq!(attrs(json!({"contact_type": ""})).contact_type(), None);
    assert_eq!(attrs(json!({"contact_type": 3})).contact_type(), None);
    assert_eq!(attrs(json!({})).contact_type(), None);
  }

  #[test]
  fn empty_values_follow_crm_rules() {
    for v in [json!(null), json!(false), json!(0), json!(""), json!("0"), json!([]), json!({})] {
      assert!(is_empty_value(&v), "{v} should be empty");
    }
    for v in [json!(true), json!(1), json!("DE"), json!("00"), json!([0])] {
      assert!(!is_empty_value(&v), "{v} should not be empty");
    }
  }

  #[test]
  fn numeric_detection() {
    for v in [json!(1082), json!("1082"), json!(" 12"), json!("-3"), json!("4.5"), json!("1e3")] {
      assert!(is_numeric_value(&v), "{v} should be numeric");
    }
    for v in [json!("DE"), json!("inf"), json!("NaN"), json!(""), json!("e5"), json!(true), json!(null)] {
      assert!(!is_numeric_value(&v), "{v} should not be numeric");
    }
  }

  #[test]
  fn subset_compares_numbers_and_strings_loosely() {
    let stored = attrs(json!({"email": "a@example.org", "country_id": "1082", "contact_type": "Individual"}));
    assert!(attrs(json!({"email": "a@example.org"})).is_subset_of(&stored));
    assert!(attrs(json!({"country_id": 1082})).is_subset_of(&stored));
    assert!(!attrs(json!({"email": "b@example.org"})).is_subset_of(&stored));
    assert!(!attrs(json!({"first_name": "Ada"})).is_subset_of(&stored));
  }
}
