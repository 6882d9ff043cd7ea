//! Decoding and registration of the `AEContact.Submit` parameters.
//!
//! Web forms post every parameter as a string, so `contact` and `groups` are
//! accepted either as structured JSON or as JSON-encoded strings.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
  Error, Result,
  attributes::{ContactAttributes, is_empty_value},
  enrollment::GroupEnrollmentRequest,
};

pub const CONTACT: &str = "contact";
pub const GROUPS: &str = "groups";
pub const WANT_NEWSLETTER: &str = "want_newsletter";

/// Decoded parameters of one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitParams {
  pub contact:         ContactAttributes,
  pub groups:          Vec<GroupEnrollmentRequest>,
  pub want_newsletter: bool,
}

impl SubmitParams {
  pub fn from_map(params: &Map<String, Value>) -> Result<Self> {
    let contact = decode_contact(params.get(CONTACT))?;
    if contact.contact_type().is_none() {
      return Err(Error::MissingContactType);
    }

    Ok(Self {
      contact,
      groups: decode_groups(params.get(GROUPS))?,
      want_newsletter: decode_bool(WANT_NEWSLETTER, params.get(WANT_NEWSLETTER), true)?,
    })
  }
}

fn decode_contact(raw: Option<&Value>) -> Result<ContactAttributes> {
  let value = match raw {
    None | Some(Value::Null) => return Err(Error::MissingParameter(CONTACT)),
    Some(Value::String(s)) => {
      serde_json::from_str::<Value>(s).map_err(|_| Error::InputParse(CONTACT))?
    }
    Some(other) => other.clone(),
  };

  match value {
    Value::Object(map) => Ok(ContactAttributes::from(map)),
    _ => Err(Error::InputParse(CONTACT)),
  }
}

fn decode_groups(raw: Option<&Value>) -> Result<Vec<GroupEnrollmentRequest>> {
  let Some(raw) = raw.filter(|v| !is_empty_value(v)) else {
    return Ok(Vec::new());
  };

  let value = match raw {
    Value::String(s) => {
      serde_json::from_str::<Value>(s).map_err(|_| Error::InputParse(GROUPS))?
    }
    other => other.clone(),
  };

  let Value::Array(tokens) = value else {
    return Err(Error::InputParse(GROUPS));
  };

  tokens
    .iter()
    .map(|token| match token {
      Value::String(s) => Ok(GroupEnrollmentRequest::parse(s)),
      Value::Number(n) => Ok(GroupEnrollmentRequest::parse(&n.to_string())),
      _ => Err(Error::InputParse(GROUPS)),
    })
    .collect()
}

fn decode_bool(name: &'static str, raw: Option<&Value>, default: bool) -> Result<bool> {
  match raw {
    None | Some(Value::Null) => Ok(default),
    Some(Value::Bool(b)) => Ok(*b),
    Some(Value::Number(n)) => match n.as_i64() {
      Some(0) => Ok(false),
      Some(1) => Ok(true),
      _ => Err(Error::InvalidBoolean(name)),
    },
    Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
      "1" | "true" | "yes" | "on" => Ok(true),
      "0" | "false" | "no" | "off" | "" => Ok(false),
      _ => Err(Error::InvalidBoolean(name)),
    },
    Some(_) => Err(Error::InvalidBoolean(name)),
  }
}

// ─── Registration ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
  String,
  Boolean,
}

/// Declaration of one API parameter, as reported by `getfields`.
#[derive(Debug, Clone, Serialize)]
pub struct ParamSpec {
  pub name:        &'static str,
  pub title:       &'static str,
  #[serde(rename = "type")]
  pub kind:        ParamType,
  #[serde(rename = "api.required")]
  pub required:    bool,
  #[serde(rename = "api.default", skip_serializing_if = "Option::is_none")]
  pub default:     Option<Value>,
  pub description: &'static str,
}

/// Parameters accepted by `AEContact.Submit`.
pub fn submit_fields() -> Vec<ParamSpec> {
  vec![
    ParamSpec {
      name:        CONTACT,
      title:       "Contact data",
      kind:        ParamType::String,
      required:    true,
      default:     None,
      description: "An array of contact data of which the contact_type key is mandatory.",
    },
    ParamSpec {
      name:        GROUPS,
      title:       "Group data",
      kind:        ParamType::String,
      required:    false,
      default:     None,
      description: "An array of group data.",
    },
    ParamSpec {
      name:        WANT_NEWSLETTER,
      title:       "Wants newsletter",
      kind:        ParamType::Boolean,
      required:    false,
      default:     Some(Value::from(1)),
      description: "Whether the contact subscribed to the newsletter.",
    },
  ]
}
