//! Records returned by (and inputs sent to) the CRM collaborator.
//!
//! These mirror the CRM's own entities closely enough to be returned verbatim
//! in a submission result. Fields the workflow does not interpret are carried
//! in `extra`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Numeric primary key of a CRM entity.
pub type EntityId = i64;

// ─── Contacts ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
  pub id:           EntityId,
  pub contact_type: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub display_name: Option<String>,
  /// Primary e-mail address; the double-opt-in flow sends to this.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email:        Option<String>,
  #[serde(flatten)]
  pub extra:        Map<String, Value>,
}

// ─── Groups ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
  pub id:    EntityId,
  pub name:  String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
}

/// Input for a direct group membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGroupContact {
  pub contact_id: EntityId,
  pub group_id:   EntityId,
  /// Membership status, e.g. `"Added"` or `"Removed"`.
  pub status:     String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupContact {
  pub id:         EntityId,
  pub contact_id: EntityId,
  pub group_id:   EntityId,
  pub status:     String,
}

// ─── Mailing subscriptions ────────────────────────────────────────────────────

/// Input for a pending (double-opt-in) mailing subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubscription {
  pub contact_id: EntityId,
  /// The contact's primary e-mail; the CRM rejects the call when absent.
  pub email:      Option<String>,
  pub group_id:   EntityId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailingEventSubscribe {
  pub id:         EntityId,
  pub contact_id: EntityId,
  pub group_id:   EntityId,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email:      Option<String>,
  /// Confirmation hash embedded in the opt-in link.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub hash:       Option<String>,
}

// ─── Activities ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActivity {
  pub source_contact_id: EntityId,
  pub activity_type:     String,
  pub subject:           String,
  pub status:            String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
  pub id:                EntityId,
  pub source_contact_id: EntityId,
  pub activity_type:     String,
  pub subject:           String,
  pub status:            String,
}
