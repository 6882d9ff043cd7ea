//! The `CrmApi` trait: the fixed API surface of the external CRM.
//!
//! Implemented by `aeapi-civicrm` (the production REST client) and
//! `aeapi-sandbox` (a SQLite stand-in). The submission workflow depends on
//! this abstraction only.

use std::future::Future;

use crate::{
  attributes::ContactAttributes,
  entity::{
    Activity, Contact, EntityId, Group, GroupContact, MailingEventSubscribe,
    NewActivity, NewGroupContact, NewSubscription,
  },
};

/// Extension key of the extended contact matcher (XCM).
pub const XCM_EXTENSION_KEY: &str = "de.systopia.xcm";

/// Abstraction over the CRM's entity API.
///
/// Every method corresponds to one API call; nothing is cached. All methods
/// return `Send` futures so implementations can be shared across axum
/// handlers.
pub trait CrmApi: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Reference data ────────────────────────────────────────────────────

  /// `Country.get` by ISO code. `None` if the code is unknown.
  fn country_by_iso_code(
    &self,
    iso_code: String,
  ) -> impl Future<Output = Result<Option<EntityId>, Self::Error>> + Send + '_;

  /// `Group.getsingle` by exact name. `None` if no such group exists.
  fn group_by_name(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Option<Group>, Self::Error>> + Send + '_;

  /// `Extension.get`: whether the extension with `key` is installed and
  /// enabled.
  fn extension_installed(
    &self,
    key: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Contacts ──────────────────────────────────────────────────────────

  /// `Contact.get`: plain equality lookup, returns the ids of all matches.
  fn find_contacts(
    &self,
    attributes: ContactAttributes,
  ) -> impl Future<Output = Result<Vec<EntityId>, Self::Error>> + Send + '_;

  /// `Contact.getsingle` by attributes. `None` on zero matches; more than one
  /// match is an error.
  fn get_single_contact(
    &self,
    attributes: ContactAttributes,
  ) -> impl Future<Output = Result<Option<EntityId>, Self::Error>> + Send + '_;

  /// `Contact.getsingle` by id.
  fn get_contact(
    &self,
    id: EntityId,
  ) -> impl Future<Output = Result<Option<Contact>, Self::Error>> + Send + '_;

  /// `Contact.create` with exactly the given attributes.
  fn create_contact(
    &self,
    attributes: ContactAttributes,
  ) -> impl Future<Output = Result<Contact, Self::Error>> + Send + '_;

  /// `Contact.getorcreate`, delegated to the fuzzy matcher, which decides
  /// between match and create. `None` if it returned no id.
  fn get_or_create_contact(
    &self,
    attributes: ContactAttributes,
  ) -> impl Future<Output = Result<Option<EntityId>, Self::Error>> + Send + '_;

  // ── Side effects ──────────────────────────────────────────────────────

  /// `GroupContact.create`.
  fn create_group_contact(
    &self,
    input: NewGroupContact,
  ) -> impl Future<Output = Result<GroupContact, Self::Error>> + Send + '_;

  /// `MailingEventSubscribe.create`. Starts the double-opt-in flow.
  fn create_mailing_subscription(
    &self,
    input: NewSubscription,
  ) -> impl Future<Output = Result<MailingEventSubscribe, Self::Error>> + Send + '_;

  /// `Activity.create`.
  fn create_activity(
    &self,
    input: NewActivity,
  ) -> impl Future<Output = Result<Activity, Self::Error>> + Send + '_;
}
