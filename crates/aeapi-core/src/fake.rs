//! In-memory recording [`CrmApi`] used by the unit tests of this crate.

use std::{
  collections::HashMap,
  sync::{Mutex, MutexGuard},
};

use serde_json::{Value, json};

use crate::{
  attributes::ContactAttributes,
  crm::CrmApi,
  entity::{
    Activity, Contact, EntityId, Group, GroupContact, MailingEventSubscribe,
    NewActivity, NewGroupContact, NewSubscription,
  },
};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct FakeError(pub String);

/// One recorded API call: `"Entity.action"` plus its parameters.
#[derive(Debug, Clone)]
pub struct Call {
  pub api:    &'static str,
  pub params: Value,
}

#[derive(Default)]
struct State {
  next_id:           EntityId,
  calls:             Vec<Call>,
  countries:         HashMap<String, EntityId>,
  groups:            HashMap<String, Group>,
  contacts:          Vec<(Contact, ContactAttributes)>,
  xcm_installed:     bool,
  xcm_returns_none:  bool,
  fail_find:         bool,
}

#[derive(Default)]
pub struct FakeCrm {
  state: Mutex<State>,
}

impl FakeCrm {
  pub fn new() -> Self {
    let crm = Self::default();
    crm.lock().next_id = 100;
    crm
  }

  fn lock(&self) -> MutexGuard<'_, State> { self.state.lock().unwrap() }

  pub fn with_country(self, iso: &str, id: EntityId) -> Self {
    self.lock().countries.insert(iso.to_owned(), id);
    self
  }

  pub fn with_group(self, name: &str) -> Self {
    {
      let mut s = self.lock();
      s.next_id += 1;
      let group = Group { id: s.next_id, name: name.to_owned(), title: None };
      s.groups.insert(name.to_owned(), group);
    }
    self
  }

  pub fn with_xcm(self) -> Self {
    self.lock().xcm_installed = true;
    self
  }

  /// Make `Contact.getorcreate` answer without an id.
  pub fn with_xcm_returning_none(self) -> Self {
    self.lock().xcm_returns_none = true;
    self
  }

  /// Make the plain `Contact.get` lookup fail.
  pub fn with_failing_find(self) -> Self {
    self.lock().fail_find = true;
    self
  }

  /// Seed a contact without recording a call.
  pub fn with_contact(self, attributes: Value) -> Self {
    let attributes: ContactAttributes = serde_json::from_value(attributes).unwrap();
    {
      let mut s = self.lock();
      insert_contact(&mut s, attributes);
    }
    self
  }

  pub fn calls(&self) -> Vec<Call> { self.lock().calls.clone() }

  pub fn apis(&self) -> Vec<&'static str> {
    self.lock().calls.iter().map(|c| c.api).collect()
  }

  pub fn count(&self, api: &str) -> usize {
    self.lock().calls.iter().filter(|c| c.api == api).count()
  }

  pub fn contact_count(&self) -> usize { self.lock().contacts.len() }

  fn record(&self, api: &'static str, params: Value) -> MutexGuard<'_, State> {
    let mut s = self.lock();
    s.calls.push(Call { api, params });
    s
  }
}

fn insert_contact(s: &mut State, attributes: ContactAttributes) -> Contact {
  s.next_id += 1;
  let contact = Contact {
    id:           s.next_id,
    contact_type: attributes.contact_type().unwrap_or("Individual").to_owned(),
    display_name: None,
    email:        attributes.email().map(str::to_owned),
    extra:        Default::default(),
  };
  s.contacts.push((contact.clone(), attributes));
  contact
}

fn matches(s: &State, attributes: &ContactAttributes) -> Vec<EntityId> {
  s.contacts
    .iter()
    .filter(|(_, stored)| attributes.is_subset_of(stored))
    .map(|(c, _)| c.id)
    .collect()
}

impl CrmApi for FakeCrm {
  type Error = FakeError;

  async fn country_by_iso_code(&self, iso_code: String) -> Result<Option<EntityId>, FakeError> {
    let s = self.record("Country.get", json!({ "iso_code": iso_code }));
    Ok(s.countries.get(&iso_code).copied())
  }

  async fn group_by_name(&self, name: String) -> Result<Option<Group>, FakeError> {
    let s = self.record("Group.getsingle", json!({ "name": name }));
    Ok(s.groups.get(&name).cloned())
  }

  async fn extension_installed(&self, key: String) -> Result<bool, FakeError> {
    let s = self.record("Extension.get", json!({ "key": key }));
    Ok(s.xcm_installed)
  }

  async fn find_contacts(&self, attributes: ContactAttributes) -> Result<Vec<EntityId>, FakeError> {
    let s = self.record("Contact.get", Value::Object(attributes.as_map().clone()));
    if s.fail_find {
      return Err(FakeError("lookup failed".into()));
    }
    Ok(matches(&s, &attributes))
  }

  async fn get_single_contact(&self, attributes: ContactAttributes) -> Result<Option<EntityId>, FakeError> {
    let s = self.record("Contact.getsingle", Value::Object(attributes.as_map().clone()));
    match matches(&s, &attributes).as_slice() {
      [] => Ok(None),
      [id] => Ok(Some(*id)),
      many => Err(FakeError(format!("Expected one Contact but found {}", many.len()))),
    }
  }

  async fn get_contact(&self, id: EntityId) -> Result<Option<Contact>, FakeError> {
    let s = self.record("Contact.getsingle", json!({ "id": id }));
    Ok(s.contacts.iter().find(|(c, _)| c.id == id).map(|(c, _)| c.clone()))
  }

  async fn create_contact(&self, attributes: ContactAttributes) -> Result<Contact, FakeError> {
    let mut s = self.record("Contact.create", Value::Object(attributes.as_map().clone()));
    Ok(insert_contact(&mut s, attributes))
  }

  async fn get_or_create_contact(&self, attributes: ContactAttributes) -> Result<Option<EntityId>, FakeError> {
    let mut s = self.record("Contact.getorcreate", Value::Object(attributes.as_map().clone()));
    if s.xcm_returns_none {
      return Ok(None);
    }
    let by_email = attributes.email().and_then(|email| {
      s.contacts
        .iter()
        .find(|(c, _)| c.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(email)))
        .map(|(c, _)| c.id)
    });
    Ok(Some(match by_email {
      Some(id) => id,
      None => insert_contact(&mut s, attributes).id,
    }))
  }

  async fn create_group_contact(&self, input: NewGroupContact) -> Result<GroupContact, FakeError> {
    let mut s = self.record(
      "GroupContact.create",
      json!({ "contact_id": input.contact_id, "group_id": input.group_id, "status": input.status }),
    );
    s.next_id += 1;
    Ok(GroupContact {
      id:         s.next_id,
      contact_id: input.contact_id,
      group_id:   input.group_id,
      status:     input.status,
    })
  }

  async fn create_mailing_subscription(&self, input: NewSubscription) -> Result<MailingEventSubscribe, FakeError> {
    let mut s = self.record(
      "MailingEventSubscribe.create",
      json!({ "contact_id": input.contact_id, "email": input.email, "group_id": input.group_id }),
    );
    s.next_id += 1;
    Ok(MailingEventSubscribe {
      id:         s.next_id,
      contact_id: input.contact_id,
      group_id:   input.group_id,
      email:      input.email,
      hash:       None,
    })
  }

  async fn create_activity(&self, input: NewActivity) -> Result<Activity, FakeError> {
    let mut s = self.record(
      "Activity.create",
      json!({
        "source_contact_id": input.source_contact_id,
        "activity_type_id":  input.activity_type,
        "subject":           input.subject,
        "status_id":         input.status,
      }),
    );
    s.next_id += 1;
    Ok(Activity {
      id:                s.next_id,
      source_contact_id: input.source_contact_id,
      activity_type:     input.activity_type,
      subject:           input.subject,
      status:            input.status,
    })
  }
}
