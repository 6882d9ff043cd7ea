//! [`SandboxCrm`]: the SQLite implementation of [`CrmApi`].

use std::path::Path;

use aeapi_core::{
  ContactAttributes, CrmApi,
  crm::XCM_EXTENSION_KEY,
  entity::{
    Activity, Contact, EntityId, Group, GroupContact, MailingEventSubscribe,
    NewActivity, NewGroupContact, NewSubscription,
  },
};
use chrono::Utc;
use rusqlite::OptionalExtension as _;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{CONTACT_COLUMNS, RawContact, display_name, encode_attributes, encode_dt},
  schema::SCHEMA,
};

/// One row of the API call journal.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
  pub seq:    i64,
  pub entity: String,
  pub action: String,
  pub params: Value,
}

impl JournalEntry {
  /// `"Entity.action"`.
  pub fn api(&self) -> String { format!("{}.{}", self.entity, self.action) }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A CRM stand-in backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SandboxCrm {
  conn: tokio_rusqlite::Connection,
}

fn journal(
  conn: &rusqlite::Connection,
  entity: &str,
  action: &str,
  params: &str,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO api_journal (entity, action, params, recorded_at) VALUES (?1, ?2, ?3, ?4)",
    rusqlite::params![entity, action, params, encode_dt(Utc::now())],
  )?;
  Ok(())
}

impl SandboxCrm {
  /// Open (or create) a sandbox at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let crm = Self { conn };
    crm.init_schema().await?;
    Ok(crm)
  }

  /// Open an in-memory sandbox, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let crm = Self { conn };
    crm.init_schema().await?;
    Ok(crm)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Seeding ───────────────────────────────────────────────────────────────

  /// Enable or disable the emulated fuzzy matcher.
  pub async fn set_fuzzy_matching(&self, enabled: bool) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO civicrm_extension (full_name, is_active) VALUES (?1, ?2)
           ON CONFLICT (full_name) DO UPDATE SET is_active = excluded.is_active",
          rusqlite::params![XCM_EXTENSION_KEY, enabled],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn add_country(&self, iso_code: &str, id: EntityId) -> Result<()> {
    let iso_code = iso_code.to_owned();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO civicrm_country (id, iso_code) VALUES (?1, ?2)",
          rusqlite::params![id, iso_code],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Create a group unless one with `name` exists; returns it either way.
  pub async fn ensure_group(&self, name: &str) -> Result<Group> {
    let name = name.to_owned();
    let group = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO civicrm_group (name, title) VALUES (?1, ?1)",
          rusqlite::params![name],
        )?;
        Ok(conn.query_row(
          "SELECT id, name, title FROM civicrm_group WHERE name = ?1",
          rusqlite::params![name],
          |row| {
            Ok(Group { id: row.get(0)?, name: row.get(1)?, title: row.get(2)? })
          },
        )?)
      })
      .await?;
    Ok(group)
  }

  // ── Inspection ────────────────────────────────────────────────────────────

  /// Every API call made so far, oldest first.
  pub async fn journal(&self) -> Result<Vec<JournalEntry>> {
    let rows: Vec<(i64, String, String, String)> = self
      .conn
      .call(|conn| {
        let mut stmt = conn
          .prepare("SELECT seq, entity, action, params FROM api_journal ORDER BY seq")?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(seq, entity, action, params)| {
        Ok(JournalEntry { seq, entity, action, params: serde_json::from_str(&params)? })
      })
      .collect()
  }

  /// Current memberships of a contact, with their status.
  pub async fn group_contacts(&self, contact_id: EntityId) -> Result<Vec<GroupContact>> {
    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, contact_id, group_id, status FROM civicrm_group_contact
           WHERE contact_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![contact_id], |row| {
            Ok(GroupContact {
              id:         row.get(0)?,
              contact_id: row.get(1)?,
              group_id:   row.get(2)?,
              status:     row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  pub async fn contact_count(&self) -> Result<i64> {
    let n = self
      .conn
      .call(|conn| {
        Ok(conn.query_row("SELECT COUNT(*) FROM civicrm_contact", [], |r| r.get(0))?)
      })
      .await?;
    Ok(n)
  }

  // ── Helpers ───────────────────────────────────────────────────────────────

  /// Journal the call and load every contact of `contact_type` (all types if
  /// `None`).
  async fn load_contacts(
    &self,
    action: &'static str,
    params: String,
    contact_type: Option<String>,
  ) -> Result<Vec<RawContact>> {
    let rows = self
      .conn
      .call(move |conn| {
        journal(conn, "Contact", action, &params)?;
        let sql = format!(
          "SELECT {CONTACT_COLUMNS} FROM civicrm_contact
           WHERE (?1 IS NULL OR contact_type = ?1) ORDER BY id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![contact_type], RawContact::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  /// Ids of contacts whose stored attributes contain every queried one.
  ///
  /// Keys are compared literally. A raw `country` code never matches, since
  /// stored contacts only carry `country_id`.
  async fn matching_ids(
    &self,
    action: &'static str,
    attributes: &ContactAttributes,
  ) -> Result<Vec<EntityId>> {
    let contact_type = attributes.contact_type().map(str::to_owned);

    let rows = self
      .load_contacts(action, encode_attributes(attributes)?, contact_type)
      .await?;

    let mut ids = Vec::new();
    for row in rows {
      if attributes.is_subset_of(&row.attributes()?) {
        ids.push(row.id);
      }
    }
    Ok(ids)
  }

  /// Journal a call that is rejected before it reaches any table.
  async fn record(&self, entity: &'static str, action: &'static str, params: String) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        journal(conn, entity, action, &params)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn insert_contact(&self, attributes: ContactAttributes) -> Result<Contact> {
    let encoded = encode_attributes(&attributes)?;
    let Some(contact_type) = attributes.contact_type().map(str::to_owned) else {
      self.record("Contact", "create", encoded).await?;
      return Err(Error::Api("Mandatory key(s) missing from params array: contact_type".into()));
    };
    let email = attributes.email().map(str::to_owned);
    let display = display_name(&attributes);
    let created = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        journal(conn, "Contact", "create", &encoded)?;
        let id: EntityId = conn.query_row(
          "INSERT INTO civicrm_contact
             (contact_type, display_name, email, attributes, created_date)
           VALUES (?1, ?2, ?3, ?4, ?5) RETURNING id",
          rusqlite::params![contact_type, display, email, encoded, created],
          |row| row.get(0),
        )?;
        Ok(conn.query_row(
          &format!("SELECT {CONTACT_COLUMNS} FROM civicrm_contact WHERE id = ?1"),
          rusqlite::params![id],
          RawContact::from_row,
        )?)
      })
      .await?;

    tracing::debug!(contact_id = raw.id, "sandbox created contact");
    raw.into_contact()
  }

  async fn xcm_enabled(&self) -> Result<bool> {
    let enabled = self
      .conn
      .call(|conn| {
        Ok(
          conn
            .query_row(
              "SELECT is_active FROM civicrm_extension WHERE full_name = ?1",
              rusqlite::params![XCM_EXTENSION_KEY],
              |row| row.get::<_, bool>(0),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(enabled)
  }
}

// ─── CrmApi impl ─────────────────────────────────────────────────────────────

impl CrmApi for SandboxCrm {
  type Error = Error;

  async fn country_by_iso_code(&self, iso_code: String) -> Result<Option<EntityId>> {
    let params = json!({ "iso_code": iso_code }).to_string();
    let id = self
      .conn
      .call(move |conn| {
        journal(conn, "Country", "get", &params)?;
        Ok(
          conn
            .query_row(
              "SELECT id FROM civicrm_country WHERE iso_code = ?1",
              rusqlite::params![iso_code],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(id)
  }

  async fn group_by_name(&self, name: String) -> Result<Option<Group>> {
    let params = json!({ "name": name, "return": "id" }).to_string();
    let group = self
      .conn
      .call(move |conn| {
        journal(conn, "Group", "getsingle", &params)?;
        Ok(
          conn
            .query_row(
              "SELECT id, name, title FROM civicrm_group WHERE name = ?1",
              rusqlite::params![name],
              |row| {
                Ok(Group { id: row.get(0)?, name: row.get(1)?, title: row.get(2)? })
              },
            )
            .optional()?,
        )
      })
      .await?;
    Ok(group)
  }

  async fn extension_installed(&self, key: String) -> Result<bool> {
    let params = json!({ "full_name": key }).to_string();
    let active = self
      .conn
      .call(move |conn| {
        journal(conn, "Extension", "get", &params)?;
        Ok(
          conn
            .query_row(
              "SELECT is_active FROM civicrm_extension WHERE full_name = ?1",
              rusqlite::params![key],
              |row| row.get::<_, bool>(0),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(active)
  }

  async fn find_contacts(&self, attributes: ContactAttributes) -> Result<Vec<EntityId>> {
    self.matching_ids("get", &attributes).await
  }

  async fn get_single_contact(&self, attributes: ContactAttributes) -> Result<Option<EntityId>> {
    let ids = self.matching_ids("getsingle", &attributes).await?;
    match ids.as_slice() {
      [] => Ok(None),
      [id] => Ok(Some(*id)),
      many => Err(Error::Api(format!("Expected one Contact but found {}", many.len()))),
    }
  }

  async fn get_contact(&self, id: EntityId) -> Result<Option<Contact>> {
    let params = json!({ "id": id }).to_string();
    let raw = self
      .conn
      .call(move |conn| {
        journal(conn, "Contact", "getsingle", &params)?;
        Ok(
          conn
            .query_row(
              &format!("SELECT {CONTACT_COLUMNS} FROM civicrm_contact WHERE id = ?1"),
              rusqlite::params![id],
              RawContact::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawContact::into_contact).transpose()
  }

  async fn create_contact(&self, attributes: ContactAttributes) -> Result<Contact> {
    self.insert_contact(attributes).await
  }

  async fn get_or_create_contact(&self, attributes: ContactAttributes) -> Result<Option<EntityId>> {
    if !self.xcm_enabled().await? {
      self.record("Contact", "getorcreate", encode_attributes(&attributes)?).await?;
      return Err(Error::Api("API (Contact, getorcreate) does not exist".into()));
    }

    let contact_type = attributes.contact_type().map(str::to_owned);
    let rows = self
      .load_contacts("getorcreate", encode_attributes(&attributes)?, contact_type)
      .await?;

    let matched = attributes.email().and_then(|email| {
      rows
        .iter()
        .find(|r| r.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(email)))
        .map(|r| r.id)
    });

    match matched {
      Some(id) => Ok(Some(id)),
      None => Ok(Some(self.insert_contact(attributes).await?.id)),
    }
  }

  async fn create_group_contact(&self, input: NewGroupContact) -> Result<GroupContact> {
    let params = json!({
      "contact_id": input.contact_id,
      "group_id":   input.group_id,
      "status":     input.status,
    })
    .to_string();

    let record = self
      .conn
      .call(move |conn| {
        journal(conn, "GroupContact", "create", &params)?;
        let id: EntityId = conn.query_row(
          "INSERT INTO civicrm_group_contact (contact_id, group_id, status)
           VALUES (?1, ?2, ?3)
           ON CONFLICT (contact_id, group_id) DO UPDATE SET status = excluded.status
           RETURNING id",
          rusqlite::params![input.contact_id, input.group_id, input.status],
          |row| row.get(0),
        )?;
        Ok(GroupContact {
          id,
          contact_id: input.contact_id,
          group_id:   input.group_id,
          status:     input.status,
        })
      })
      .await?;
    Ok(record)
  }

  async fn create_mailing_subscription(
    &self,
    input: NewSubscription,
  ) -> Result<MailingEventSubscribe> {
    let params = json!({
      "contact_id": input.contact_id,
      "email":      input.email,
      "group_id":   input.group_id,
    })
    .to_string();

    let Some(email) = input.email.filter(|e| !e.is_empty()) else {
      self.record("MailingEventSubscribe", "create", params).await?;
      return Err(Error::Api("Mandatory key(s) missing from params array: email".into()));
    };
    let hash = Uuid::new_v4().simple().to_string();
    let now = encode_dt(Utc::now());
    let (contact_id, group_id) = (input.contact_id, input.group_id);

    let record = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        journal(&tx, "MailingEventSubscribe", "create", &params)?;
        let id: EntityId = tx.query_row(
          "INSERT INTO civicrm_subscription_event (contact_id, group_id, email, hash, time_stamp)
           VALUES (?1, ?2, ?3, ?4, ?5) RETURNING id",
          rusqlite::params![contact_id, group_id, email, hash, now],
          |row| row.get(0),
        )?;
        // The membership stays pending until the opt-in is confirmed.
        tx.execute(
          "INSERT OR IGNORE INTO civicrm_group_contact (contact_id, group_id, status)
           VALUES (?1, ?2, 'Pending')",
          rusqlite::params![contact_id, group_id],
        )?;
        tx.commit()?;
        Ok(MailingEventSubscribe {
          id,
          contact_id,
          group_id,
          email: Some(email),
          hash: Some(hash),
        })
      })
      .await?;
    Ok(record)
  }

  async fn create_activity(&self, input: NewActivity) -> Result<Activity> {
    let params = json!({
      "source_contact_id": input.source_contact_id,
      "activity_type_id":  input.activity_type,
      "subject":           input.subject,
      "status_id":         input.status,
    })
    .to_string();
    let now = encode_dt(Utc::now());

    let record = self
      .conn
      .call(move |conn| {
        journal(conn, "Activity", "create", &params)?;
        let id: EntityId = conn.query_row(
          "INSERT INTO civicrm_activity
             (source_contact_id, activity_type, subject, status, activity_date_time)
           VALUES (?1, ?2, ?3, ?4, ?5) RETURNING id",
          rusqlite::params![
            input.source_contact_id,
            input.activity_type,
            input.subject,
            input.status,
            now,
          ],
          |row| row.get(0),
        )?;
        Ok(Activity {
          id,
          source_contact_id: input.source_contact_id,
          activity_type:     input.activity_type,
          subject:           input.subject,
          status:            input.status,
        })
      })
      .await?;
    Ok(record)
  }
}
