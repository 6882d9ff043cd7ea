//! Contact resolution: find-or-create a contact from submitted attributes.
//!
//! Two separate steps live here:
//!
//! * [`ContactResolver::existence`]: a plain, exact lookup answering "is this
//!   contact new?". It runs before resolution and never consults the fuzzy
//!   matcher.
//! * [`ContactResolver::resolve`]: normalizes the country and then either
//!   delegates to the fuzzy matcher or falls back to exact lookup plus create,
//!   depending on the injected [`MatchingStrategy`].
//!
//! The two may disagree: the fuzzy matcher can find a contact the exact check
//! missed, in which case the submission treats an existing contact as new.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
  Error, Result,
  attributes::{COUNTRY, COUNTRY_ID, ContactAttributes, is_empty_value, is_numeric_value},
  crm::{CrmApi, XCM_EXTENSION_KEY},
  entity::EntityId,
};

// ─── Strategy ─────────────────────────────────────────────────────────────────

/// Which deduplication backend resolves contacts. Chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingStrategy {
  /// The CRM's extended contact matcher owns match-vs-create.
  #[default]
  Fuzzy,
  /// Degraded mode: exact `getsingle`, create on miss.
  ExactOrCreate,
}

impl MatchingStrategy {
  /// Probe the CRM for the fuzzy matcher extension.
  pub async fn detect<C: CrmApi>(crm: &C) -> Result<Self> {
    let installed = crm
      .extension_installed(XCM_EXTENSION_KEY.to_owned())
      .await
      .map_err(Error::crm)?;
    Ok(if installed { Self::Fuzzy } else { Self::ExactOrCreate })
  }
}

// ─── Existence ────────────────────────────────────────────────────────────────

/// Outcome of the exact-match existence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existence {
  Found,
  Absent,
  /// The lookup itself failed.
  Unknown,
}

impl Existence {
  /// Fail-open: an unknown outcome counts as new.
  pub fn is_new(self) -> bool { !matches!(self, Self::Found) }
}

// ─── Resolver ─────────────────────────────────────────────────────────────────

pub struct ContactResolver<'a, C> {
  crm:      &'a C,
  strategy: MatchingStrategy,
}

impl<'a, C: CrmApi> ContactResolver<'a, C> {
  pub fn new(crm: &'a C, strategy: MatchingStrategy) -> Self {
    Self { crm, strategy }
  }

  pub fn strategy(&self) -> MatchingStrategy { self.strategy }

  /// Check whether a contact with exactly these attributes already exists.
  pub async fn existence(
    &self,
    contact_type: &str,
    attributes: &ContactAttributes,
  ) -> Existence {
    let query = attributes.clone().with_contact_type(contact_type);
    match self.crm.find_contacts(query).await {
      Ok(ids) if ids.is_empty() => Existence::Absent,
      Ok(_) => Existence::Found,
      Err(e) => {
        tracing::warn!(error = %e, "existence lookup failed, treating contact as new");
        Existence::Unknown
      }
    }
  }

  /// Return the id of the matching or newly created contact.
  ///
  /// Returns `Ok(None)` for an empty attribute map (without calling the CRM)
  /// and when the fuzzy matcher answers without an id.
  pub async fn resolve(
    &self,
    contact_type: &str,
    mut attributes: ContactAttributes,
  ) -> Result<Option<EntityId>> {
    if attributes.is_empty() {
      return Ok(None);
    }

    self.normalize_country(&mut attributes).await?;
    let attributes = attributes.with_contact_type(contact_type);

    match self.strategy {
      MatchingStrategy::Fuzzy => {
        let id = self
          .crm
          .get_or_create_contact(attributes)
          .await
          .map_err(Error::crm)?;
        if id.is_none() {
          tracing::warn!("fuzzy matcher returned no contact id");
        }
        Ok(id)
      }
      MatchingStrategy::ExactOrCreate => {
        let existing = self
          .crm
          .get_single_contact(attributes.clone())
          .await
          .map_err(Error::crm)?;
        if let Some(id) = existing {
          return Ok(Some(id));
        }
        let created = self
          .crm
          .create_contact(attributes)
          .await
          .map_err(Error::crm)?;
        tracing::debug!(contact_id = created.id, "created contact (exact-match fallback)");
        Ok(Some(created.id))
      }
    }
  }

  /// Replace a non-empty `country` attribute by `country_id`.
  ///
  /// Numeric values are moved over unchanged; anything else is looked up as
  /// an ISO code and must be known.
  pub async fn normalize_country(&self, attributes: &mut ContactAttributes) -> Result<()> {
    let Some(country) = attributes.get(COUNTRY).filter(|v| !is_empty_value(v)).cloned() else {
      return Ok(());
    };

    let country_id: Value = if is_numeric_value(&country) {
      country
    } else {
      let code = match &country {
        Value::String(s) => s.clone(),
        other => other.to_string(),
      };
      let id = self
        .crm
        .country_by_iso_code(code.clone())
        .await
        .map_err(Error::crm)?
        .ok_or(Error::InvalidFormat { code })?;
      Value::from(id)
    };

    attributes.remove(COUNTRY);
    attributes.insert(COUNTRY_ID, country_id);
    Ok(())
  }
}
