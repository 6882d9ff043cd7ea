//! The `AEContact.Submit` workflow: existence check → resolve → load →
//! enroll.
//!
//! The workflow is not transactional. A failure part-way through leaves every
//! call that already went through in place and reports overall failure.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  crm::CrmApi,
  enrollment::{EnrollmentEngine, SubmissionContext},
  entity::{Activity, Contact, GroupContact, MailingEventSubscribe},
  params::SubmitParams,
  resolver::{ContactResolver, MatchingStrategy},
};

/// Aggregated result of one submission.
///
/// `Contact` is always set on success. The other three are set only when the
/// corresponding side effect fired during this call; each holds the last
/// record of its kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionResult {
  #[serde(rename = "Contact")]
  pub contact:                 Option<Contact>,
  #[serde(rename = "MailingEventSubscribe")]
  pub mailing_event_subscribe: Option<MailingEventSubscribe>,
  #[serde(rename = "Activity")]
  pub activity:                Option<Activity>,
  #[serde(rename = "GroupContact")]
  pub group_contact:           Option<GroupContact>,
}

/// Runs submissions against a CRM with a fixed matching strategy.
pub struct SubmissionService<C> {
  crm:      Arc<C>,
  strategy: MatchingStrategy,
}

impl<C> Clone for SubmissionService<C> {
  fn clone(&self) -> Self {
    Self { crm: Arc::clone(&self.crm), strategy: self.strategy }
  }
}

impl<C: CrmApi> SubmissionService<C> {
  pub fn new(crm: Arc<C>, strategy: MatchingStrategy) -> Self {
    Self { crm, strategy }
  }

  pub fn strategy(&self) -> MatchingStrategy { self.strategy }

  pub fn crm(&self) -> &C { &self.crm }

  pub async fn submit(&self, params: SubmitParams) -> Result<SubmissionResult> {
    let SubmitParams { contact: attributes, groups, want_newsletter } = params;
    let contact_type = attributes
      .contact_type()
      .ok_or(Error::MissingContactType)?
      .to_owned();

    let resolver = ContactResolver::new(&*self.crm, self.strategy);

    // Evaluated on the raw attributes, before resolution may create anything.
    let contact_is_new = resolver.existence(&contact_type, &attributes).await.is_new();

    let contact_id = resolver
      .resolve(&contact_type, attributes)
      .await?
      .ok_or(Error::ContactNotResolved)?;

    let contact = self
      .crm
      .get_contact(contact_id)
      .await
      .map_err(Error::crm)?
      .ok_or(Error::ContactNotFound(contact_id))?;

    let ctx = SubmissionContext { contact_id, contact_is_new, want_newsletter };
    let outcome = EnrollmentEngine::new(&*self.crm)
      .enroll(&ctx, contact.email.as_deref(), &groups)
      .await?;

    tracing::info!(
      contact_id,
      contact_is_new,
      want_newsletter,
      requested = groups.len(),
      applied = outcome.applied,
      skipped = outcome.skipped,
      "submission processed"
    );

    Ok(SubmissionResult {
      contact:                 Some(contact),
      mailing_event_subscribe: outcome.mailing_event_subscribe,
      activity:                outcome.activity,
      group_contact:           outcome.group_contact,
    })
  }
}
