//! Group enrollment: the per-request decision table and the calls it issues.
//!
//! Every request token `"<group>[:<tag>]"` is classified once into an
//! [`EnrollmentAction`]; the engine then matches on it exhaustively.
//!
//! | tag (case-insensitive) | condition                              | action        |
//! |------------------------|----------------------------------------|---------------|
//! | `Newsletter`           | `want_newsletter`                      | `PendingDoi`  |
//! | `Newsletter`           | otherwise                              | `Skip`        |
//! | `Pending`              | always                                 | `PendingDoi`  |
//! | `NewAndDoiAccepted`    | `want_newsletter && contact_is_new`    | `NewOnlyDoi`  |
//! | `NewAndDoiAccepted`    | otherwise                              | `Skip`        |
//! | anything else          | always                                 | `DirectAdd`   |

use std::{convert::Infallible, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  crm::CrmApi,
  entity::{
    Activity, EntityId, GroupContact, MailingEventSubscribe, NewActivity,
    NewGroupContact, NewSubscription,
  },
};

pub const STATUS_ADDED: &str = "Added";
pub const TAG_NEWSLETTER: &str = "Newsletter";
pub const TAG_PENDING: &str = "Pending";
pub const TAG_NEW_AND_DOI_ACCEPTED: &str = "NewAndDoiAccepted";

pub const ACTIVITY_TYPE_MAILINGLIST: &str = "Mailinglist Event";
pub const ACTIVITY_STATUS_COMPLETED: &str = "Completed";

// ─── Requests ─────────────────────────────────────────────────────────────────

/// A single `"<group_name>[:<status_tag>]"` token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEnrollmentRequest {
  pub group_name: String,
  /// Defaults to [`STATUS_ADDED`] when the token carries no (or an empty) tag.
  pub status_tag: String,
}

impl GroupEnrollmentRequest {
  /// Split on the first `:`; any further segments are dropped.
  pub fn parse(token: &str) -> Self {
    let mut parts = token.split(':');
    let group_name = parts.next().unwrap_or_default().to_owned();
    let status_tag = parts
      .next()
      .filter(|t| !t.is_empty())
      .unwrap_or(STATUS_ADDED)
      .to_owned();
    Self { group_name, status_tag }
  }
}

impl FromStr for GroupEnrollmentRequest {
  type Err = Infallible;

  fn from_str(s: &str) -> Result<Self, Self::Err> { Ok(Self::parse(s)) }
}

impl fmt::Display for GroupEnrollmentRequest {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.group_name, self.status_tag)
  }
}

// ─── Context ──────────────────────────────────────────────────────────────────

/// Per-submission facts the decision table depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionContext {
  pub contact_id:      EntityId,
  pub contact_is_new:  bool,
  pub want_newsletter: bool,
}

// ─── Classification ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentAction {
  /// No call at all for this request.
  Skip,
  /// Pending mailing subscription plus a logged activity (double opt-in).
  PendingDoi,
  /// Direct membership with status `Added`, for new contacts only.
  NewOnlyDoi,
  /// Direct membership with the given status.
  DirectAdd { status: String },
}

impl EnrollmentAction {
  pub fn classify(status_tag: &str, ctx: &SubmissionContext) -> Self {
    if status_tag.eq_ignore_ascii_case(TAG_NEWSLETTER) {
      if ctx.want_newsletter { Self::PendingDoi } else { Self::Skip }
    } else if status_tag.eq_ignore_ascii_case(TAG_PENDING) {
      Self::PendingDoi
    } else if status_tag.eq_ignore_ascii_case(TAG_NEW_AND_DOI_ACCEPTED) {
      if ctx.want_newsletter && ctx.contact_is_new {
        Self::NewOnlyDoi
      } else {
        Self::Skip
      }
    } else {
      Self::DirectAdd { status: ucfirst(status_tag) }
    }
  }
}

fn ucfirst(s: &str) -> String {
  let mut chars = s.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => STATUS_ADDED.to_owned(),
  }
}

// ─── Engine ───────────────────────────────────────────────────────────────────

/// Records produced by an enrollment run.
///
/// Only the last record of each kind is kept; when several requests trigger
/// the same kind of side effect, earlier records are not reported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrollmentOutcome {
  pub mailing_event_subscribe: Option<MailingEventSubscribe>,
  pub activity:                Option<Activity>,
  pub group_contact:           Option<GroupContact>,
  /// Number of requests that issued at least one call.
  pub applied:                 usize,
  pub skipped:                 usize,
}

pub struct EnrollmentEngine<'a, C> {
  crm: &'a C,
}

impl<'a, C: CrmApi> EnrollmentEngine<'a, C> {
  pub fn new(crm: &'a C) -> Self { Self { crm } }

  /// Apply every request in order. The first failing call aborts the run;
  /// calls that already went through are not undone.
  pub async fn enroll(
    &self,
    ctx: &SubmissionContext,
    email: Option<&str>,
    requests: &[GroupEnrollmentRequest],
  ) -> Result<EnrollmentOutcome> {
    let mut outcome = EnrollmentOutcome::default();

    for request in requests {
      let action = EnrollmentAction::classify(&request.status_tag, ctx);
      tracing::debug!(
        group = %request.group_name,
        tag = %request.status_tag,
        ?action,
        "enrollment decision"
      );

      match action {
        EnrollmentAction::Skip => {
          outcome.skipped += 1;
          continue;
        }
        EnrollmentAction::PendingDoi => {
          let group_id = self.group_id(&request.group_name).await?;
          let subscription = self
            .crm
            .create_mailing_subscription(NewSubscription {
              contact_id: ctx.contact_id,
              email: email.map(str::to_owned),
              group_id,
            })
            .await
            .map_err(Error::crm)?;
          let activity = self
            .crm
            .create_activity(NewActivity {
              source_contact_id: ctx.contact_id,
              activity_type:     ACTIVITY_TYPE_MAILINGLIST.to_owned(),
              subject:           format!("Requested: {} (DoubleOptIn sent)", request.group_name),
              status:            ACTIVITY_STATUS_COMPLETED.to_owned(),
            })
            .await
            .map_err(Error::crm)?;
          outcome.mailing_event_subscribe = Some(subscription);
          outcome.activity = Some(activity);
        }
        EnrollmentAction::NewOnlyDoi => {
          outcome.group_contact =
            Some(self.add(ctx.contact_id, &request.group_name, STATUS_ADDED.to_owned()).await?);
        }
        EnrollmentAction::DirectAdd { status } => {
          outcome.group_contact =
            Some(self.add(ctx.contact_id, &request.group_name, status).await?);
        }
      }
      outcome.applied += 1;
    }

    Ok(outcome)
  }

  async fn add(
    &self,
    contact_id: EntityId,
    group_name: &str,
    status: String,
  ) -> Result<GroupContact> {
    let group_id = self.group_id(group_name).await?;
    self
      .crm
      .create_group_contact(NewGroupContact { contact_id, group_id, status })
      .await
      .map_err(Error::crm)
  }

  async fn group_id(&self, name: &str) -> Result<EntityId> {
    self
      .crm
      .group_by_name(name.to_owned())
      .await
      .map_err(Error::crm)?
      .map(|g| g.id)
      .ok_or_else(|| Error::GroupNotFound(name.to_owned()))
  }
}
