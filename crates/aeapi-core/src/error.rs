//! Error types for `aeapi-core`.

use thiserror::Error;

use crate::entity::EntityId;

#[derive(Debug, Error)]
pub enum Error {
  #[error("Could not parse parameter {0}.")]
  InputParse(&'static str),

  #[error("Mandatory parameter {0} missing.")]
  MissingParameter(&'static str),

  #[error("Parameter {0} is not a valid boolean.")]
  InvalidBoolean(&'static str),

  #[error("Parameter contact must contain contact_type.")]
  MissingContactType,

  #[error("Unknown country {code}.")]
  InvalidFormat { code: String },

  #[error("Group {0} not found.")]
  GroupNotFound(String),

  #[error("Contact {0} not found.")]
  ContactNotFound(EntityId),

  #[error("Could not find or create a contact for the submitted data.")]
  ContactNotResolved,

  /// Any failure raised by the CRM collaborator, passed through untouched.
  #[error("{0}")]
  Crm(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Coarse classification of an [`Error`], used by the HTTP layer to pick a
/// status code. The caller-visible contract is the message text alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  InputParse,
  InvalidFormat,
  NotFound,
  Crm,
}

impl Error {
  pub fn crm<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Crm(Box::new(e))
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::InputParse(_)
      | Self::MissingParameter(_)
      | Self::InvalidBoolean(_)
      | Self::MissingContactType => ErrorKind::InputParse,
      Self::InvalidFormat { .. } => ErrorKind::InvalidFormat,
      Self::GroupNotFound(_)
      | Self::ContactNotFound(_)
      | Self::ContactNotResolved => ErrorKind::NotFound,
      Self::Crm(_) => ErrorKind::Crm,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
