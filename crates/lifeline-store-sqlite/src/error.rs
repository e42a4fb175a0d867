//! Error type for `lifeline-store-sqlite`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] lifeline_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("user not found: {0}")]
  UserNotFound(Uuid),

  #[error("user {owner} has no contact {peer}")]
  ContactNotFound { owner: Uuid, peer: Uuid },

  #[error("user {owner} already has contact {peer}")]
  ContactExists { owner: Uuid, peer: Uuid },

  #[error("a user cannot add themselves as a contact")]
  SelfRelation,

  #[error("contact {peer} is not a dependent of {owner}")]
  NotDependent { owner: Uuid, peer: Uuid },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for lifeline_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(inner) => inner,
      Error::UserNotFound(_) | Error::ContactNotFound { .. } => Self::NotFound(e.to_string()),
      Error::ContactExists { .. } => Self::AlreadyExists(e.to_string()),
      Error::SelfRelation | Error::NotDependent { .. } => Self::InvalidInput(e.to_string()),
      other => Self::remote(other),
    }
  }
}
