//! Error types for `lifeline-core`.
//!
//! This is the taxonomy every layer converts into before an error reaches a
//! caller: backends implement `From<TheirError> for Error` so the sync layer
//! and the HTTP API can classify failures without knowing the backend.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// No user is signed in. Fatal to any operation; forces re-login.
  #[error("not signed in")]
  Unauthenticated,

  #[error("not found: {0}")]
  NotFound(String),

  #[error("already exists: {0}")]
  AlreadyExists(String),

  /// Rejected locally, before any remote call is issued.
  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("remote failure: {0}")]
  RemoteFailure(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("failed to decode {kind} document: {source}")]
  Decode {
    kind:   &'static str,
    #[source]
    source: serde_json::Error,
  },
}

impl Error {
  /// Wrap any backend error as a [`Error::RemoteFailure`].
  pub fn remote(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::RemoteFailure(Box::new(e))
  }

  /// `true` for errors the user can act on without re-authenticating.
  pub fn is_recoverable(&self) -> bool { !matches!(self, Self::Unauthenticated) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
