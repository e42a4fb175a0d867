//! Authentication capability.
//!
//! Sign-in itself (phone verification, device binding) lives outside this
//! workspace. The sync layer only needs the current user id and a way to
//! hear about changes to it.

use futures::Stream;
use uuid::Uuid;

pub trait Auth: Send + Sync {
  fn current_user_id(&self) -> Option<Uuid>;

  fn sign_out(&self);

  /// Yields the current state first, then every change.
  fn auth_changes(&self) -> impl Stream<Item = Option<Uuid>> + Send + 'static;
}
