//! The `Remote` trait: the backend capabilities the sync layer consumes.
//!
//! Implemented by `lifeline-store-sqlite` (in process) and by the HTTP client
//! in `lifeline-cli`. Every call names the acting user explicitly; there is
//! no ambient session inside a backend.
//!
//! Relationship calls follow one contract across implementations:
//! `add_contact_relation` creates both edges atomically, the reverse edge
//! carrying [`Roles::mirrored`]; role updates and deletes apply to both edges;
//! ping calls set or clear the flag on both edges. All write calls are
//! idempotent.

use std::future::Future;

use futures::Stream;
use uuid::Uuid;

use crate::{
  contact::{Contact, Roles},
  user::{PeerProfile, User, UserPatch},
};

/// Abstraction over the remote source of truth.
///
/// All methods return `Send` futures so the trait can be driven from
/// spawned tokio tasks. Streams are infinite: they yield the current value
/// first and then one item per remote change, in server order.
pub trait Remote: Send + Sync {
  type Error: std::error::Error + Into<crate::Error> + Send + Sync + 'static;

  // ── Self record ───────────────────────────────────────────────────────

  fn load_user(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  /// Apply a partial update. The store stamps `last_updated`.
  fn update_user(
    &self,
    user_id: Uuid,
    patch: UserPatch,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn stream_user(
    &self,
    user_id: Uuid,
  ) -> impl Stream<Item = Result<User, Self::Error>> + Send + 'static;

  // ── Contacts ──────────────────────────────────────────────────────────

  fn load_contacts(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Contact>, Self::Error>> + Send + '_;

  fn stream_contacts(
    &self,
    user_id: Uuid,
  ) -> impl Stream<Item = Result<Vec<Contact>, Self::Error>> + Send + 'static;

  /// Resolve a QR code. `None` if no user owns it.
  fn lookup_user_by_code(
    &self,
    qr_code: Uuid,
  ) -> impl Future<Output = Result<Option<PeerProfile>, Self::Error>> + Send + '_;

  /// Fails with an error classified as `AlreadyExists` if `user_id` already
  /// has an edge to `peer_id`.
  fn add_contact_relation(
    &self,
    user_id: Uuid,
    peer_id: Uuid,
    roles: Roles,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn update_contact_roles(
    &self,
    user_id: Uuid,
    peer_id: Uuid,
    roles: Roles,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn delete_contact_relation(
    &self,
    user_id: Uuid,
    peer_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Pings ─────────────────────────────────────────────────────────────

  /// Requires `user_id`'s edge to `peer_id` to carry the dependent role.
  fn ping_dependent(
    &self,
    user_id: Uuid,
    peer_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Sender-side cancel of an outgoing ping.
  fn clear_ping(
    &self,
    user_id: Uuid,
    peer_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Receiver-side answer to an incoming ping.
  fn respond_to_ping(
    &self,
    user_id: Uuid,
    peer_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn respond_to_all_pings(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
