//! Integration tests for `SqliteStore` against an in-memory database.

use std::time::Duration;

use chrono::Utc;
use futures::StreamExt as _;
use lifeline_core::{
  contact::{Contact, Roles},
  interval::CheckInInterval,
  remote::Remote,
  user::{NewUser, User, UserPatch},
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn user(s: &SqliteStore, name: &str) -> User {
  s.create_user(NewUser::new(name)).await.unwrap()
}

/// `a` adds `b` with `roles` from `a`'s point of view.
async fn pair(s: &SqliteStore, roles: Roles) -> (User, User) {
  let a = user(s, "Ada").await;
  let b = user(s, "Brendan").await;
  s.add_contact_relation(a.user_id, b.user_id, roles).await.unwrap();
  (a, b)
}

async fn edge(s: &SqliteStore, owner: Uuid, peer: Uuid) -> Option<Contact> {
  s.load_contacts(owner)
    .await
    .unwrap()
    .into_iter()
    .find(|c| c.peer_id == peer)
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_load_user() {
  let s = store().await;
  let created = user(&s, "Ada").await;

  let loaded = s.load_user(created.user_id).await.unwrap();
  assert_eq!(loaded.name, "Ada");
  assert_eq!(loaded.qr_code_id, created.qr_code_id);
  assert_eq!(loaded.check_in_interval, CheckInInterval::default());
  assert!(loaded.profile_complete);
  assert!(!loaded.manual_alert_active);
}

#[tokio::test]
async fn load_missing_user_is_not_found() {
  let s = store().await;
  let err = s.load_user(Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(err, Error::UserNotFound(_)));
  assert!(matches!(lifeline_core::Error::from(err), lifeline_core::Error::NotFound(_)));
}

#[tokio::test]
async fn update_user_touches_only_patched_fields() {
  let s = store().await;
  let u = user(&s, "Ada").await;

  let interval = CheckInInterval::from_hours(8).unwrap();
  let updated = s.update_user(u.user_id, UserPatch::interval(interval)).await.unwrap();
  assert_eq!(updated.check_in_interval, interval);
  assert_eq!(updated.name, "Ada");
  assert_eq!(updated.last_checked_in, u.last_checked_in);
  assert!(updated.last_updated >= u.last_updated);

  let patch = UserPatch { note: Some("allergic to penicillin".into()), ..UserPatch::default() };
  let updated = s.update_user(u.user_id, patch).await.unwrap();
  assert_eq!(updated.note, "allergic to penicillin");
  assert_eq!(updated.check_in_interval, interval);
}

#[tokio::test]
async fn update_missing_user_fails() {
  let s = store().await;
  let err = s
    .update_user(Uuid::new_v4(), UserPatch::check_in(Utc::now()))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::UserNotFound(_)));
}

#[tokio::test]
async fn manual_alert_set_and_cleared() {
  let s = store().await;
  let u = user(&s, "Ada").await;
  let at = Utc::now();

  let on = s.update_user(u.user_id, UserPatch::manual_alert(true, at)).await.unwrap();
  assert!(on.manual_alert_active);
  assert!(on.manual_alert_at.is_some());

  let off = s.update_user(u.user_id, UserPatch::manual_alert(false, at)).await.unwrap();
  assert!(!off.manual_alert_active);
  assert_eq!(off.manual_alert_at, None);
}

// ─── Lookup ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn lookup_by_code() {
  let s = store().await;
  let u = user(&s, "Ada").await;

  let found = s.lookup_user_by_code(u.qr_code_id).await.unwrap().unwrap();
  assert_eq!(found.user_id, u.user_id);
  assert_eq!(found.name, "Ada");

  assert!(s.lookup_user_by_code(Uuid::new_v4()).await.unwrap().is_none());
}

// ─── Relationships ───────────────────────────────────────────────────────────

#[tokio::test]
async fn add_creates_mirrored_edges() {
  let s = store().await;
  let (a, b) = pair(&s, Roles::RESPONDER).await;

  let ab = edge(&s, a.user_id, b.user_id).await.unwrap();
  assert!(ab.is_responder() && !ab.is_dependent());
  assert_eq!(ab.name, "Brendan");
  assert_eq!(ab.last_checked_in, Some(b.last_checked_in));

  let ba = edge(&s, b.user_id, a.user_id).await.unwrap();
  assert!(ba.is_dependent() && !ba.is_responder());
}

#[tokio::test]
async fn add_duplicate_is_already_exists() {
  let s = store().await;
  let (a, b) = pair(&s, Roles::BOTH).await;

  let err = s
    .add_contact_relation(a.user_id, b.user_id, Roles::RESPONDER)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::ContactExists { .. }));
  assert!(matches!(
    lifeline_core::Error::from(err),
    lifeline_core::Error::AlreadyExists(_)
  ));
}

#[tokio::test]
async fn add_self_or_unknown_is_rejected() {
  let s = store().await;
  let a = user(&s, "Ada").await;

  let err = s.add_contact_relation(a.user_id, a.user_id, Roles::BOTH).await.unwrap_err();
  assert!(matches!(err, Error::SelfRelation));

  let ghost = Uuid::new_v4();
  let err = s.add_contact_relation(a.user_id, ghost, Roles::BOTH).await.unwrap_err();
  assert!(matches!(err, Error::UserNotFound(id) if id == ghost));
}

#[tokio::test]
async fn update_roles_updates_both_edges() {
  let s = store().await;
  let (a, b) = pair(&s, Roles::RESPONDER).await;

  s.update_contact_roles(a.user_id, b.user_id, Roles::BOTH).await.unwrap();
  assert_eq!(edge(&s, a.user_id, b.user_id).await.unwrap().roles, Roles::BOTH);
  assert_eq!(edge(&s, b.user_id, a.user_id).await.unwrap().roles, Roles::BOTH);

  s.update_contact_roles(a.user_id, b.user_id, Roles::DEPENDENT).await.unwrap();
  assert_eq!(edge(&s, b.user_id, a.user_id).await.unwrap().roles, Roles::RESPONDER);
}

#[tokio::test]
async fn update_roles_on_missing_edge_fails() {
  let s = store().await;
  let a = user(&s, "Ada").await;
  let b = user(&s, "Brendan").await;
  let err = s
    .update_contact_roles(a.user_id, b.user_id, Roles::BOTH)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::ContactNotFound { .. }));
}

#[tokio::test]
async fn dropping_dependent_role_clears_its_ping() {
  let s = store().await;
  let (a, b) = pair(&s, Roles::BOTH).await;
  s.ping_dependent(a.user_id, b.user_id).await.unwrap();

  s.update_contact_roles(a.user_id, b.user_id, Roles::RESPONDER).await.unwrap();
  assert!(!edge(&s, a.user_id, b.user_id).await.unwrap().has_outgoing_ping);
  assert!(!edge(&s, b.user_id, a.user_id).await.unwrap().has_incoming_ping);
}

#[tokio::test]
async fn delete_removes_both_edges_and_is_idempotent() {
  let s = store().await;
  let (a, b) = pair(&s, Roles::BOTH).await;

  s.delete_contact_relation(a.user_id, b.user_id).await.unwrap();
  assert!(s.load_contacts(a.user_id).await.unwrap().is_empty());
  assert!(s.load_contacts(b.user_id).await.unwrap().is_empty());

  s.delete_contact_relation(a.user_id, b.user_id).await.unwrap();
}

// ─── Pings ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ping_sets_both_sides() {
  let s = store().await;
  // Ada monitors Brendan.
  let (a, b) = pair(&s, Roles::DEPENDENT).await;

  s.ping_dependent(a.user_id, b.user_id).await.unwrap();

  let ab = edge(&s, a.user_id, b.user_id).await.unwrap();
  assert!(ab.has_outgoing_ping);
  assert!(ab.outgoing_ping_at.is_some());

  let ba = edge(&s, b.user_id, a.user_id).await.unwrap();
  assert!(ba.has_incoming_ping);
  assert_eq!(ba.incoming_ping_at, ab.outgoing_ping_at);
}

#[tokio::test]
async fn repeated_ping_is_a_no_op() {
  let s = store().await;
  let (a, b) = pair(&s, Roles::DEPENDENT).await;

  s.ping_dependent(a.user_id, b.user_id).await.unwrap();
  let first = edge(&s, a.user_id, b.user_id).await.unwrap().outgoing_ping_at;
  s.ping_dependent(a.user_id, b.user_id).await.unwrap();
  let second = edge(&s, a.user_id, b.user_id).await.unwrap().outgoing_ping_at;

  assert_eq!(first, second);
}

#[tokio::test]
async fn ping_requires_dependent_role() {
  let s = store().await;
  let (a, b) = pair(&s, Roles::RESPONDER).await;

  let err = s.ping_dependent(a.user_id, b.user_id).await.unwrap_err();
  assert!(matches!(err, Error::NotDependent { .. }));

  let err = s.ping_dependent(a.user_id, Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(err, Error::ContactNotFound { .. }));
}

#[tokio::test]
async fn respond_and_clear_reset_both_sides() {
  let s = store().await;
  let (a, b) = pair(&s, Roles::DEPENDENT).await;

  s.ping_dependent(a.user_id, b.user_id).await.unwrap();
  s.respond_to_ping(b.user_id, a.user_id).await.unwrap();
  assert!(!edge(&s, a.user_id, b.user_id).await.unwrap().has_outgoing_ping);
  assert!(!edge(&s, b.user_id, a.user_id).await.unwrap().has_incoming_ping);

  // Responding again is harmless.
  s.respond_to_ping(b.user_id, a.user_id).await.unwrap();

  s.ping_dependent(a.user_id, b.user_id).await.unwrap();
  s.clear_ping(a.user_id, b.user_id).await.unwrap();
  let ba = edge(&s, b.user_id, a.user_id).await.unwrap();
  assert!(!ba.has_incoming_ping);
  assert_eq!(ba.incoming_ping_at, None);
}

#[tokio::test]
async fn respond_to_all_clears_every_incoming_ping() {
  let s = store().await;
  let me = user(&s, "Dana").await;
  let mut responders = Vec::new();
  for name in ["Ada", "Brendan", "Cleo"] {
    let r = user(&s, name).await;
    // Each responder monitors me.
    s.add_contact_relation(r.user_id, me.user_id, Roles::DEPENDENT).await.unwrap();
    s.ping_dependent(r.user_id, me.user_id).await.unwrap();
    responders.push(r);
  }
  assert_eq!(
    s.load_contacts(me.user_id).await.unwrap().iter().filter(|c| c.has_incoming_ping).count(),
    3
  );

  s.respond_to_all_pings(me.user_id).await.unwrap();

  let mine = s.load_contacts(me.user_id).await.unwrap();
  assert!(mine.iter().all(|c| !c.has_incoming_ping));
  for r in &responders {
    assert!(!edge(&s, r.user_id, me.user_id).await.unwrap().has_outgoing_ping);
  }
}

// ─── Snapshots and streams ───────────────────────────────────────────────────

#[tokio::test]
async fn peer_snapshot_reflects_alert_and_check_in() {
  let s = store().await;
  // Brendan monitors Ada.
  let (a, b) = pair(&s, Roles::RESPONDER).await;
  let at = Utc::now();

  s.update_user(a.user_id, UserPatch::manual_alert(true, at)).await.unwrap();
  s.update_user(a.user_id, UserPatch::check_in(at)).await.unwrap();

  let seen_by_b = edge(&s, b.user_id, a.user_id).await.unwrap();
  assert!(seen_by_b.manual_alert_active);
  assert_eq!(seen_by_b.last_checked_in.map(|t| t.timestamp()), Some(at.timestamp()));
}

#[tokio::test]
async fn contact_stream_delivers_initial_and_changes() {
  let s = store().await;
  let (a, b) = pair(&s, Roles::DEPENDENT).await;

  let mut stream = Box::pin(s.stream_contacts(b.user_id));
  let initial = stream.next().await.unwrap().unwrap();
  assert!(!initial[0].has_incoming_ping);

  s.ping_dependent(a.user_id, b.user_id).await.unwrap();

  let next = tokio::time::timeout(Duration::from_secs(5), stream.next())
    .await
    .expect("stream delivery")
    .unwrap()
    .unwrap();
  assert!(next[0].has_incoming_ping);
}

#[tokio::test]
async fn user_stream_follows_updates() {
  let s = store().await;
  let u = user(&s, "Ada").await;

  let mut stream = Box::pin(s.stream_user(u.user_id));
  assert_eq!(stream.next().await.unwrap().unwrap().name, "Ada");

  let patch = UserPatch { name: Some("Ada L.".into()), ..UserPatch::default() };
  s.update_user(u.user_id, patch).await.unwrap();

  let next = tokio::time::timeout(Duration::from_secs(5), stream.next())
    .await
    .expect("stream delivery")
    .unwrap()
    .unwrap();
  assert_eq!(next.name, "Ada L.");
}
