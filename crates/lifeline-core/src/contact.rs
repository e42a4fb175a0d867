//! Contact edges: role flags, ping flags and a cached snapshot of the peer.
//!
//! Every accepted relationship is two edges (A→B and B→A), each owned by the
//! user whose list contains it. Nothing is shared in memory; changes to the
//! peer's edge only arrive through the remote store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  checkin::CheckInStatus,
  interval::{CheckInInterval, CheckInWindow},
  user::PeerProfile,
};

// ─── Roles ───────────────────────────────────────────────────────────────────

/// The two role flags of an edge. At least one is always set: an edge with
/// neither role does not exist, it is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRoles")]
pub struct Roles {
  /// The peer is notified about the local user.
  is_responder: bool,
  /// The local user monitors the peer and may ping them.
  is_dependent: bool,
}

#[derive(Deserialize)]
struct RawRoles {
  is_responder: bool,
  is_dependent: bool,
}

impl TryFrom<RawRoles> for Roles {
  type Error = Error;

  fn try_from(raw: RawRoles) -> Result<Self> {
    Self::new(raw.is_responder, raw.is_dependent)
  }
}

impl Roles {
  pub const RESPONDER: Self = Self { is_responder: true, is_dependent: false };
  pub const DEPENDENT: Self = Self { is_responder: false, is_dependent: true };
  pub const BOTH: Self = Self { is_responder: true, is_dependent: true };

  pub fn new(is_responder: bool, is_dependent: bool) -> Result<Self> {
    if !is_responder && !is_dependent {
      return Err(Error::InvalidInput(
        "a contact must be a responder, a dependent, or both".into(),
      ));
    }
    Ok(Self { is_responder, is_dependent })
  }

  pub fn is_responder(self) -> bool { self.is_responder }

  pub fn is_dependent(self) -> bool { self.is_dependent }

  /// The roles as seen from the other end of the relationship: my responder
  /// sees me as their dependent and vice versa.
  pub fn mirrored(self) -> Self {
    Self { is_responder: self.is_dependent, is_dependent: self.is_responder }
  }
}

// ─── Contact ─────────────────────────────────────────────────────────────────

/// One directional edge plus denormalised peer fields for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
  /// The peer's user id; also the edge's identity within the owner's list.
  pub peer_id:             Uuid,
  #[serde(flatten)]
  pub roles:               Roles,

  // Cached peer snapshot.
  pub name:                String,
  pub phone_number:        String,
  pub note:                String,
  pub last_checked_in:     Option<DateTime<Utc>>,
  pub check_in_interval:   Option<CheckInInterval>,
  pub manual_alert_active: bool,
  #[serde(default)]
  pub manual_alert_at:     Option<DateTime<Utc>>,

  // Ping flags.
  /// The peer (my responder) pinged me.
  pub has_incoming_ping:   bool,
  #[serde(default)]
  pub incoming_ping_at:    Option<DateTime<Utc>>,
  /// I pinged the peer (my dependent).
  pub has_outgoing_ping:   bool,
  #[serde(default)]
  pub outgoing_ping_at:    Option<DateTime<Utc>>,

  pub added_at:            DateTime<Utc>,
  pub last_updated:        DateTime<Utc>,
}

impl Contact {
  /// A fresh edge built from a lookup result, before the store has
  /// confirmed it.
  pub fn from_profile(profile: &PeerProfile, roles: Roles, now: DateTime<Utc>) -> Self {
    Self {
      peer_id: profile.user_id,
      roles,
      name: profile.name.clone(),
      phone_number: profile.phone_number.clone(),
      note: profile.note.clone(),
      last_checked_in: None,
      check_in_interval: None,
      manual_alert_active: false,
      manual_alert_at: None,
      has_incoming_ping: false,
      incoming_ping_at: None,
      has_outgoing_ping: false,
      outgoing_ping_at: None,
      added_at: now,
      last_updated: now,
    }
  }

  pub fn is_responder(&self) -> bool { self.roles.is_responder() }

  pub fn is_dependent(&self) -> bool { self.roles.is_dependent() }

  /// `None` until the peer's check-in fields have been synchronised.
  pub fn check_in_window(&self) -> Option<CheckInWindow> {
    Some(CheckInWindow::new(self.last_checked_in?, self.check_in_interval?))
  }

  pub fn status(&self, now: DateTime<Utc>) -> Option<CheckInStatus> {
    self.check_in_window().map(|w| CheckInStatus::at(&w, now))
  }

  /// A dependent whose check-in window has lapsed.
  pub fn is_non_responsive(&self, now: DateTime<Utc>) -> bool {
    self.is_dependent() && self.status(now).is_some_and(CheckInStatus::is_expired)
  }
}

// ─── Aggregates ──────────────────────────────────────────────────────────────

/// Number of contacts with an unanswered incoming ping. Always derived from
/// the list, never tracked incrementally.
pub fn pending_pings_count(contacts: &[Contact]) -> usize {
  contacts.iter().filter(|c| c.has_incoming_ping).count()
}

pub fn non_responsive_dependents_count(contacts: &[Contact], now: DateTime<Utc>) -> usize {
  contacts.iter().filter(|c| c.is_non_responsive(now)).count()
}

pub fn responders(contacts: &[Contact]) -> impl Iterator<Item = &Contact> {
  contacts.iter().filter(|c| c.is_responder())
}

pub fn dependents(contacts: &[Contact]) -> impl Iterator<Item = &Contact> {
  contacts.iter().filter(|c| c.is_dependent())
}
