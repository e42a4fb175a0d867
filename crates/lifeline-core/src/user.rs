//! The self record and partial updates to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  checkin::{CheckInStatus, NotificationPreferences},
  interval::{CheckInInterval, CheckInWindow},
};

// ─── User ────────────────────────────────────────────────────────────────────

/// A user's own record. Identifiers are server-assigned; the client only
/// mirrors them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
  pub user_id:               Uuid,
  pub name:                  String,
  pub phone_number:          String,
  pub phone_region:          String,
  /// Free-text emergency note shown to contacts.
  pub note:                  String,
  /// Opaque code shown as a QR image; resolves to this user on lookup.
  pub qr_code_id:            Uuid,
  pub last_checked_in:       DateTime<Utc>,
  pub check_in_interval:     CheckInInterval,
  pub notify_30_min_before:  bool,
  pub notify_2_hours_before: bool,
  pub manual_alert_active:   bool,
  #[serde(default)]
  pub manual_alert_at:       Option<DateTime<Utc>>,
  pub notification_enabled:  bool,
  pub profile_complete:      bool,
  pub last_updated:          DateTime<Utc>,
}

impl User {
  pub fn window(&self) -> CheckInWindow {
    CheckInWindow::new(self.last_checked_in, self.check_in_interval)
  }

  pub fn status(&self, now: DateTime<Utc>) -> CheckInStatus {
    CheckInStatus::at(&self.window(), now)
  }

  pub fn preferences(&self) -> NotificationPreferences {
    NotificationPreferences {
      notification_enabled:  self.notification_enabled,
      notify_30_min_before:  self.notify_30_min_before,
      notify_2_hours_before: self.notify_2_hours_before,
    }
  }
}

// ─── UserPatch ───────────────────────────────────────────────────────────────

/// A partial update to a [`User`]. Only `Some` fields are sent or applied.
///
/// `manual_alert_at` is doubly optional: `Some(None)` clears the timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPatch {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name:                  Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub phone_number:          Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub phone_region:          Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub note:                  Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_checked_in:       Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub check_in_interval:     Option<CheckInInterval>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub notify_30_min_before:  Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub notify_2_hours_before: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub notification_enabled:  Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub manual_alert_active:   Option<bool>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none",
    with = "double_option"
  )]
  pub manual_alert_at:       Option<Option<DateTime<Utc>>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub profile_complete:      Option<bool>,
}

impl UserPatch {
  pub fn check_in(at: DateTime<Utc>) -> Self {
    Self { last_checked_in: Some(at), ..Self::default() }
  }

  pub fn interval(interval: CheckInInterval) -> Self {
    Self { check_in_interval: Some(interval), ..Self::default() }
  }

  /// Activation stamps `at`; deactivation clears the timestamp.
  pub fn manual_alert(active: bool, at: DateTime<Utc>) -> Self {
    Self {
      manual_alert_active: Some(active),
      manual_alert_at: Some(active.then_some(at)),
      ..Self::default()
    }
  }

  pub fn preferences(prefs: NotificationPreferences) -> Self {
    Self {
      notification_enabled: Some(prefs.notification_enabled),
      notify_30_min_before: Some(prefs.notify_30_min_before),
      notify_2_hours_before: Some(prefs.notify_2_hours_before),
      ..Self::default()
    }
  }

  pub fn is_empty(&self) -> bool { *self == Self::default() }

  /// Overwrite every field present in the patch. `last_updated` is left to
  /// the caller.
  pub fn apply(&self, user: &mut User) {
    if let Some(v) = &self.name {
      user.name = v.clone();
    }
    if let Some(v) = &self.phone_number {
      user.phone_number = v.clone();
    }
    if let Some(v) = &self.phone_region {
      user.phone_region = v.clone();
    }
    if let Some(v) = &self.note {
      user.note = v.clone();
    }
    if let Some(v) = self.last_checked_in {
      user.last_checked_in = v;
    }
    if let Some(v) = self.check_in_interval {
      user.check_in_interval = v;
    }
    if let Some(v) = self.notify_30_min_before {
      user.notify_30_min_before = v;
    }
    if let Some(v) = self.notify_2_hours_before {
      user.notify_2_hours_before = v;
    }
    if let Some(v) = self.notification_enabled {
      user.notification_enabled = v;
    }
    if let Some(v) = self.manual_alert_active {
      user.manual_alert_active = v;
    }
    if let Some(v) = self.manual_alert_at {
      user.manual_alert_at = v;
    }
    if let Some(v) = self.profile_complete {
      user.profile_complete = v;
    }
  }
}

/// Distinguishes an absent field from an explicit `null`.
mod double_option {
  use serde::{Deserialize, Deserializer, Serialize, Serializer};

  pub fn serialize<T, S>(value: &Option<Option<T>>, s: S) -> Result<S::Ok, S::Error>
  where
    T: Serialize,
    S: Serializer,
  {
    match value {
      Some(inner) => inner.serialize(s),
      None => s.serialize_none(),
    }
  }

  pub fn deserialize<'de, T, D>(d: D) -> Result<Option<Option<T>>, D::Error>
  where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
  {
    Option::<T>::deserialize(d).map(Some)
  }
}

// ─── Lookup result ───────────────────────────────────────────────────────────

/// The public part of a user's profile, returned by a QR-code lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerProfile {
  pub user_id:      Uuid,
  pub name:         String,
  pub phone_number: String,
  pub note:         String,
}

// ─── NewUser ─────────────────────────────────────────────────────────────────

/// Input to account creation on the server side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
  pub name:              String,
  #[serde(default)]
  pub phone_number:      String,
  #[serde(default = "default_region")]
  pub phone_region:      String,
  #[serde(default)]
  pub check_in_interval: CheckInInterval,
}

fn default_region() -> String { "US".to_owned() }

impl NewUser {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name:              name.into(),
      phone_number:      String::new(),
      phone_region:      default_region(),
      check_in_interval: CheckInInterval::default(),
    }
  }
}
