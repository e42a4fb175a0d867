//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, UUIDs as hyphenated lowercase
//! strings, intervals as whole seconds. Decoding is strict: a malformed
//! column is an error, never a silent default.

use chrono::{DateTime, Utc};
use lifeline_core::{
  contact::{Contact, Roles},
  interval::CheckInInterval,
  user::{User, UserPatch},
};
use rusqlite::types::Value;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── UserPatch ────────────────────────────────────────────────────────────────

/// The `(column, value)` pairs a patch touches, in a stable order.
pub fn encode_patch(patch: &UserPatch) -> Vec<(&'static str, Value)> {
  let mut cols: Vec<(&'static str, Value)> = Vec::new();
  let text = |s: &String| Value::Text(s.clone());
  let flag = |b: bool| Value::Integer(b as i64);

  if let Some(v) = &patch.name {
    cols.push(("name", text(v)));
  }
  if let Some(v) = &patch.phone_number {
    cols.push(("phone_number", text(v)));
  }
  if let Some(v) = &patch.phone_region {
    cols.push(("phone_region", text(v)));
  }
  if let Some(v) = &patch.note {
    cols.push(("note", text(v)));
  }
  if let Some(v) = patch.last_checked_in {
    cols.push(("last_checked_in", Value::Text(encode_dt(v))));
  }
  if let Some(v) = patch.check_in_interval {
    cols.push(("check_in_interval_secs", Value::Integer(v.as_secs())));
  }
  if let Some(v) = patch.notify_30_min_before {
    cols.push(("notify_30_min_before", flag(v)));
  }
  if let Some(v) = patch.notify_2_hours_before {
    cols.push(("notify_2_hours_before", flag(v)));
  }
  if let Some(v) = patch.notification_enabled {
    cols.push(("notification_enabled", flag(v)));
  }
  if let Some(v) = patch.manual_alert_active {
    cols.push(("manual_alert_active", flag(v)));
  }
  if let Some(v) = patch.manual_alert_at {
    cols.push((
      "manual_alert_at",
      v.map(encode_dt).map_or(Value::Null, Value::Text),
    ));
  }
  if let Some(v) = patch.profile_complete {
    cols.push(("profile_complete", flag(v)));
  }
  cols
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const USER_COLUMNS: &str = "user_id, name, phone_number, phone_region, note, qr_code_id,
  last_checked_in, check_in_interval_secs, notify_30_min_before, notify_2_hours_before,
  manual_alert_active, manual_alert_at, notification_enabled, profile_complete, last_updated";

/// Raw values read directly from a `users` row.
pub struct RawUser {
  pub user_id:                String,
  pub name:                   String,
  pub phone_number:           String,
  pub phone_region:           String,
  pub note:                   String,
  pub qr_code_id:             String,
  pub last_checked_in:        String,
  pub check_in_interval_secs: i64,
  pub notify_30_min_before:   bool,
  pub notify_2_hours_before:  bool,
  pub manual_alert_active:    bool,
  pub manual_alert_at:        Option<String>,
  pub notification_enabled:   bool,
  pub profile_complete:       bool,
  pub last_updated:           String,
}

impl RawUser {
  /// Read a row selected with [`USER_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:                row.get(0)?,
      name:                   row.get(1)?,
      phone_number:           row.get(2)?,
      phone_region:           row.get(3)?,
      note:                   row.get(4)?,
      qr_code_id:             row.get(5)?,
      last_checked_in:        row.get(6)?,
      check_in_interval_secs: row.get(7)?,
      notify_30_min_before:   row.get(8)?,
      notify_2_hours_before:  row.get(9)?,
      manual_alert_active:    row.get(10)?,
      manual_alert_at:        row.get(11)?,
      notification_enabled:   row.get(12)?,
      profile_complete:       row.get(13)?,
      last_updated:           row.get(14)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:               decode_uuid(&self.user_id)?,
      name:                  self.name,
      phone_number:          self.phone_number,
      phone_region:          self.phone_region,
      note:                  self.note,
      qr_code_id:            decode_uuid(&self.qr_code_id)?,
      last_checked_in:       decode_dt(&self.last_checked_in)?,
      check_in_interval:     CheckInInterval::new(self.check_in_interval_secs)?,
      notify_30_min_before:  self.notify_30_min_before,
      notify_2_hours_before: self.notify_2_hours_before,
      manual_alert_active:   self.manual_alert_active,
      manual_alert_at:       decode_opt_dt(self.manual_alert_at)?,
      notification_enabled:  self.notification_enabled,
      profile_complete:      self.profile_complete,
      last_updated:          decode_dt(&self.last_updated)?,
    })
  }
}

/// Columns for a contact edge joined with its peer's user row (`c` / `u`).
pub const CONTACT_COLUMNS: &str = "c.peer_id, c.is_responder, c.is_dependent,
  u.name, u.phone_number, u.note, u.last_checked_in, u.check_in_interval_secs,
  u.manual_alert_active, u.manual_alert_at,
  c.has_incoming_ping, c.incoming_ping_at, c.has_outgoing_ping, c.outgoing_ping_at,
  c.added_at, c.last_updated";

/// Raw values for one edge joined with the peer's `users` row.
pub struct RawContact {
  pub peer_id:                String,
  pub is_responder:           bool,
  pub is_dependent:           bool,
  pub name:                   String,
  pub phone_number:           String,
  pub note:                   String,
  pub last_checked_in:        String,
  pub check_in_interval_secs: i64,
  pub manual_alert_active:    bool,
  pub manual_alert_at:        Option<String>,
  pub has_incoming_ping:      bool,
  pub incoming_ping_at:       Option<String>,
  pub has_outgoing_ping:      bool,
  pub outgoing_ping_at:       Option<String>,
  pub added_at:               String,
  pub last_updated:           String,
}

impl RawContact {
  /// Read a row selected with [`CONTACT_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      peer_id:                row.get(0)?,
      is_responder:           row.get(1)?,
      is_dependent:           row.get(2)?,
      name:                   row.get(3)?,
      phone_number:           row.get(4)?,
      note:                   row.get(5)?,
      last_checked_in:        row.get(6)?,
      check_in_interval_secs: row.get(7)?,
      manual_alert_active:    row.get(8)?,
      manual_alert_at:        row.get(9)?,
      has_incoming_ping:      row.get(10)?,
      incoming_ping_at:       row.get(11)?,
      has_outgoing_ping:      row.get(12)?,
      outgoing_ping_at:       row.get(13)?,
      added_at:               row.get(14)?,
      last_updated:           row.get(15)?,
    })
  }

  pub fn into_contact(self) -> Result<Contact> {
    Ok(Contact {
      peer_id:             decode_uuid(&self.peer_id)?,
      roles:               Roles::new(self.is_responder, self.is_dependent)?,
      name:                self.name,
      phone_number:        self.phone_number,
      note:                self.note,
      last_checked_in:     Some(decode_dt(&self.last_checked_in)?),
      check_in_interval:   Some(CheckInInterval::new(self.check_in_interval_secs)?),
      manual_alert_active: self.manual_alert_active,
      manual_alert_at:     decode_opt_dt(self.manual_alert_at)?,
      has_incoming_ping:   self.has_incoming_ping,
      incoming_ping_at:    decode_opt_dt(self.incoming_ping_at)?,
      has_outgoing_ping:   self.has_outgoing_ping,
      outgoing_ping_at:    decode_opt_dt(self.outgoing_ping_at)?,
      added_at:            decode_dt(&self.added_at)?,
      last_updated:        decode_dt(&self.last_updated)?,
    })
  }
}
