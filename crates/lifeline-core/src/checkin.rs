//! The check-in lifecycle.
//!
//! A user is either [`CheckInStatus::Active`] or [`CheckInStatus::Expired`].
//! There is no stored state: status is derived from the [`CheckInWindow`] and
//! the current time. The "due soon" condition only drives reminders and is
//! likewise recomputed on demand.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::interval::CheckInWindow;

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckInStatus {
  Active,
  Expired,
}

impl CheckInStatus {
  pub fn at(window: &CheckInWindow, now: DateTime<Utc>) -> Self {
    if window.is_expired(now) { Self::Expired } else { Self::Active }
  }

  pub fn is_expired(self) -> bool { matches!(self, Self::Expired) }
}

// ─── Reminders ───────────────────────────────────────────────────────────────

/// How long before expiry an advisory reminder fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderLead {
  ThirtyMinutes,
  TwoHours,
}

impl ReminderLead {
  pub const ALL: [Self; 2] = [Self::TwoHours, Self::ThirtyMinutes];

  pub fn duration(self) -> Duration {
    match self {
      Self::ThirtyMinutes => Duration::minutes(30),
      Self::TwoHours => Duration::hours(2),
    }
  }
}

/// The user's reminder settings, as stored on their record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NotificationPreferences {
  pub notification_enabled:  bool,
  pub notify_30_min_before:  bool,
  pub notify_2_hours_before: bool,
}

impl NotificationPreferences {
  pub fn is_enabled(&self, lead: ReminderLead) -> bool {
    self.notification_enabled
      && match lead {
        ReminderLead::ThirtyMinutes => self.notify_30_min_before,
        ReminderLead::TwoHours => self.notify_2_hours_before,
      }
  }

  pub fn enabled_leads(&self) -> impl Iterator<Item = ReminderLead> + '_ {
    ReminderLead::ALL.into_iter().filter(|lead| self.is_enabled(*lead))
  }

  /// Enabled leads whose reminder window `[expires_at - lead, expires_at]`
  /// contains `now`.
  pub fn due_soon(
    &self,
    window: &CheckInWindow,
    now: DateTime<Utc>,
  ) -> Vec<ReminderLead> {
    let expires_at = window.expires_at();
    if now > expires_at {
      return Vec::new();
    }
    self
      .enabled_leads()
      .filter(|lead| now >= expires_at - lead.duration())
      .collect()
  }
}

/// A notification an external notifier should schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduledReminder {
  DueSoon { lead: ReminderLead, fire_at: DateTime<Utc> },
  Expired { fire_at: DateTime<Utc> },
}

impl ScheduledReminder {
  pub fn fire_at(&self) -> DateTime<Utc> {
    match self {
      Self::DueSoon { fire_at, .. } | Self::Expired { fire_at } => *fire_at,
    }
  }
}

/// All reminders for the current cycle that have not fired yet, earliest
/// first. Leads longer than the interval itself are skipped: they would fire
/// before the check-in that started the cycle.
pub fn reminder_schedule(
  window: &CheckInWindow,
  prefs: &NotificationPreferences,
  now: DateTime<Utc>,
) -> Vec<ScheduledReminder> {
  if !prefs.notification_enabled {
    return Vec::new();
  }

  let expires_at = window.expires_at();
  let mut schedule: Vec<ScheduledReminder> = prefs
    .enabled_leads()
    .filter(|lead| lead.duration() < window.interval.as_duration())
    .map(|lead| ScheduledReminder::DueSoon { lead, fire_at: expires_at - lead.duration() })
    .chain(std::iter::once(ScheduledReminder::Expired { fire_at: expires_at }))
    .filter(|r| r.fire_at() > now)
    .collect();

  schedule.sort_by_key(ScheduledReminder::fire_at);
  schedule
}
