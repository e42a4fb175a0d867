//! Edge detection for time-driven transitions.
//!
//! Nothing fires when a check-in window lapses, so the session polls. The
//! tracker remembers what it saw last time and reports only entries into a
//! condition: one `CheckInExpired` per Active→Expired transition, one
//! `CheckInDueSoon` per lead window entered, one `DependentNonResponsive`
//! per dependent transition. A check-in resets all of them naturally.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use lifeline_core::{
  checkin::{CheckInStatus, ReminderLead},
  event::Event,
};
use uuid::Uuid;

use crate::state::State;

#[derive(Debug, Default)]
pub struct ExpiryTracker {
  status:     Option<CheckInStatus>,
  due:        HashSet<ReminderLead>,
  dependents: HashMap<Uuid, CheckInStatus>,
}

impl ExpiryTracker {
  pub fn observe(&mut self, state: &State, now: DateTime<Utc>) -> Vec<Event> {
    let mut events = Vec::new();

    match &state.user {
      Some(user) => {
        let window = user.window();
        let expires_at = window.expires_at();
        let status = CheckInStatus::at(&window, now);

        let due: HashSet<ReminderLead> =
          user.preferences().due_soon(&window, now).into_iter().collect();
        for lead in ReminderLead::ALL {
          if due.contains(&lead) && !self.due.contains(&lead) {
            events.push(Event::CheckInDueSoon { lead, expires_at });
          }
        }
        self.due = due;

        if status.is_expired() && self.status != Some(CheckInStatus::Expired) {
          events.push(Event::CheckInExpired { expired_at: expires_at });
        }
        self.status = Some(status);
      }
      None => {
        self.status = None;
        self.due.clear();
      }
    }

    let mut seen = HashMap::new();
    for c in state.dependents() {
      let Some(window) = c.check_in_window() else { continue };
      let status = CheckInStatus::at(&window, now);
      if status.is_expired() && self.dependents.get(&c.peer_id) != Some(&CheckInStatus::Expired) {
        events.push(Event::DependentNonResponsive {
          peer_id:    c.peer_id,
          expired_at: window.expires_at(),
        });
      }
      seen.insert(c.peer_id, status);
    }
    self.dependents = seen;

    events
  }

  pub fn reset(&mut self) { *self = Self::default(); }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};
  use lifeline_core::{
    contact::{Contact, Roles},
    interval::CheckInInterval,
    user::{PeerProfile, User},
  };

  use super::*;

  fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap() }

  fn user() -> User {
    User {
      user_id:               Uuid::new_v4(),
      name:                  "Ada".into(),
      phone_number:          String::new(),
      phone_region:          "US".into(),
      note:                  String::new(),
      qr_code_id:            Uuid::new_v4(),
      last_checked_in:       t0(),
      check_in_interval:     CheckInInterval::from_hours(24).unwrap(),
      notify_30_min_before:  true,
      notify_2_hours_before: true,
      manual_alert_active:   false,
      manual_alert_at:       None,
      notification_enabled:  true,
      profile_complete:      true,
      last_updated:          t0(),
    }
  }

  fn state_with(user: User) -> State { State { user: Some(user), contacts: Vec::new() } }

  #[test]
  fn expiry_fires_once_per_cycle() {
    let mut tracker = ExpiryTracker::default();
    let mut state = state_with(user());

    assert!(tracker.observe(&state, t0() + Duration::hours(1)).is_empty());

    let late = t0() + Duration::hours(24) + Duration::seconds(1);
    let events = tracker.observe(&state, late);
    assert!(events.contains(&Event::CheckInExpired { expired_at: t0() + Duration::hours(24) }));
    assert!(tracker.observe(&state, late + Duration::minutes(5)).is_empty());

    // Check in, then lapse again.
    state.user.as_mut().unwrap().last_checked_in = late;
    assert!(tracker.observe(&state, late).is_empty());
    let again = tracker.observe(&state, late + Duration::hours(25));
    assert!(again.iter().any(|e| matches!(e, Event::CheckInExpired { .. })));
  }

  #[test]
  fn due_soon_fires_per_lead() {
    let mut tracker = ExpiryTracker::default();
    let state = state_with(user());
    let exp = t0() + Duration::hours(24);

    let events = tracker.observe(&state, exp - Duration::minutes(90));
    assert_eq!(events, vec![Event::CheckInDueSoon {
      lead:       ReminderLead::TwoHours,
      expires_at: exp,
    }]);

    let events = tracker.observe(&state, exp - Duration::minutes(20));
    assert_eq!(events, vec![Event::CheckInDueSoon {
      lead:       ReminderLead::ThirtyMinutes,
      expires_at: exp,
    }]);

    assert!(tracker.observe(&state, exp - Duration::minutes(10)).is_empty());
  }

  #[test]
  fn dependent_lapse_fires_once() {
    let mut tracker = ExpiryTracker::default();
    let profile = PeerProfile {
      user_id:      Uuid::new_v4(),
      name:         "Brendan".into(),
      phone_number: String::new(),
      note:         String::new(),
    };
    let mut dep = Contact::from_profile(&profile, Roles::DEPENDENT, t0());
    dep.last_checked_in = Some(t0());
    dep.check_in_interval = Some(CheckInInterval::from_hours(1).unwrap());
    let state = State { user: None, contacts: vec![dep] };

    assert!(tracker.observe(&state, t0()).is_empty());
    let events = tracker.observe(&state, t0() + Duration::hours(2));
    assert_eq!(events, vec![Event::DependentNonResponsive {
      peer_id:    profile.user_id,
      expired_at: t0() + Duration::hours(1),
    }]);
    assert!(tracker.observe(&state, t0() + Duration::hours(3)).is_empty());
  }
}
