//! Plain-text rendering of session state.

use chrono::{DateTime, Duration, Local, Utc};
use lifeline_core::{
  checkin::{CheckInStatus, ReminderLead, ScheduledReminder},
  contact::Contact,
  event::Event,
};
use lifeline_sync::{LocalAuth, Session};

use crate::client::HttpRemote;

type CliSession = Session<HttpRemote, LocalAuth>;

pub fn status(session: &CliSession) {
  let state = session.state();
  let Some(user) = state.user.as_ref() else {
    println!("not loaded");
    return;
  };
  let now = session.now();
  let window = user.window();

  println!("{}", user.name);
  match user.status(now) {
    CheckInStatus::Active => println!(
      "  active, {} left ({:.0}% of {})",
      human(window.time_remaining(now)),
      window.progress(now) * 100.0,
      user.check_in_interval,
    ),
    CheckInStatus::Expired => println!(
      "  EXPIRED {} ago, check in now",
      human(-window.time_remaining(now)),
    ),
  }
  println!("  last check-in  {}", local(user.last_checked_in));
  println!("  expires        {}", local(window.expires_at()));
  if user.manual_alert_active {
    println!("  manual alert   ON");
  }
  for reminder in session.reminder_schedule() {
    match reminder {
      ScheduledReminder::DueSoon { lead, fire_at } => {
        println!("  reminder       {} ({} before)", local(fire_at), lead_label(lead));
      }
      ScheduledReminder::Expired { .. } => {}
    }
  }
  println!("  pending pings  {}", state.pending_pings_count());
  println!("  lapsed dependents {}", state.non_responsive_dependents_count(now));
}

pub fn contacts(session: &CliSession) {
  let state = session.state();
  if state.contacts.is_empty() {
    println!("no contacts");
    return;
  }
  let now = session.now();
  for c in &state.contacts {
    println!("{}", contact_line(c, now));
  }
}

fn contact_line(c: &Contact, now: DateTime<Utc>) -> String {
  let roles = match (c.is_responder(), c.is_dependent()) {
    (true, true) => "responder+dependent",
    (true, false) => "responder",
    _ => "dependent",
  };
  let mut flags = Vec::new();
  if c.has_incoming_ping {
    flags.push("pinged you");
  }
  if c.has_outgoing_ping {
    flags.push("ping sent");
  }
  if c.is_dependent() && c.manual_alert_active {
    flags.push("ALERT");
  }
  if c.is_non_responsive(now) {
    flags.push("not checked in");
  }
  format!("{}  {:<24} {:<20} {}", c.peer_id, c.name, roles, flags.join(", "))
}

pub fn event(session: &CliSession, event: &Event) -> String {
  let name = |peer_id| {
    session
      .state()
      .contact(peer_id)
      .map(|c| c.name.clone())
      .unwrap_or_else(|| peer_id.to_string())
  };
  match event {
    Event::CheckInDueSoon { lead, expires_at } => {
      format!("check-in due within {} (at {})", lead_label(*lead), local(*expires_at))
    }
    Event::CheckInExpired { expired_at } => format!("check-in expired at {}", local(*expired_at)),
    Event::DependentNonResponsive { peer_id, expired_at } => {
      format!("{} has not checked in since {}", name(*peer_id), local(*expired_at))
    }
    Event::PingReceived { peer_id, .. } => format!("{} pinged you", name(*peer_id)),
    Event::ManualAlertActivated { peer_id, .. } => {
      format!("{} raised a manual alert", name(*peer_id))
    }
    Event::ManualAlertDeactivated { peer_id } => {
      format!("{} cleared their manual alert", name(*peer_id))
    }
  }
}

fn lead_label(lead: ReminderLead) -> &'static str {
  match lead {
    ReminderLead::ThirtyMinutes => "30 minutes",
    ReminderLead::TwoHours => "2 hours",
  }
}

fn local(at: DateTime<Utc>) -> String {
  at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Coarse human duration: the two largest units.
fn human(d: Duration) -> String {
  let secs = d.num_seconds().max(0);
  let (days, hours, minutes) = (secs / 86_400, secs % 86_400 / 3_600, secs % 3_600 / 60);
  match (days, hours, minutes) {
    (0, 0, 0) => format!("{secs}s"),
    (0, 0, m) => format!("{m}m"),
    (0, h, m) => format!("{h}h {m}m"),
    (d, h, _) => format!("{d}d {h}h"),
  }
}
