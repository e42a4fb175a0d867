//! Mirror state and the reducer that mutates it.
//!
//! `reduce` is the only code that writes to [`State`]. It is a plain function
//! so the transition rules can be tested without a runtime.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use lifeline_core::{
  contact::{self, Contact, Roles},
  event::Event,
  user::{User, UserPatch},
};
use uuid::Uuid;

// ─── State ───────────────────────────────────────────────────────────────────

/// The local mirror of the signed-in user's view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct State {
  pub user:     Option<User>,
  pub contacts: Vec<Contact>,
}

impl State {
  pub fn contact(&self, peer_id: Uuid) -> Option<&Contact> {
    self.contacts.iter().find(|c| c.peer_id == peer_id)
  }

  fn contact_mut(&mut self, peer_id: Uuid) -> Option<&mut Contact> {
    self.contacts.iter_mut().find(|c| c.peer_id == peer_id)
  }

  pub fn responders(&self) -> impl Iterator<Item = &Contact> {
    contact::responders(&self.contacts)
  }

  pub fn dependents(&self) -> impl Iterator<Item = &Contact> {
    contact::dependents(&self.contacts)
  }

  pub fn pending_pings_count(&self) -> usize { contact::pending_pings_count(&self.contacts) }

  pub fn non_responsive_dependents_count(&self, now: DateTime<Utc>) -> usize {
    contact::non_responsive_dependents_count(&self.contacts, now)
  }
}

// ─── Actions ─────────────────────────────────────────────────────────────────

/// Every mutation of the mirror, optimistic or authoritative.
#[derive(Debug, Clone)]
pub enum Action {
  // Authoritative: one-shot loads and stream deliveries.
  SelfLoaded(User),
  ContactsLoaded(Vec<Contact>),

  // Optimistic: applied before the remote call completes.
  SelfPatched(UserPatch),
  ContactAdded(Contact),
  RolesChanged { peer_id: Uuid, roles: Roles },
  ContactRemoved(Uuid),
  PingSent { peer_id: Uuid, at: DateTime<Utc> },
  PingCleared(Uuid),
  PingAnswered(Uuid),
  AllPingsAnswered,

  SignedOut,
}

// ─── Reducer ─────────────────────────────────────────────────────────────────

/// Apply `action` and return the notifier events it produced.
///
/// Loaded data replaces local state unconditionally; there is no timestamp
/// comparison. Events are derived by diffing a contact list delivery against
/// the previous one.
pub fn reduce(state: &mut State, action: Action) -> Vec<Event> {
  match action {
    Action::SelfLoaded(user) => {
      state.user = Some(user);
    }
    Action::ContactsLoaded(contacts) => {
      let events = diff_contacts(&state.contacts, &contacts);
      state.contacts = contacts;
      return events;
    }
    Action::SelfPatched(patch) => {
      if let Some(user) = state.user.as_mut() {
        patch.apply(user);
      }
    }
    Action::ContactAdded(contact) => {
      if state.contact(contact.peer_id).is_none() {
        state.contacts.push(contact);
      }
    }
    Action::RolesChanged { peer_id, roles } => {
      if let Some(c) = state.contact_mut(peer_id) {
        c.roles = roles;
        if !roles.is_dependent() {
          c.has_outgoing_ping = false;
          c.outgoing_ping_at = None;
        }
        if !roles.is_responder() {
          c.has_incoming_ping = false;
          c.incoming_ping_at = None;
        }
      }
    }
    Action::ContactRemoved(peer_id) => {
      state.contacts.retain(|c| c.peer_id != peer_id);
    }
    Action::PingSent { peer_id, at } => {
      if let Some(c) = state.contact_mut(peer_id) {
        c.has_outgoing_ping = true;
        c.outgoing_ping_at = Some(at);
      }
    }
    Action::PingCleared(peer_id) => {
      if let Some(c) = state.contact_mut(peer_id) {
        c.has_outgoing_ping = false;
        c.outgoing_ping_at = None;
      }
    }
    Action::PingAnswered(peer_id) => {
      if let Some(c) = state.contact_mut(peer_id) {
        clear_incoming(c);
      }
    }
    Action::AllPingsAnswered => {
      state.contacts.iter_mut().for_each(clear_incoming);
    }
    Action::SignedOut => {
      *state = State::default();
    }
  }
  Vec::new()
}

fn clear_incoming(c: &mut Contact) {
  c.has_incoming_ping = false;
  c.incoming_ping_at = None;
}

fn diff_contacts(old: &[Contact], new: &[Contact]) -> Vec<Event> {
  let previous: HashMap<Uuid, &Contact> = old.iter().map(|c| (c.peer_id, c)).collect();
  let mut events = Vec::new();

  for c in new {
    let prev = previous.get(&c.peer_id);

    let had_ping = prev.is_some_and(|p| p.has_incoming_ping);
    if c.has_incoming_ping && !had_ping {
      events.push(Event::PingReceived { peer_id: c.peer_id, at: c.incoming_ping_at });
    }

    if c.is_dependent() {
      let had_alert = prev.is_some_and(|p| p.manual_alert_active);
      if c.manual_alert_active && !had_alert {
        events.push(Event::ManualAlertActivated { peer_id: c.peer_id, at: c.manual_alert_at });
      } else if !c.manual_alert_active && had_alert {
        events.push(Event::ManualAlertDeactivated { peer_id: c.peer_id });
      }
    }
  }

  events
}

#[cfg(test)]
mod tests {
  use lifeline_core::user::PeerProfile;

  use super::*;

  fn contact(roles: Roles) -> Contact {
    let profile = PeerProfile {
      user_id:      Uuid::new_v4(),
      name:         "Grace".into(),
      phone_number: String::new(),
      note:         String::new(),
    };
    Contact::from_profile(&profile, roles, Utc::now())
  }

  #[test]
  fn incoming_ping_emits_once() {
    let mut state = State::default();
    let mut c = contact(Roles::RESPONDER);
    reduce(&mut state, Action::ContactsLoaded(vec![c.clone()]));

    c.has_incoming_ping = true;
    let events = reduce(&mut state, Action::ContactsLoaded(vec![c.clone()]));
    assert_eq!(events, vec![Event::PingReceived { peer_id: c.peer_id, at: None }]);

    let again = reduce(&mut state, Action::ContactsLoaded(vec![c]));
    assert!(again.is_empty());
  }

  #[test]
  fn dependent_alert_toggles_emit() {
    let mut state = State::default();
    let mut dep = contact(Roles::DEPENDENT);
    let mut responder = contact(Roles::RESPONDER);
    reduce(&mut state, Action::ContactsLoaded(vec![dep.clone(), responder.clone()]));

    dep.manual_alert_active = true;
    responder.manual_alert_active = true;
    let events =
      reduce(&mut state, Action::ContactsLoaded(vec![dep.clone(), responder.clone()]));
    assert_eq!(events, vec![Event::ManualAlertActivated { peer_id: dep.peer_id, at: None }]);

    dep.manual_alert_active = false;
    let events = reduce(&mut state, Action::ContactsLoaded(vec![dep.clone(), responder]));
    assert_eq!(events, vec![Event::ManualAlertDeactivated { peer_id: dep.peer_id }]);
  }

  #[test]
  fn answering_pings_updates_derived_count() {
    let mut state = State::default();
    let mut a = contact(Roles::RESPONDER);
    a.has_incoming_ping = true;
    let mut b = a.clone();
    b.peer_id = Uuid::new_v4();
    reduce(&mut state, Action::ContactsLoaded(vec![a.clone(), b]));
    assert_eq!(state.pending_pings_count(), 2);

    reduce(&mut state, Action::PingAnswered(a.peer_id));
    assert_eq!(state.pending_pings_count(), 1);

    reduce(&mut state, Action::AllPingsAnswered);
    assert_eq!(state.pending_pings_count(), 0);
  }

  #[test]
  fn repeated_ping_sent_does_not_duplicate() {
    let mut state = State::default();
    let dep = contact(Roles::DEPENDENT);
    reduce(&mut state, Action::ContactsLoaded(vec![dep.clone()]));

    let at = Utc::now();
    reduce(&mut state, Action::PingSent { peer_id: dep.peer_id, at });
    reduce(&mut state, Action::PingSent { peer_id: dep.peer_id, at });
    assert_eq!(state.contacts.len(), 1);
    assert!(state.contact(dep.peer_id).unwrap().has_outgoing_ping);
  }

  #[test]
  fn role_change_drops_pings_the_roles_no_longer_allow() {
    let mut state = State::default();
    let mut c = contact(Roles::BOTH);
    c.has_outgoing_ping = true;
    c.has_incoming_ping = true;
    reduce(&mut state, Action::ContactsLoaded(vec![c.clone()]));

    reduce(&mut state, Action::RolesChanged { peer_id: c.peer_id, roles: Roles::RESPONDER });
    let after = state.contact(c.peer_id).unwrap();
    assert!(!after.has_outgoing_ping);
    assert!(after.has_incoming_ping);
  }

  #[test]
  fn added_contact_is_not_duplicated() {
    let mut state = State::default();
    let c = contact(Roles::RESPONDER);
    reduce(&mut state, Action::ContactAdded(c.clone()));
    reduce(&mut state, Action::ContactAdded(c.clone()));
    assert_eq!(state.contacts.len(), 1);

    reduce(&mut state, Action::ContactRemoved(c.peer_id));
    assert!(state.contacts.is_empty());
  }

  #[test]
  fn sign_out_clears_everything() {
    let mut state = State::default();
    reduce(&mut state, Action::ContactsLoaded(vec![contact(Roles::BOTH)]));
    reduce(&mut state, Action::SignedOut);
    assert_eq!(state, State::default());
  }
}
