//! [`Mirror`]: the single-writer container around [`State`].

use std::sync::Arc;

use lifeline_core::event::Event;
use tokio::sync::{broadcast, watch};

use crate::state::{Action, State, reduce};

/// Serialises every [`Action`] through [`reduce`] and publishes the result.
///
/// Dispatch runs the reducer while holding the watch channel's write lock, so
/// readers observe each action fully applied or not at all. Events produced
/// by the reducer go out on a broadcast channel after the state is visible.
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone)]
pub struct Mirror {
  state:  Arc<watch::Sender<State>>,
  events: broadcast::Sender<Event>,
}

impl Mirror {
  pub fn new(event_capacity: usize) -> Self {
    let (state, _) = watch::channel(State::default());
    let (events, _) = broadcast::channel(event_capacity.max(1));
    Self { state: Arc::new(state), events }
  }

  pub fn dispatch(&self, action: Action) {
    tracing::trace!(?action, "dispatch");
    let mut events = Vec::new();
    self.state.send_modify(|state| events = reduce(state, action));
    for event in events {
      self.publish(event);
    }
  }

  /// Send an event that did not come from the reducer (expiry transitions).
  pub fn publish(&self, event: Event) {
    tracing::debug!(?event, "event");
    // No subscribers is fine; events are advisory.
    let _ = self.events.send(event);
  }

  pub fn snapshot(&self) -> State { self.state.borrow().clone() }

  pub fn subscribe(&self) -> watch::Receiver<State> { self.state.subscribe() }

  pub fn events(&self) -> broadcast::Receiver<Event> { self.events.subscribe() }
}
