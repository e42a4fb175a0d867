//! Per-user change notification.
//!
//! Each user has a revision counter behind a [`tokio::sync::watch`] channel.
//! Writers bump the counters of every user whose view changed, after the
//! transaction commits; stream readers wake up and reload.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::watch;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct ChangeHub {
  channels: Arc<Mutex<HashMap<Uuid, watch::Sender<u64>>>>,
}

impl ChangeHub {
  pub fn subscribe(&self, user_id: Uuid) -> watch::Receiver<u64> {
    let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
    channels
      .entry(user_id)
      .or_insert_with(|| watch::channel(0).0)
      .subscribe()
  }

  pub fn notify(&self, users: impl IntoIterator<Item = Uuid>) {
    let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
    channels.retain(|_, tx| tx.receiver_count() > 0);
    for user_id in users {
      if let Some(tx) = channels.get(&user_id) {
        tx.send_modify(|rev| *rev += 1);
      }
    }
  }

  #[cfg(test)]
  fn len(&self) -> usize {
    self.channels.lock().unwrap_or_else(PoisonError::into_inner).len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn channels_without_readers_are_dropped() {
    let hub = ChangeHub::default();
    let ada = Uuid::new_v4();
    let bob = Uuid::new_v4();

    let ada_rx = hub.subscribe(ada);
    drop(hub.subscribe(bob));
    assert_eq!(hub.len(), 2);

    hub.notify([ada, bob]);
    assert_eq!(hub.len(), 1);
    assert_eq!(*ada_rx.borrow(), 1);

    drop(ada_rx);
    hub.notify(std::iter::empty());
    assert_eq!(hub.len(), 0);
  }
}
