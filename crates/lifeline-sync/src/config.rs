//! Session tuning knobs.

use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
  /// How often the expiry watcher re-derives check-in status. Expiry is
  /// purely time-driven, so nothing else will notice it.
  pub expiry_poll_secs: u64,
  /// Capacity of the outbound event channel; slow consumers lag past this.
  pub event_capacity:   usize,
}

impl SessionConfig {
  pub fn expiry_poll_interval(&self) -> Duration {
    Duration::from_secs(self.expiry_poll_secs.max(1))
  }
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self { expiry_poll_secs: 30, event_capacity: 64 }
  }
}
