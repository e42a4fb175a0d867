//! Transition events emitted for an external notifier.
//!
//! The core never calls a notification API itself. It publishes these on an
//! outbound channel; whoever owns the platform integration turns them into
//! local or push notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::checkin::ReminderLead;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
  /// The local user entered a reminder lead window. Once per lead per cycle.
  CheckInDueSoon {
    lead:       ReminderLead,
    expires_at: DateTime<Utc>,
  },
  /// The local user's window lapsed (Active → Expired). Once per cycle.
  CheckInExpired {
    expired_at: DateTime<Utc>,
  },
  /// A monitored dependent's window lapsed. Once per dependent cycle.
  DependentNonResponsive {
    peer_id:    Uuid,
    expired_at: DateTime<Utc>,
  },
  /// A responder pinged the local user.
  PingReceived {
    peer_id: Uuid,
    at:      Option<DateTime<Utc>>,
  },
  /// A monitored dependent raised their manual alert.
  ManualAlertActivated {
    peer_id: Uuid,
    at:      Option<DateTime<Utc>>,
  },
  ManualAlertDeactivated {
    peer_id: Uuid,
  },
}
