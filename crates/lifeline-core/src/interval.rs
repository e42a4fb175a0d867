//! Check-in interval and the time evaluator.
//!
//! Everything here is a pure function of `last_checked_in`, the interval and
//! `now`. Results must be recomputed on every poll: `now` advances without
//! any event firing.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Interval ────────────────────────────────────────────────────────────────

/// A strictly positive check-in interval with whole-second resolution.
///
/// Zero and negative intervals are unrepresentable: both [`CheckInInterval::new`]
/// and deserialization reject them, so the evaluator never divides by zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct CheckInInterval(i64);

impl CheckInInterval {
  /// Upper bound on an interval; keeps timestamp arithmetic far from overflow.
  pub const MAX_SECS: i64 = 365 * 24 * 60 * 60;

  pub const DEFAULT: Self = Self(24 * 60 * 60);

  pub fn new(secs: i64) -> Result<Self> {
    if secs <= 0 {
      return Err(Error::InvalidInput(format!(
        "check-in interval must be positive, got {secs}s"
      )));
    }
    if secs > Self::MAX_SECS {
      return Err(Error::InvalidInput(format!(
        "check-in interval of {secs}s exceeds the {}s maximum",
        Self::MAX_SECS
      )));
    }
    Ok(Self(secs))
  }

  pub fn from_minutes(minutes: i64) -> Result<Self> {
    Self::new(minutes.saturating_mul(60))
  }

  pub fn from_hours(hours: i64) -> Result<Self> {
    Self::new(hours.saturating_mul(60 * 60))
  }

  pub fn as_secs(self) -> i64 { self.0 }

  pub fn as_duration(self) -> Duration { Duration::seconds(self.0) }
}

impl Default for CheckInInterval {
  fn default() -> Self { Self::DEFAULT }
}

impl TryFrom<i64> for CheckInInterval {
  type Error = Error;

  fn try_from(secs: i64) -> Result<Self> { Self::new(secs) }
}

impl From<CheckInInterval> for i64 {
  fn from(interval: CheckInInterval) -> Self { interval.0 }
}

impl fmt::Display for CheckInInterval {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let secs = self.0;
    if secs % 86_400 == 0 {
      write!(f, "{}d", secs / 86_400)
    } else if secs % 3_600 == 0 {
      write!(f, "{}h", secs / 3_600)
    } else if secs % 60 == 0 {
      write!(f, "{}m", secs / 60)
    } else {
      write!(f, "{secs}s")
    }
  }
}

// ─── Window ──────────────────────────────────────────────────────────────────

/// One check-in cycle: the last check-in and the interval it is measured by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckInWindow {
  pub last_checked_in: DateTime<Utc>,
  pub interval:        CheckInInterval,
}

impl CheckInWindow {
  pub fn new(last_checked_in: DateTime<Utc>, interval: CheckInInterval) -> Self {
    Self { last_checked_in, interval }
  }

  /// `last_checked_in + interval`.
  pub fn expires_at(&self) -> DateTime<Utc> {
    self.last_checked_in + self.interval.as_duration()
  }

  /// Strict: the exact expiration instant is still not expired.
  pub fn is_expired(&self, now: DateTime<Utc>) -> bool { now > self.expires_at() }

  /// Negative once the window has expired.
  pub fn time_remaining(&self, now: DateTime<Utc>) -> Duration {
    self.expires_at() - now
  }

  /// Elapsed fraction of the interval, clamped to `[0.0, 1.0]`.
  pub fn progress(&self, now: DateTime<Utc>) -> f64 {
    let elapsed = (now - self.last_checked_in).num_milliseconds() as f64;
    let total = self.interval.as_duration().num_milliseconds() as f64;
    (elapsed / total).clamp(0.0, 1.0)
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap() }

  fn day_window() -> CheckInWindow {
    CheckInWindow::new(t0(), CheckInInterval::from_hours(24).unwrap())
  }

  #[test]
  fn rejects_non_positive_intervals() {
    assert!(matches!(CheckInInterval::new(0), Err(Error::InvalidInput(_))));
    assert!(matches!(CheckInInterval::new(-60), Err(Error::InvalidInput(_))));
    assert!(CheckInInterval::new(CheckInInterval::MAX_SECS + 1).is_err());
    assert!(CheckInInterval::new(1).is_ok());
  }

  #[test]
  fn deserialize_rejects_zero() {
    assert!(serde_json::from_str::<CheckInInterval>("0").is_err());
    let ok: CheckInInterval = serde_json::from_str("3600").unwrap();
    assert_eq!(ok.as_secs(), 3600);
    assert_eq!(serde_json::to_string(&ok).unwrap(), "3600");
  }

  #[test]
  fn progress_endpoints() {
    let w = day_window();
    assert_eq!(w.progress(t0()), 0.0);
    assert_eq!(w.progress(w.expires_at()), 1.0);
    assert_eq!(w.progress(w.expires_at() + Duration::hours(5)), 1.0);
    assert_eq!(w.progress(t0() - Duration::hours(1)), 0.0);
    assert!((w.progress(t0() + Duration::hours(6)) - 0.25).abs() < 1e-9);
  }

  #[test]
  fn expiry_is_strict() {
    let w = day_window();
    let exp = w.expires_at();
    assert!(!w.is_expired(exp - Duration::seconds(1)));
    assert!(!w.is_expired(exp));
    assert!(w.is_expired(exp + Duration::seconds(1)));
  }

  #[test]
  fn time_remaining_goes_negative() {
    let w = day_window();
    assert_eq!(w.time_remaining(t0()), Duration::hours(24));
    assert_eq!(
      w.time_remaining(w.expires_at() + Duration::minutes(10)),
      Duration::minutes(-10)
    );
  }

  #[test]
  fn display_picks_largest_whole_unit() {
    assert_eq!(CheckInInterval::from_hours(48).unwrap().to_string(), "2d");
    assert_eq!(CheckInInterval::from_hours(8).unwrap().to_string(), "8h");
    assert_eq!(CheckInInterval::from_minutes(90).unwrap().to_string(), "90m");
    assert_eq!(CheckInInterval::new(45).unwrap().to_string(), "45s");
  }
}
