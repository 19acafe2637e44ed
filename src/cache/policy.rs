//! Time-to-live freshness policy for cached snapshots.

use chrono::{DateTime, Duration, Utc};

/// Default maximum age of a cached snapshot, in days.
pub const MAX_AGE_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
  max_age: Duration,
}

impl CachePolicy {
  pub fn new(max_age: Duration) -> Self {
    Self { max_age }
  }

  pub fn max_age(&self) -> Duration {
    self.max_age
  }

  /// A snapshot is fresh strictly before `timestamp + max_age`.
  /// Exactly `max_age` old counts as expired.
  pub fn validate(&self, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    match timestamp.checked_add_signed(self.max_age) {
      Some(expiry) => now < expiry,
      // Expiry beyond the representable range never arrives.
      None => true,
    }
  }
}

impl Default for CachePolicy {
  fn default() -> Self {
    Self::new(Duration::days(MAX_AGE_DAYS))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
  }

  #[test]
  fn test_just_under_max_age_is_valid() {
    let policy = CachePolicy::default();
    let timestamp = now() - Duration::days(7) + Duration::seconds(1);
    assert!(policy.validate(timestamp, now()));
  }

  #[test]
  fn test_exactly_max_age_is_expired() {
    let policy = CachePolicy::default();
    let timestamp = now() - Duration::days(7);
    assert!(!policy.validate(timestamp, now()));
  }

  #[test]
  fn test_over_max_age_is_expired() {
    let policy = CachePolicy::default();
    let timestamp = now() - Duration::days(7) - Duration::seconds(1);
    assert!(!policy.validate(timestamp, now()));
  }

  #[test]
  fn test_custom_max_age() {
    let policy = CachePolicy::new(Duration::hours(1));
    assert!(policy.validate(now() - Duration::minutes(59), now()));
    assert!(!policy.validate(now() - Duration::hours(1), now()));
  }

  #[test]
  fn test_future_timestamp_is_valid() {
    let policy = CachePolicy::default();
    assert!(policy.validate(now() + Duration::days(1), now()));
  }
}
