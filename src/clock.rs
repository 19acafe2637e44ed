//! Injectable source of the current time.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, PoisonError};

/// Supplies "now" to the cache loaders so freshness checks are deterministic.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// Clock frozen at a settable instant.
#[derive(Debug)]
pub struct FixedClock {
  now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
  pub fn new(now: DateTime<Utc>) -> Self {
    Self {
      now: Mutex::new(now),
    }
  }

  pub fn set(&self, now: DateTime<Utc>) {
    *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
  }
}

impl Clock for FixedClock {
  fn now(&self) -> DateTime<Utc> {
    *self.now.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
  fn now(&self) -> DateTime<Utc> {
    (**self).now()
  }
}
