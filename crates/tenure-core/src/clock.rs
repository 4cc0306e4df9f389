//! Clock abstraction.
//!
//! Everything that needs "now" takes a [`Clock`] rather than calling
//! `Utc::now()` directly, so tests can pin time to a fixed instant.

use std::sync::{
  Arc,
  atomic::{AtomicI64, Ordering},
};

use chrono::{DateTime, Duration, Utc};

/// Supplies the current instant. No side effects.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
  fn now(&self) -> DateTime<Utc> { (**self).now() }
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> { Utc::now() }
}

/// A frozen clock for deterministic tests. Time only moves when told to,
/// at millisecond precision.
#[derive(Debug)]
pub struct FixedClock {
  millis: AtomicI64,
}

impl FixedClock {
  pub fn at(now: DateTime<Utc>) -> Self {
    Self { millis: AtomicI64::new(now.timestamp_millis()) }
  }

  pub fn set(&self, now: DateTime<Utc>) {
    self.millis.store(now.timestamp_millis(), Ordering::Relaxed);
  }

  pub fn advance(&self, by: Duration) {
    self.millis.fetch_add(by.num_milliseconds(), Ordering::Relaxed);
  }
}

impl Clock for FixedClock {
  fn now(&self) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(self.millis.load(Ordering::Relaxed))
      .unwrap_or(DateTime::UNIX_EPOCH)
  }
}
