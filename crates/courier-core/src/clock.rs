//! Time source for stage timestamps.

use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// Supplies the current time to the engine.
pub trait Clock: Send + Sync {
	fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// Clock that returns a fixed instant until moved.
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

	/// Moves the clock to `now`.
	pub fn set(&self, now: DateTime<Utc>) {
		if let Ok(mut guard) = self.now.lock() {
			*guard = now;
		}
	}

	/// Moves the clock forward by `delta`.
	pub fn advance(&self, delta: chrono::Duration) {
		if let Ok(mut guard) = self.now.lock() {
			*guard += delta;
		}
	}
}

impl Clock for FixedClock {
	fn now(&self) -> DateTime<Utc> {
		match self.now.lock() {
			Ok(guard) => *guard,
			Err(poisoned) => *poisoned.into_inner(),
		}
	}
}
