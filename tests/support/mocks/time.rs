// tests/support/mocks/time.rs
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use receipt_client_core::application::ports::time::Clock;
use std::sync::Mutex;

static FIXED_NOW: Lazy<DateTime<Utc>> = Lazy::new(|| {
    DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
        .expect("invalid RFC3339 in tests/support/mocks/time.rs")
        .with_timezone(&Utc)
});

/// Deterministic timestamp every test clock starts from.
pub fn fixed_now() -> DateTime<Utc> {
    *FIXED_NOW
}

/// A clock tests move by hand.
pub struct MutableClock {
    now: Mutex<DateTime<Utc>>,
}

impl Default for MutableClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MutableClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(fixed_now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap() = at;
    }
}

impl Clock for MutableClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
