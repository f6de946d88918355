//! Injectable time source
//!
//! Timeouts in the parser, the mouse interpreter and the request scheduler
//! read time through a [`Clock`] so tests can drive them deterministically.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Shared "now" function
pub type Clock = Arc<dyn Fn() -> Instant + Send + Sync>;

/// The real monotonic clock
pub fn system_clock() -> Clock {
    Arc::new(Instant::now)
}

/// A clock that only moves when told to
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn now(&self) -> Instant {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = match self.now.lock() {
            Ok(now) => now,
            Err(poisoned) => poisoned.into_inner(),
        };
        *now += by;
    }

    /// A [`Clock`] reading this manual clock
    pub fn clock(&self) -> Clock {
        let this = self.clone();
        Arc::new(move || this.now())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}
