//! Timeouts and idle handlers
//!
//! Both collections are behind their own lock, held only to take a snapshot
//! or insert an entry. Callbacks run unlocked, so a callback may register
//! new timers without deadlocking.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::trace;

use crate::clock::{system_clock, Clock};

/// Returns true to stay registered
pub type TimeoutCallback = Box<dyn FnMut() -> bool + Send>;
/// Returns true to run again on the next iteration
pub type IdleCallback = Box<dyn FnMut() -> bool + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeoutToken(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdleToken(u64);

struct Timeout {
    token: TimeoutToken,
    interval: Duration,
    callback: TimeoutCallback,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub struct TimedEvents {
    clock: Clock,
    next_id: AtomicU64,
    /// Keyed by due time; the id keeps equal deadlines distinct
    timeouts: Mutex<BTreeMap<(Instant, u64), Timeout>>,
    idles: Mutex<Vec<(IdleToken, IdleCallback)>>,
}

impl TimedEvents {
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self {
            clock,
            next_id: AtomicU64::new(0),
            timeouts: Mutex::new(BTreeMap::new()),
            idles: Mutex::new(Vec::new()),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Run `callback` after `interval`, and again every `interval` for as
    /// long as it returns true
    pub fn add_timeout(&self, interval: Duration, callback: impl FnMut() -> bool + Send + 'static) -> TimeoutToken {
        let token = TimeoutToken(self.next_id());
        let due = (self.clock)() + interval;
        lock(&self.timeouts).insert(
            (due, token.0),
            Timeout {
                token,
                interval,
                callback: Box::new(callback),
            },
        );
        token
    }

    pub fn remove_timeout(&self, token: TimeoutToken) -> bool {
        let mut timeouts = lock(&self.timeouts);
        let key = timeouts.iter().find(|(_, t)| t.token == token).map(|(k, _)| *k);
        match key {
            Some(key) => timeouts.remove(&key).is_some(),
            None => false,
        }
    }

    pub fn add_idle(&self, callback: impl FnMut() -> bool + Send + 'static) -> IdleToken {
        let token = IdleToken(self.next_id());
        lock(&self.idles).push((token, Box::new(callback)));
        token
    }

    pub fn remove_idle(&self, token: IdleToken) -> bool {
        let mut idles = lock(&self.idles);
        let before = idles.len();
        idles.retain(|(t, _)| *t != token);
        idles.len() != before
    }

    pub fn timeout_count(&self) -> usize {
        lock(&self.timeouts).len()
    }

    pub fn idle_count(&self) -> usize {
        lock(&self.idles).len()
    }

    /// Time until the earliest timeout is due
    pub fn next_due(&self) -> Option<Duration> {
        let now = (self.clock)();
        lock(&self.timeouts)
            .keys()
            .next()
            .map(|(due, _)| due.saturating_duration_since(now))
    }

    /// Run every due timeout. Returns how many ran.
    pub fn lock_and_run_timers(&self) -> usize {
        let now = (self.clock)();
        let due: Vec<Timeout> = {
            let mut timeouts = lock(&self.timeouts);
            let later = timeouts.split_off(&(now, u64::MAX));
            std::mem::replace(&mut *timeouts, later).into_values().collect()
        };

        let count = due.len();
        for mut timeout in due {
            if (timeout.callback)() {
                let next = (self.clock)() + timeout.interval;
                lock(&self.timeouts).insert((next, timeout.token.0), timeout);
            } else {
                trace!("Timeout {:?} finished", timeout.token);
            }
        }
        count
    }

    /// Run every idle handler once. Returns how many ran.
    pub fn lock_and_run_idles(&self) -> usize {
        let idles = std::mem::take(&mut *lock(&self.idles));
        let count = idles.len();
        let mut keep = Vec::with_capacity(count);
        for (token, mut callback) in idles {
            if callback() {
                keep.push((token, callback));
            }
        }
        // Handlers added while running go after the survivors
        let mut idles = lock(&self.idles);
        keep.append(&mut idles);
        *idles = keep;
        count
    }
}

impl Default for TimedEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn setup() -> (ManualClock, Arc<TimedEvents>) {
        let manual = ManualClock::new();
        let events = Arc::new(TimedEvents::with_clock(manual.clock()));
        (manual, events)
    }

    #[test]
    fn test_timeout_fires_when_due() {
        let (clock, events) = setup();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        events.add_timeout(Duration::from_millis(100), move || {
            h.fetch_add(1, Ordering::SeqCst);
            false
        });

        assert_eq!(events.lock_and_run_timers(), 0);
        clock.advance(Duration::from_millis(100));
        assert_eq!(events.lock_and_run_timers(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(events.timeout_count(), 0);
    }

    #[test]
    fn test_repeating_timeout() {
        let (clock, events) = setup();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        events.add_timeout(Duration::from_millis(10), move || h.fetch_add(1, Ordering::SeqCst) < 2);

        for _ in 0..5 {
            clock.advance(Duration::from_millis(10));
            events.lock_and_run_timers();
        }
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(events.timeout_count(), 0);
    }

    #[test]
    fn test_remove_timeout() {
        let (_clock, events) = setup();
        let token = events.add_timeout(Duration::from_secs(1), || true);
        assert!(events.remove_timeout(token));
        assert!(!events.remove_timeout(token));
        assert_eq!(events.next_due(), None);
    }

    #[test]
    fn test_callback_can_add_timeout() {
        let (clock, events) = setup();
        let inner = events.clone();
        events.add_timeout(Duration::ZERO, move || {
            inner.add_timeout(Duration::from_secs(5), || false);
            false
        });
        clock.advance(Duration::from_millis(1));
        assert_eq!(events.lock_and_run_timers(), 1);
        assert_eq!(events.timeout_count(), 1);
        assert_eq!(events.next_due(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_idles_rerun_while_true() {
        let (_clock, events) = setup();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        events.add_idle(move || h.fetch_add(1, Ordering::SeqCst) == 0);
        let once = events.add_idle(|| false);

        assert_eq!(events.lock_and_run_idles(), 2);
        assert_eq!(events.idle_count(), 1);
        assert!(!events.remove_idle(once));
        assert_eq!(events.lock_and_run_idles(), 1);
        assert_eq!(events.idle_count(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
