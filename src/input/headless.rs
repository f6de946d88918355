//! In-memory console reader for tests and headless sessions

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::console::ConsoleReader;
use crate::error::{Error, Result};

struct Shared<T> {
    pending: VecDeque<T>,
    failure: Option<String>,
}

/// Reader side, handed to the input thread
pub struct HeadlessReader<T> {
    shared: Arc<Mutex<Shared<T>>>,
    dropped: Arc<AtomicBool>,
}

/// Feeding side, kept by the test or host
pub struct HeadlessFeed<T> {
    shared: Arc<Mutex<Shared<T>>>,
    dropped: Arc<AtomicBool>,
}

impl<T> Clone for HeadlessFeed<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            dropped: self.dropped.clone(),
        }
    }
}

/// Create a connected reader and feed
pub fn headless_input<T>() -> (HeadlessReader<T>, HeadlessFeed<T>) {
    let shared = Arc::new(Mutex::new(Shared {
        pending: VecDeque::new(),
        failure: None,
    }));
    let dropped = Arc::new(AtomicBool::new(false));
    (
        HeadlessReader {
            shared: shared.clone(),
            dropped: dropped.clone(),
        },
        HeadlessFeed { shared, dropped },
    )
}

fn lock<T>(shared: &Mutex<Shared<T>>) -> MutexGuard<'_, Shared<T>> {
    match shared.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl<T> HeadlessFeed<T> {
    pub fn push(&self, unit: T) {
        lock(&self.shared).pending.push_back(unit);
    }

    /// Make the next peek fail with `message`
    pub fn fail_with(&self, message: impl Into<String>) {
        lock(&self.shared).failure = Some(message.into());
    }

    /// Whether the reader has been dropped, i.e. the input thread is done
    /// with it
    pub fn is_reader_dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }
}

impl HeadlessFeed<char> {
    pub fn push_str(&self, s: &str) {
        lock(&self.shared).pending.extend(s.chars());
    }
}

impl<T> ConsoleReader<T> for HeadlessReader<T> {
    fn peek(&mut self) -> Result<bool> {
        let mut shared = lock(&self.shared);
        if let Some(message) = shared.failure.take() {
            return Err(Error::PlatformReadFailure(io::Error::new(io::ErrorKind::Other, message)));
        }
        Ok(!shared.pending.is_empty())
    }

    fn read(&mut self) -> Result<Vec<T>> {
        Ok(lock(&self.shared).pending.drain(..).collect())
    }
}

impl<T> Drop for HeadlessReader<T> {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}
