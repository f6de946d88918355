//! The input thread's poll loop
//!
//! A [`ConsoleReader`] wraps the platform read primitive. [`ConsoleInput`]
//! polls it and pushes every unit onto the queue shared with the main loop.
//! The loop never stops on its own: only cancellation ends it, or a read
//! error, which is returned to whoever spawned the thread.

use std::time::Duration;

use log::{debug, error, info};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use super::key::{Key, KeyCode, Modifiers};
use crate::error::Result;

/// A unit of console input: a character, or a richer platform key record
pub trait InputUnit: Send + 'static {
    /// The character fed to the escape sequence parser
    fn as_char(&self) -> char;

    /// The key this unit stands for when released as ordinary input
    fn to_key(&self) -> Key;
}

impl InputUnit for char {
    fn as_char(&self) -> char {
        *self
    }

    fn to_key(&self) -> Key {
        Key::from_char(*self)
    }
}

/// A key event record as delivered by consoles that report keys rather than
/// bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRecord {
    pub ch: char,
    pub code: KeyCode,
    pub modifiers: Modifiers,
}

impl KeyRecord {
    pub fn from_char(ch: char) -> Self {
        let key = Key::from_char(ch);
        Self {
            ch,
            code: key.code,
            modifiers: key.modifiers,
        }
    }
}

impl InputUnit for KeyRecord {
    fn as_char(&self) -> char {
        self.ch
    }

    fn to_key(&self) -> Key {
        Key::new(self.code).with_modifiers(self.modifiers)
    }
}

/// Platform read primitive. Created and used on the input thread only.
pub trait ConsoleReader<T> {
    /// Whether input is available without blocking
    fn peek(&mut self) -> Result<bool>;

    /// Everything currently available
    fn read(&mut self) -> Result<Vec<T>>;
}

/// Poll loop feeding the shared input queue
pub struct ConsoleInput<T> {
    reader: Box<dyn ConsoleReader<T>>,
    queue: UnboundedSender<T>,
    poll_interval: Duration,
}

impl<T: InputUnit> ConsoleInput<T> {
    pub fn new(reader: Box<dyn ConsoleReader<T>>, queue: UnboundedSender<T>, poll_interval: Duration) -> Self {
        Self {
            reader,
            queue,
            poll_interval,
        }
    }

    /// Poll until `token` is cancelled
    pub fn run(&mut self, token: &CancellationToken) -> Result<()> {
        info!("Console input started");
        while !token.is_cancelled() {
            if let Err(e) = self.poll_once() {
                error!("Console input failed: {}", e);
                return Err(e);
            }
            std::thread::sleep(self.poll_interval);
        }
        info!("Console input stopped");
        Ok(())
    }

    /// One peek/read pass. Returns how many units were queued.
    pub fn poll_once(&mut self) -> Result<usize> {
        if !self.reader.peek()? {
            return Ok(0);
        }
        let units = self.reader.read()?;
        let count = units.len();
        for unit in units {
            if self.queue.send(unit).is_err() {
                // Main loop is gone; keep draining until cancelled
                debug!("Input queue closed, dropping unit");
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::input::headless::headless_input;
    use tokio::sync::mpsc;

    #[test]
    fn test_poll_once_queues_in_order() {
        let (reader, feed) = headless_input::<char>();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut input = ConsoleInput::new(Box::new(reader), tx, Duration::from_millis(1));

        assert_eq!(input.poll_once().unwrap(), 0);
        feed.push_str("abc");
        assert_eq!(input.poll_once().unwrap(), 3);
        let got: Vec<char> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(got, vec!['a', 'b', 'c']);
    }

    #[test]
    fn test_run_exits_on_cancel() {
        let (reader, _feed) = headless_input::<char>();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut input = ConsoleInput::new(Box::new(reader), tx, Duration::from_millis(1));
        let token = CancellationToken::new();
        token.cancel();
        assert!(input.run(&token).is_ok());
    }

    #[test]
    fn test_run_returns_read_error() {
        let (reader, feed) = headless_input::<char>();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut input = ConsoleInput::new(Box::new(reader), tx, Duration::from_millis(1));
        feed.fail_with("device gone");
        let err = input.run(&CancellationToken::new()).unwrap_err();
        assert!(matches!(err, Error::PlatformReadFailure(_)));
    }

    #[test]
    fn test_key_record_unit() {
        let record = KeyRecord {
            ch: 'x',
            code: KeyCode::Char('x'),
            modifiers: Modifiers::alt(),
        };
        assert_eq!(record.as_char(), 'x');
        assert_eq!(record.to_key(), Key::new(KeyCode::Char('x')).with_alt());
        assert_eq!(KeyRecord::from_char('\r').to_key(), Key::new(KeyCode::Enter));
    }
}
