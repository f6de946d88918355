//! Terminal queries and their scheduling
//!
//! A request is an escape sequence written to the terminal whose answer
//! comes back through the input stream, ending with a known terminator. The
//! scheduler makes sure only one request per terminator is outstanding (the
//! answers would be indistinguishable otherwise), throttles repeats, and
//! gives up on requests the terminal never answered.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use log::{debug, warn};

use super::response_parser::{AbandonedCallback, AnsiResponseParser, ResponseCallback};
use super::sequences::CSI;
use crate::clock::{system_clock, Clock};
use crate::error::{Error, Result};
use crate::renderer::ConsoleOutput;

/// Minimum gap between two `run_schedule` passes
const RUN_SCHEDULE_THROTTLE: Duration = Duration::from_millis(100);

/// A query to send and the terminator of its answer
pub struct AnsiEscapeSequenceRequest {
    /// Text written to the terminal
    pub request: String,
    /// Suffix identifying the answer
    pub terminator: String,
    on_response: ResponseCallback,
    on_abandoned: Option<AbandonedCallback>,
}

impl AnsiEscapeSequenceRequest {
    pub fn new(
        request: impl Into<String>,
        terminator: impl Into<String>,
        on_response: impl FnMut(&str) + 'static,
    ) -> Self {
        Self {
            request: request.into(),
            terminator: terminator.into(),
            on_response: Box::new(on_response),
            on_abandoned: None,
        }
    }

    /// Well-known queries by name:
    /// - `cursor_position`: `CSI 6n`, answered by `CSI row;col R`
    /// - `device_attributes`: `CSI c`, answered by `CSI ? ... c`
    /// - `window_size`: `CSI 18t`, answered by `CSI 8;rows;cols t`
    pub fn named(name: &str, on_response: impl FnMut(&str) + 'static) -> Result<Self> {
        let (request, terminator) = match name {
            "cursor_position" => (format!("{}6n", CSI), "R"),
            "device_attributes" => (format!("{}c", CSI), "c"),
            "window_size" => (format!("{}18t", CSI), "t"),
            other => return Err(Error::UnknownCommand(other.to_string())),
        };
        Ok(Self::new(request, terminator, on_response))
    }

    /// Called if the request is given up on before an answer arrives
    pub fn on_abandoned(mut self, on_abandoned: impl FnMut() + 'static) -> Self {
        self.on_abandoned = Some(Box::new(on_abandoned));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReasonCannotSend {
    TooManyRequests,
    OutstandingRequest,
}

/// Sends requests when the terminator is free, queues them otherwise
pub struct AnsiRequestScheduler {
    clock: Clock,
    throttle: Duration,
    stale_timeout: Duration,
    queued: VecDeque<(AnsiEscapeSequenceRequest, Instant)>,
    last_send: HashMap<String, Instant>,
    last_run: Option<Instant>,
}

impl AnsiRequestScheduler {
    pub fn new(throttle: Duration, stale_timeout: Duration) -> Self {
        Self::with_clock(throttle, stale_timeout, system_clock())
    }

    pub fn with_clock(throttle: Duration, stale_timeout: Duration, clock: Clock) -> Self {
        Self {
            clock,
            throttle,
            stale_timeout,
            queued: VecDeque::new(),
            last_send: HashMap::new(),
            last_run: None,
        }
    }

    /// Number of requests waiting for their terminator to become free
    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    /// Send `request` now if possible, else queue it. Returns whether it
    /// was sent.
    pub fn send_or_schedule<T>(
        &mut self,
        request: AnsiEscapeSequenceRequest,
        parser: &mut AnsiResponseParser<T>,
        output: &mut dyn ConsoleOutput,
    ) -> Result<bool> {
        match self.try_send(request, parser, output)? {
            None => Ok(true),
            Some(request) => {
                debug!("Queued terminal request for {:?}", request.terminator);
                let now = (self.clock)();
                self.queued.push_back((request, now));
                Ok(false)
            }
        }
    }

    /// Retry the oldest queued request. Skipped if the last pass was less
    /// than 100ms ago unless `force` is set.
    pub fn run_schedule<T>(
        &mut self,
        force: bool,
        parser: &mut AnsiResponseParser<T>,
        output: &mut dyn ConsoleOutput,
    ) -> Result<bool> {
        let now = (self.clock)();
        if !force {
            if let Some(last) = self.last_run {
                if now.duration_since(last) < RUN_SCHEDULE_THROTTLE {
                    return Ok(false);
                }
            }
        }
        self.last_run = Some(now);

        let Some((request, queued_at)) = self.queued.pop_front() else {
            return Ok(false);
        };
        match self.try_send(request, parser, output)? {
            None => Ok(true),
            Some(request) => {
                self.queued.push_front((request, queued_at));
                Ok(false)
            }
        }
    }

    /// Hands the request back when it cannot be sent yet
    fn try_send<T>(
        &mut self,
        request: AnsiEscapeSequenceRequest,
        parser: &mut AnsiResponseParser<T>,
        output: &mut dyn ConsoleOutput,
    ) -> Result<Option<AnsiEscapeSequenceRequest>> {
        match self.can_send(&request, parser) {
            Ok(()) => {}
            Err(ReasonCannotSend::OutstandingRequest) if self.evict_stale(&request.terminator, parser) => {}
            Err(_) => return Ok(Some(request)),
        }
        self.send(request, parser, output)?;
        Ok(None)
    }

    fn can_send<T>(
        &self,
        request: &AnsiEscapeSequenceRequest,
        parser: &AnsiResponseParser<T>,
    ) -> std::result::Result<(), ReasonCannotSend> {
        let now = (self.clock)();
        if let Some(sent) = self.last_send.get(&request.terminator) {
            if now.duration_since(*sent) < self.throttle {
                return Err(ReasonCannotSend::TooManyRequests);
            }
        }
        if parser.is_expecting(&request.terminator) {
            return Err(ReasonCannotSend::OutstandingRequest);
        }
        Ok(())
    }

    /// Abandon the outstanding request for `terminator` if the terminal has
    /// not answered it within the stale timeout
    fn evict_stale<T>(&mut self, terminator: &str, parser: &mut AnsiResponseParser<T>) -> bool {
        let now = (self.clock)();
        match self.last_send.get(terminator) {
            Some(sent) if now.duration_since(*sent) > self.stale_timeout => {
                warn!("Terminal never answered request for {:?}; abandoning it", terminator);
                parser.stop_expecting(terminator, true);
                true
            }
            _ => false,
        }
    }

    fn send<T>(
        &mut self,
        request: AnsiEscapeSequenceRequest,
        parser: &mut AnsiResponseParser<T>,
        output: &mut dyn ConsoleOutput,
    ) -> Result<()> {
        let now = (self.clock)();
        self.last_send.insert(request.terminator.clone(), now);
        parser.expect_response(
            request.terminator.clone(),
            request.on_response,
            request.on_abandoned,
            false,
        )?;
        output.write_str(&request.request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::core::Size;
    use crate::renderer::{AnsiOutput, CaptureWriter};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn setup() -> (ManualClock, AnsiRequestScheduler, AnsiResponseParser<()>, AnsiOutput<CaptureWriter>, CaptureWriter) {
        let manual = ManualClock::new();
        let scheduler = AnsiRequestScheduler::with_clock(
            Duration::from_millis(100),
            Duration::from_secs(1),
            manual.clock(),
        );
        let parser = AnsiResponseParser::<()>::with_clock(manual.clock());
        let capture = CaptureWriter::new();
        let output = AnsiOutput::new(capture.clone(), Size::new(80, 24));
        (manual, scheduler, parser, output, capture)
    }

    #[test]
    fn test_named_requests() {
        let req = AnsiEscapeSequenceRequest::named("cursor_position", |_| {}).unwrap();
        assert_eq!(req.request, "\x1b[6n");
        assert_eq!(req.terminator, "R");
        let err = AnsiEscapeSequenceRequest::named("beep", |_| {}).err().unwrap();
        assert!(matches!(err, Error::UnknownCommand(name) if name == "beep"));
    }

    #[test]
    fn test_send_registers_expectation_and_writes() {
        let (_clock, mut scheduler, mut parser, mut output, capture) = setup();
        let answer = Rc::new(RefCell::new(String::new()));
        let a = answer.clone();
        let req = AnsiEscapeSequenceRequest::new("\x1b[6n", "R", move |s| *a.borrow_mut() = s.to_string());

        assert!(scheduler.send_or_schedule(req, &mut parser, &mut output).unwrap());
        assert_eq!(capture.contents(), "\x1b[6n");
        assert!(parser.is_expecting("R"));

        assert_eq!(parser.process_str("\x1b[3;7R"), "");
        assert_eq!(*answer.borrow(), "\x1b[3;7R");
    }

    #[test]
    fn test_outstanding_request_is_queued_then_sent() {
        let (clock, mut scheduler, mut parser, mut output, capture) = setup();
        let first = AnsiEscapeSequenceRequest::new("\x1b[c", "c", |_| {});
        let second = AnsiEscapeSequenceRequest::new("\x1b[c", "c", |_| {});

        assert!(scheduler.send_or_schedule(first, &mut parser, &mut output).unwrap());
        clock.advance(Duration::from_millis(150));
        assert!(!scheduler.send_or_schedule(second, &mut parser, &mut output).unwrap());
        assert_eq!(scheduler.queued_len(), 1);

        // Answer arrives, freeing the terminator
        assert_eq!(parser.process_str("\x1b[?1c"), "");
        assert!(scheduler.run_schedule(true, &mut parser, &mut output).unwrap());
        assert_eq!(scheduler.queued_len(), 0);
        assert_eq!(capture.contents(), "\x1b[c\x1b[c");
    }

    #[test]
    fn test_throttle() {
        let (_clock, mut scheduler, mut parser, mut output, _capture) = setup();
        let first = AnsiEscapeSequenceRequest::new("\x1b[6n", "R", |_| {});
        let second = AnsiEscapeSequenceRequest::new("\x1b[6n", "R", |_| {});
        assert!(scheduler.send_or_schedule(first, &mut parser, &mut output).unwrap());
        parser.process_str("\x1b[1;1R");
        // Answered, but still inside the throttle window
        assert!(!scheduler.send_or_schedule(second, &mut parser, &mut output).unwrap());
    }

    #[test]
    fn test_stale_request_is_evicted() {
        let (clock, mut scheduler, mut parser, mut output, _capture) = setup();
        let abandoned = Rc::new(RefCell::new(false));
        let a = abandoned.clone();
        let first = AnsiEscapeSequenceRequest::new("\x1b[c", "c", |_| {}).on_abandoned(move || *a.borrow_mut() = true);
        let second = AnsiEscapeSequenceRequest::new("\x1b[c", "c", |_| {});

        assert!(scheduler.send_or_schedule(first, &mut parser, &mut output).unwrap());
        clock.advance(Duration::from_secs(2));
        assert!(scheduler.send_or_schedule(second, &mut parser, &mut output).unwrap());
        assert!(*abandoned.borrow());
    }

    #[test]
    fn test_run_schedule_throttled() {
        let (clock, mut scheduler, mut parser, mut output, _capture) = setup();
        assert!(!scheduler.run_schedule(false, &mut parser, &mut output).unwrap());
        clock.advance(Duration::from_millis(10));
        let req = AnsiEscapeSequenceRequest::new("\x1b[c", "c", |_| {});
        scheduler.queued.push_back((req, clock.now()));
        assert!(!scheduler.run_schedule(false, &mut parser, &mut output).unwrap());
        assert_eq!(scheduler.queued_len(), 1);
        clock.advance(Duration::from_millis(100));
        assert!(scheduler.run_schedule(false, &mut parser, &mut output).unwrap());
    }
}
