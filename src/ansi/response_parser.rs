//! ANSI response parser
//!
//! Terminal replies (cursor position reports, device attributes, mouse
//! reports) arrive on the same channel as the user's keystrokes, with no
//! framing. This parser scans input one unit at a time and decides, per
//! unit, whether to release it to the caller as ordinary input or to hold it
//! as part of a possible escape sequence.
//!
//! Each unit is a character plus opaque metadata `T` (e.g. the platform key
//! record it came from); released units are handed back with their metadata
//! untouched. Use `T = ()` and [`AnsiResponseParser::process_str`] for plain
//! text.
//!
//! Held content leaves the parser in exactly one of these ways:
//! - a mouse or key grammar matches: a [`ParsedEvent`] is queued;
//! - a registered expectation matches (suffix match on its terminator): its
//!   callback receives the captured text;
//! - an abandoned ("late") expectation matches: the text is swallowed;
//! - a known terminator ends an unexpected sequence: the unknown-response
//!   handler decides between swallowing and releasing it verbatim;
//! - [`AnsiResponseParser::release`] is called after an inactivity timeout.

use std::collections::VecDeque;
use std::time::Instant;

use log::debug;

use super::keyboard::AnsiKeyboardParser;
use super::mouse::AnsiMouseParser;
use super::sequences::{is_known_terminator, ESC};
use crate::clock::{system_clock, Clock};
use crate::error::{Error, Result};
use crate::input::{Key, MouseEvent};

/// Abandoned expectations kept for swallowing late replies; the oldest go
/// first so a terminal that never answers cannot grow the list
const MAX_LATE: usize = 16;

/// Parser state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Plain input, released as it arrives
    Normal,
    /// Saw ESC, waiting for `[` or `O`
    ExpectingEscapeSequence,
    /// Inside a CSI/SS3 sequence, waiting for its terminator
    InResponse,
}

/// Semantic events recognized inside held sequences
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedEvent {
    Key(Key),
    Mouse(MouseEvent),
}

/// Receives the full captured sequence of a matched expectation
pub type ResponseCallback = Box<dyn FnMut(&str)>;
/// Invoked when an expectation is abandoned
pub type AbandonedCallback = Box<dyn FnMut()>;
/// Decides what to do with an unexpected sequence: `true` swallows it,
/// `false` releases it as ordinary input
pub type UnknownResponseHandler = Box<dyn FnMut(&str) -> bool>;

struct Expectation {
    terminator: String,
    on_complete: ResponseCallback,
    on_abandoned: Option<AbandonedCallback>,
}

impl Expectation {
    fn matches(&self, captured: &str) -> bool {
        captured.ends_with(&self.terminator)
    }
}

/// Character-at-a-time escape sequence disambiguator
pub struct AnsiResponseParser<T> {
    state: ParserState,
    state_changed_at: Instant,
    clock: Clock,
    held: Vec<(char, T)>,
    /// Text of `held`, kept in step for suffix matching
    held_text: String,
    expected: Vec<Expectation>,
    late: Vec<Expectation>,
    persistent: Vec<Expectation>,
    unknown_response_handler: UnknownResponseHandler,
    /// Recognize SGR mouse reports
    pub handle_mouse: bool,
    /// Recognize cursor and function key sequences
    pub handle_keyboard: bool,
    keyboard: AnsiKeyboardParser,
    mouse: AnsiMouseParser,
    events: VecDeque<ParsedEvent>,
}

impl<T> AnsiResponseParser<T> {
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    pub fn with_clock(clock: Clock) -> Self {
        let now = clock();
        Self {
            state: ParserState::Normal,
            state_changed_at: now,
            clock,
            held: Vec::with_capacity(32),
            held_text: String::with_capacity(32),
            expected: Vec::new(),
            late: Vec::new(),
            persistent: Vec::new(),
            unknown_response_handler: Box::new(|_| false),
            handle_mouse: false,
            handle_keyboard: false,
            keyboard: AnsiKeyboardParser::new(),
            mouse: AnsiMouseParser::new(),
            events: VecDeque::new(),
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// When the parser last changed state
    pub fn state_changed_at(&self) -> Instant {
        self.state_changed_at
    }

    /// Whether anything is currently held back
    pub fn has_held(&self) -> bool {
        !self.held.is_empty()
    }

    /// Replace the policy for unexpected sequences
    pub fn set_unknown_response_handler(&mut self, handler: impl FnMut(&str) -> bool + 'static) {
        self.unknown_response_handler = Box::new(handler);
    }

    /// Feed one unit. Returns the units to release to the caller now, in
    /// input order.
    pub fn process_input(&mut self, ch: char, meta: T) -> Vec<(char, T)> {
        let mut released = Vec::new();

        match self.state {
            ParserState::Normal => {
                if ch == ESC {
                    self.hold(ch, meta);
                    self.set_state(ParserState::ExpectingEscapeSequence);
                } else {
                    released.push((ch, meta));
                }
            }
            ParserState::ExpectingEscapeSequence => {
                if ch == ESC {
                    // The previous ESC stood alone
                    self.release_held(&mut released);
                    self.hold(ch, meta);
                    self.set_state(ParserState::ExpectingEscapeSequence);
                } else if ch == '[' || ch == 'O' {
                    self.hold(ch, meta);
                    self.set_state(ParserState::InResponse);
                } else {
                    // ESC followed by ordinary input is not a sequence
                    self.hold(ch, meta);
                    self.release_held(&mut released);
                    self.set_state(ParserState::Normal);
                }
            }
            ParserState::InResponse => {
                if ch == ESC {
                    // A new sequence starts before the old one finished
                    self.release_held(&mut released);
                    self.hold(ch, meta);
                    self.set_state(ParserState::ExpectingEscapeSequence);
                } else {
                    self.hold(ch, meta);
                    if self.should_release_held() {
                        self.release_held(&mut released);
                        self.set_state(ParserState::Normal);
                    }
                }
            }
        }

        released
    }

    /// Force out everything held and return to `Normal`. Called by the
    /// owner once the held content has been stale for the escape timeout.
    pub fn release(&mut self) -> Vec<(char, T)> {
        let mut released = Vec::with_capacity(self.held.len());
        self.release_held(&mut released);
        self.set_state(ParserState::Normal);
        released
    }

    /// Take the key and mouse events recognized so far
    pub fn drain_events(&mut self) -> Vec<ParsedEvent> {
        self.events.drain(..).collect()
    }

    /// Register interest in a response ending with `terminator`.
    ///
    /// A non-persistent expectation is consumed by its first match; a
    /// persistent one keeps matching until removed with
    /// [`stop_expecting_persistent`](Self::stop_expecting_persistent).
    pub fn expect_response(
        &mut self,
        terminator: impl Into<String>,
        on_complete: impl FnMut(&str) + 'static,
        on_abandoned: Option<AbandonedCallback>,
        persistent: bool,
    ) -> Result<()> {
        let terminator = terminator.into();
        if terminator.is_empty() {
            return Err(Error::Ambiguous("an empty terminator matches every response".into()));
        }
        let expectation = Expectation {
            terminator,
            on_complete: Box::new(on_complete),
            on_abandoned,
        };
        if persistent {
            self.persistent.push(expectation);
        } else {
            self.expected.push(expectation);
        }
        Ok(())
    }

    /// Abandon live expectations for `terminator`. A response that still
    /// arrives for them is swallowed without reaching any callback.
    pub fn stop_expecting(&mut self, terminator: &str, invoke_abandoned: bool) {
        let (stopped, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.expected)
            .into_iter()
            .partition(|e| e.terminator == terminator);
        self.expected = kept;

        for mut expectation in stopped {
            if invoke_abandoned {
                if let Some(on_abandoned) = expectation.on_abandoned.as_mut() {
                    on_abandoned();
                }
            }
            self.late.push(expectation);
        }
        if self.late.len() > MAX_LATE {
            let excess = self.late.len() - MAX_LATE;
            debug!("Forgetting {} abandoned expectations", excess);
            self.late.drain(..excess);
        }
    }

    /// Abandoned expectations still waiting to swallow a late reply
    pub fn abandoned_len(&self) -> usize {
        self.late.len()
    }

    /// Remove persistent expectations for `terminator`
    pub fn stop_expecting_persistent(&mut self, terminator: &str) {
        self.persistent.retain(|e| e.terminator != terminator);
    }

    /// Whether a live non-persistent expectation exists for `terminator`
    pub fn is_expecting(&self, terminator: &str) -> bool {
        self.expected.iter().any(|e| e.terminator == terminator)
    }

    fn hold(&mut self, ch: char, meta: T) {
        self.held.push((ch, meta));
        self.held_text.push(ch);
    }

    fn release_held(&mut self, released: &mut Vec<(char, T)>) {
        released.append(&mut self.held);
        self.held_text.clear();
    }

    fn set_state(&mut self, state: ParserState) {
        self.state = state;
        self.state_changed_at = (self.clock)();
    }

    /// Drop held content (it has been consumed) and go back to `Normal`
    fn swallow_held(&mut self) {
        self.held.clear();
        self.held_text.clear();
        self.set_state(ParserState::Normal);
    }

    /// Decide what to do with the held sequence after a new unit.
    /// Returns true when it should be released as ordinary input.
    fn should_release_held(&mut self) -> bool {
        let captured = std::mem::take(&mut self.held_text);
        let release = self.resolve_captured(&captured);
        if !self.held.is_empty() {
            self.held_text = captured;
        }
        release
    }

    fn resolve_captured(&mut self, captured: &str) -> bool {
        if self.handle_mouse {
            if let Some(event) = self.mouse.parse(captured) {
                self.events.push_back(ParsedEvent::Mouse(event));
                self.swallow_held();
                return false;
            }
        }

        if self.handle_keyboard {
            if let Some(key) = self.keyboard.parse(captured) {
                self.events.push_back(ParsedEvent::Key(key));
                self.swallow_held();
                return false;
            }
        }

        if let Some(i) = self.expected.iter().position(|e| e.matches(captured)) {
            let mut expectation = self.expected.remove(i);
            // An answered request supersedes any abandoned one for the same terminator
            self.late.retain(|l| l.terminator != expectation.terminator);
            self.swallow_held();
            (expectation.on_complete)(captured);
            return false;
        }

        if let Some(i) = self.late.iter().position(|e| e.matches(captured)) {
            let late = self.late.remove(i);
            debug!("Swallowed late response for terminator {:?}", late.terminator);
            self.swallow_held();
            return false;
        }

        if let Some(i) = self.persistent.iter().position(|e| e.matches(captured)) {
            self.swallow_held();
            (self.persistent[i].on_complete)(captured);
            return false;
        }

        match captured.chars().last() {
            Some(last) if is_known_terminator(last) => {
                if (self.unknown_response_handler)(captured) {
                    debug!("Swallowed unknown response {:?}", captured);
                    self.swallow_held();
                    false
                } else {
                    true
                }
            }
            // Keep accumulating
            _ => false,
        }
    }
}

impl AnsiResponseParser<()> {
    /// Feed a string, returning what should be treated as ordinary input
    pub fn process_str(&mut self, input: &str) -> String {
        input
            .chars()
            .flat_map(|ch| self.process_input(ch, ()))
            .map(|(ch, _)| ch)
            .collect()
    }

    /// [`release`](Self::release) as a string
    pub fn release_str(&mut self) -> String {
        self.release().into_iter().map(|(ch, _)| ch).collect()
    }
}

impl<T> Default for AnsiResponseParser<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::input::{KeyCode, MouseFlags};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    type Log = Rc<RefCell<Vec<String>>>;

    fn recorder() -> (Log, impl FnMut(&str) + 'static) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let l = log.clone();
        (log, move |s: &str| l.borrow_mut().push(s.to_string()))
    }

    #[test]
    fn test_plain_text_passes_through() {
        let mut parser = AnsiResponseParser::<()>::new();
        assert_eq!(parser.process_str("hello"), "hello");
        assert_eq!(parser.state(), ParserState::Normal);
    }

    #[test]
    fn test_esc_followed_by_text_is_released() {
        let mut parser = AnsiResponseParser::<()>::new();
        assert_eq!(parser.process_str("\x1b"), "");
        assert_eq!(parser.state(), ParserState::ExpectingEscapeSequence);
        assert_eq!(parser.process_str("x"), "\x1bx");
        assert_eq!(parser.state(), ParserState::Normal);
    }

    #[test]
    fn test_chunking_does_not_change_output() {
        let input = "ab\x1b[?1;2cde\x1b[0cf";
        for chunk in 1..=input.len() {
            let mut parser = AnsiResponseParser::<()>::new();
            let (log, cb) = recorder();
            parser.expect_response("c", cb, None, false).unwrap();

            let chars: Vec<char> = input.chars().collect();
            let mut released = String::new();
            for piece in chars.chunks(chunk) {
                let piece: String = piece.iter().collect();
                released.push_str(&parser.process_str(&piece));
            }

            // The second response is unexpected and released verbatim
            assert_eq!(released, "abde\x1b[0cf", "chunk size {}", chunk);
            assert_eq!(*log.borrow(), vec!["\x1b[?1;2c".to_string()]);
        }
    }

    #[test]
    fn test_expectation_is_consumed_once() {
        let mut parser = AnsiResponseParser::<()>::new();
        let (log, cb) = recorder();
        parser.expect_response("R", cb, None, false).unwrap();
        assert!(parser.is_expecting("R"));

        assert_eq!(parser.process_str("\x1b[12;40R"), "");
        assert!(!parser.is_expecting("R"));
        assert_eq!(parser.process_str("\x1b[12;40R"), "\x1b[12;40R");
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_persistent_expectation_matches_every_time() {
        let mut parser = AnsiResponseParser::<()>::new();
        let (log, cb) = recorder();
        parser.expect_response("m", cb, None, true).unwrap();

        for _ in 0..5 {
            assert_eq!(parser.process_str("\x1b[<0;3;4m"), "");
        }
        assert_eq!(log.borrow().len(), 5);

        parser.stop_expecting_persistent("m");
        assert_eq!(parser.process_str("\x1b[<0;3;4m"), "\x1b[<0;3;4m");
    }

    #[test]
    fn test_abandoned_expectations_are_bounded() {
        let mut parser = AnsiResponseParser::<()>::new();
        for _ in 0..40 {
            parser.expect_response("t", |_: &str| {}, None, false).unwrap();
            parser.stop_expecting("t", false);
        }
        assert_eq!(parser.abandoned_len(), MAX_LATE);

        for _ in 0..MAX_LATE {
            assert_eq!(parser.process_str("\x1b[8;24;80t"), "");
        }
        assert_eq!(parser.abandoned_len(), 0);
        assert_eq!(parser.process_str("\x1b[8;24;80t"), "\x1b[8;24;80t");
    }

    #[test]
    fn test_abandoned_expectation_never_fires() {
        let mut parser = AnsiResponseParser::<()>::new();
        let (log_a, cb_a) = recorder();
        let (log_b, cb_b) = recorder();

        parser.expect_response("c", cb_a, None, false).unwrap();
        parser.stop_expecting("c", false);
        parser.expect_response("c", cb_b, None, false).unwrap();

        assert_eq!(parser.process_str("\x1b[?1c"), "");
        assert!(log_a.borrow().is_empty());
        assert_eq!(log_b.borrow().len(), 1);

        // Nothing is waiting any more
        assert_eq!(parser.process_str("\x1b[?1c"), "\x1b[?1c");
        assert!(log_a.borrow().is_empty());
        assert_eq!(log_b.borrow().len(), 1);
    }

    #[test]
    fn test_late_response_is_swallowed() {
        let mut parser = AnsiResponseParser::<()>::new();
        let (log, cb) = recorder();
        let abandoned = Rc::new(RefCell::new(0));
        let a = abandoned.clone();

        parser
            .expect_response("c", cb, Some(Box::new(move || *a.borrow_mut() += 1)), false)
            .unwrap();
        parser.stop_expecting("c", true);
        assert_eq!(*abandoned.borrow(), 1);

        assert_eq!(parser.process_str("x\x1b[?1cy"), "xy");
        assert!(log.borrow().is_empty());
        // The late slot is used up
        assert_eq!(parser.process_str("\x1b[?1c"), "\x1b[?1c");
    }

    #[test]
    fn test_lone_esc_is_released_manually() {
        let manual = ManualClock::new();
        let mut parser = AnsiResponseParser::<()>::with_clock(manual.clock());
        let before = parser.state_changed_at();
        manual.advance(Duration::from_millis(10));

        assert_eq!(parser.process_str("\x1b"), "");
        assert!(parser.has_held());
        assert!(parser.state_changed_at() > before);

        assert_eq!(parser.release_str(), "\x1b");
        assert_eq!(parser.state(), ParserState::Normal);
        assert!(!parser.has_held());
    }

    #[test]
    fn test_partial_sequence_is_released_manually() {
        let mut parser = AnsiResponseParser::<()>::new();
        assert_eq!(parser.process_str("\x1b[12;"), "");
        assert_eq!(parser.state(), ParserState::InResponse);
        assert_eq!(parser.release_str(), "\x1b[12;");
    }

    #[test]
    fn test_unknown_handler_can_swallow() {
        let mut parser = AnsiResponseParser::<()>::new();
        let (log, cb) = recorder();
        let mut cb = cb;
        parser.set_unknown_response_handler(move |s| {
            cb(s);
            true
        });

        assert_eq!(parser.process_str("a\x1b[5nb"), "ab");
        assert_eq!(*log.borrow(), vec!["\x1b[5n".to_string()]);
    }

    #[test]
    fn test_unknown_sequences_keep_input_order() {
        let mut parser = AnsiResponseParser::<()>::new();
        assert_eq!(parser.process_str("1\x1b[5n2\x1b[6n3"), "1\x1b[5n2\x1b[6n3");
    }

    #[test]
    fn test_new_escape_inside_sequence_restarts() {
        let mut parser = AnsiResponseParser::<()>::new();
        let (log, cb) = recorder();
        parser.expect_response("R", cb, None, false).unwrap();

        assert_eq!(parser.process_str("\x1b[12"), "");
        assert_eq!(parser.process_str("\x1b[3;4R"), "\x1b[12");
        assert_eq!(*log.borrow(), vec!["\x1b[3;4R".to_string()]);
    }

    #[test]
    fn test_mouse_and_keyboard_events() {
        let mut parser = AnsiResponseParser::<()>::new();
        parser.handle_mouse = true;
        parser.handle_keyboard = true;

        assert_eq!(parser.process_str("\x1b[<0;10;5M\x1b[Aq"), "q");
        let events = parser.drain_events();
        assert_eq!(events.len(), 2);
        match &events[0] {
            ParsedEvent::Mouse(ev) => assert_eq!(ev.flags, MouseFlags::BUTTON1_PRESSED),
            other => panic!("expected mouse event, got {:?}", other),
        }
        assert_eq!(events[1], ParsedEvent::Key(Key::new(KeyCode::CursorUp)));
        assert!(parser.drain_events().is_empty());
    }

    #[test]
    fn test_grammars_disabled_fall_through() {
        let mut parser = AnsiResponseParser::<()>::new();
        assert_eq!(parser.process_str("\x1b[A"), "\x1b[A");
        assert!(parser.drain_events().is_empty());
    }

    #[test]
    fn test_metadata_travels_with_units() {
        let mut parser = AnsiResponseParser::<u32>::new();
        assert!(parser.process_input('\x1b', 1).is_empty());
        let released = parser.process_input('z', 2);
        assert_eq!(released, vec![('\x1b', 1), ('z', 2)]);
    }

    #[test]
    fn test_empty_terminator_rejected() {
        let mut parser = AnsiResponseParser::<()>::new();
        let err = parser.expect_response("", |_| {}, None, false).unwrap_err();
        assert!(matches!(err, Error::Ambiguous(_)));
    }
}
