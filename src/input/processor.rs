//! Main-loop side of input handling
//!
//! Drains the queue filled by the input thread, runs every unit through the
//! response parser, and turns what comes out into key and mouse events.
//! Events go to the registered handlers first; whatever they leave
//! unhandled is queued for the application.

use std::collections::VecDeque;
use std::time::Duration;

use log::trace;
use tokio::sync::mpsc::UnboundedReceiver;

use super::console::InputUnit;
use super::interpreter::MouseInterpreter;
use super::key::{Key, KeyEvent};
use super::mouse::MouseEvent;
use crate::ansi::{AnsiResponseParser, ParsedEvent};
use crate::ansi::sequences::ESC;
use crate::clock::{system_clock, Clock};
use crate::config::RuntimeConfig;
use crate::events::EventHandlers;

/// An input event left unhandled by the handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    KeyDown(KeyEvent),
    KeyUp(KeyEvent),
    Mouse(MouseEvent),
}

pub struct InputProcessor<T> {
    parser: AnsiResponseParser<T>,
    queue: UnboundedReceiver<T>,
    mouse: MouseInterpreter,
    escape_timeout: Duration,
    clock: Clock,
    pending: VecDeque<InputEvent>,
    pub key_down: EventHandlers<KeyEvent>,
    pub key_up: EventHandlers<KeyEvent>,
    pub mouse_event: EventHandlers<MouseEvent>,
}

impl<T: InputUnit> InputProcessor<T> {
    pub fn new(queue: UnboundedReceiver<T>, config: &RuntimeConfig) -> Self {
        Self::with_clock(queue, config, system_clock())
    }

    pub fn with_clock(queue: UnboundedReceiver<T>, config: &RuntimeConfig, clock: Clock) -> Self {
        let mut parser = AnsiResponseParser::with_clock(clock.clone());
        parser.handle_mouse = config.handle_mouse;
        parser.handle_keyboard = config.handle_keyboard;
        let mouse = MouseInterpreter::with_clock(
            config.repeated_click_threshold(),
            config.drag_threshold,
            clock.clone(),
        );
        Self {
            parser,
            queue,
            mouse,
            escape_timeout: config.escape_timeout(),
            clock,
            pending: VecDeque::new(),
            key_down: EventHandlers::new(),
            key_up: EventHandlers::new(),
            mouse_event: EventHandlers::new(),
        }
    }

    pub fn parser(&self) -> &AnsiResponseParser<T> {
        &self.parser
    }

    pub fn parser_mut(&mut self) -> &mut AnsiResponseParser<T> {
        &mut self.parser
    }

    pub fn mouse_interpreter_mut(&mut self) -> &mut MouseInterpreter {
        &mut self.mouse
    }

    /// Process everything queued so far without blocking. Returns the number
    /// of units taken from the queue.
    pub fn process_queue(&mut self) -> usize {
        let mut count = 0;
        while let Ok(unit) = self.queue.try_recv() {
            count += 1;
            let ch = unit.as_char();
            let released = self.parser.process_input(ch, unit);
            self.dispatch_released(released);
            self.dispatch_parsed();
        }

        // A lone ESC or a truncated sequence: give it up as typed input
        if self.parser.has_held() {
            let held_for = (self.clock)().saturating_duration_since(self.parser.state_changed_at());
            if held_for >= self.escape_timeout {
                trace!("Releasing held input after {:?}", held_for);
                let released = self.parser.release();
                self.dispatch_released(released);
            }
        }

        self.mouse.tick();
        count
    }

    /// Resolve open mouse gestures, e.g. on shutdown or focus loss
    pub fn release_mouse(&mut self) {
        for gesture in self.mouse.release() {
            self.raise_mouse(gesture);
        }
    }

    /// Take the events no handler claimed
    pub fn take_events(&mut self) -> Vec<InputEvent> {
        self.pending.drain(..).collect()
    }

    fn dispatch_released(&mut self, released: Vec<(char, T)>) {
        // ESC immediately followed by a printable character is Alt+char
        if let [(first, _), (second, unit)] = released.as_slice() {
            if *first == ESC && !second.is_control() {
                let key = unit.to_key().with_alt();
                self.raise_key(key);
                return;
            }
        }
        for (_, unit) in released {
            self.raise_key(unit.to_key());
        }
    }

    fn dispatch_parsed(&mut self) {
        for event in self.parser.drain_events() {
            match event {
                ParsedEvent::Key(key) => self.raise_key(key),
                ParsedEvent::Mouse(mut report) => {
                    let gestures = self.mouse.process(&mut report);
                    self.raise_mouse(report);
                    for gesture in gestures {
                        self.raise_mouse(gesture);
                    }
                }
            }
        }
    }

    fn raise_key(&mut self, key: Key) {
        let mut down = KeyEvent::new(key);
        self.key_down.raise(&mut down);
        if !down.handled {
            self.pending.push_back(InputEvent::KeyDown(down));
        }

        let mut up = KeyEvent::new(key);
        self.key_up.raise(&mut up);
        if !up.handled {
            self.pending.push_back(InputEvent::KeyUp(up));
        }
    }

    fn raise_mouse(&mut self, mut event: MouseEvent) {
        self.mouse_event.raise(&mut event);
        if !event.handled {
            self.pending.push_back(InputEvent::Mouse(event));
        }
    }
}
