//! Mouse gestures
//!
//! Terminals report presses and releases; applications want clicks. Each
//! button has its own [`MouseButtonSequence`] that exists from the first
//! press until the gesture is over:
//!
//! - press, release: `CLICKED`, emitted on the release
//! - another press at the same spot within the repeat window, release:
//!   `DOUBLE_CLICKED`, then `TRIPLE_CLICKED`
//! - press, move past the drag threshold, release: no click
//!
//! A sequence stays alive for the repeat window after its last release so a
//! follow-up press can extend it. [`MouseInterpreter::tick`] retires
//! sequences whose window has passed.

use std::time::{Duration, Instant};

use log::trace;

use super::mouse::{HitTest, MouseEvent, MouseFlags, ViewHit, BUTTON_COUNT};
use crate::clock::{system_clock, Clock};
use crate::core::Point;

/// One observed transition of a button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonStateRecord {
    pub pressed: bool,
    pub position: Point,
    pub view: Option<ViewHit>,
    pub at: Instant,
}

/// Gesture state of a single button between its first press and resolution
#[derive(Debug, Clone)]
pub struct MouseButtonSequence {
    button: usize,
    records: Vec<ButtonStateRecord>,
    pressed: bool,
    clicks: u32,
    press_origin: Point,
    last_position: Point,
    dragged: bool,
    last_release: Option<Instant>,
}

impl MouseButtonSequence {
    fn start(button: usize, position: Point, view: Option<ViewHit>, at: Instant) -> Self {
        Self {
            button,
            records: vec![ButtonStateRecord {
                pressed: true,
                position,
                view,
                at,
            }],
            pressed: true,
            clicks: 0,
            press_origin: position,
            last_position: position,
            dragged: false,
            last_release: None,
        }
    }

    pub fn button(&self) -> usize {
        self.button
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// Clicks completed so far
    pub fn clicks(&self) -> u32 {
        self.clicks
    }

    pub fn records(&self) -> &[ButtonStateRecord] {
        &self.records
    }

    /// Whether a press at `position` at `now` continues this sequence
    fn accepts_press(&self, position: Point, now: Instant, window: Duration) -> bool {
        // A triple click ends the sequence
        if self.pressed || self.dragged || self.clicks >= 3 {
            return false;
        }
        match self.last_release {
            Some(released) => position == self.last_position && now.duration_since(released) <= window,
            None => false,
        }
    }

    /// Whether nothing more can happen in this sequence
    fn is_finished(&self, now: Instant, window: Duration) -> bool {
        if self.pressed {
            return false;
        }
        if self.dragged || self.clicks >= 3 {
            return true;
        }
        match self.last_release {
            Some(released) => now.duration_since(released) > window,
            None => true,
        }
    }

    /// Apply one report. Returns the click count when the report completes
    /// a click.
    fn process(
        &mut self,
        position: Point,
        pressed: bool,
        view: Option<ViewHit>,
        at: Instant,
        drag_threshold: u16,
    ) -> Option<u32> {
        match (self.pressed, pressed) {
            (true, true) => {
                // Held down: only movement matters
                if self.press_origin.distance(position) > drag_threshold {
                    self.dragged = true;
                }
                self.last_position = position;
                None
            }
            (false, false) => None,
            (false, true) => {
                self.records.push(ButtonStateRecord { pressed, position, view, at });
                self.pressed = true;
                self.press_origin = position;
                self.last_position = position;
                None
            }
            (true, false) => {
                self.records.push(ButtonStateRecord { pressed, position, view, at });
                self.pressed = false;
                self.last_release = Some(at);
                self.last_position = position;
                if self.press_origin.distance(position) > drag_threshold {
                    self.dragged = true;
                }
                if self.dragged {
                    None
                } else {
                    self.clicks += 1;
                    Some(self.clicks)
                }
            }
        }
    }
}

/// Turns raw press/release reports into click gestures for four buttons
pub struct MouseInterpreter {
    sequences: [Option<MouseButtonSequence>; BUTTON_COUNT],
    repeated_click_threshold: Duration,
    drag_threshold: u16,
    clock: Clock,
    hit_test: Option<HitTest>,
}

impl MouseInterpreter {
    pub fn new(repeated_click_threshold: Duration, drag_threshold: u16) -> Self {
        Self::with_clock(repeated_click_threshold, drag_threshold, system_clock())
    }

    pub fn with_clock(repeated_click_threshold: Duration, drag_threshold: u16, clock: Clock) -> Self {
        Self {
            sequences: Default::default(),
            repeated_click_threshold,
            drag_threshold,
            clock,
            hit_test: None,
        }
    }

    /// Install the lookup used to fill [`MouseEvent::view`]
    pub fn set_hit_test(&mut self, hit_test: impl Fn(Point) -> Option<ViewHit> + 'static) {
        self.hit_test = Some(Box::new(hit_test));
    }

    /// The open sequence of a zero-based button, if any
    pub fn sequence(&self, button: usize) -> Option<&MouseButtonSequence> {
        self.sequences.get(button).and_then(Option::as_ref)
    }

    /// Feed a raw report. Fills in its view and returns the gesture events
    /// it completes.
    pub fn process(&mut self, event: &mut MouseEvent) -> Vec<MouseEvent> {
        let now = (self.clock)();
        let view = self.hit(event.position);
        event.view = view;

        let mut gestures = Vec::new();
        for button in 0..BUTTON_COUNT {
            let pressed = event.flags.contains(MouseFlags::pressed(button));
            let released = event.flags.contains(MouseFlags::released(button));
            if !pressed && !released {
                continue;
            }

            let slot = &mut self.sequences[button];
            if pressed {
                let continues = slot.as_ref().is_some_and(|seq| {
                    seq.is_pressed() || seq.accepts_press(event.position, now, self.repeated_click_threshold)
                });
                if !continues {
                    *slot = Some(MouseButtonSequence::start(button, event.position, view, now));
                    continue;
                }
            }

            let Some(seq) = slot.as_mut() else {
                // Release with no press seen
                continue;
            };
            if let Some(count) = seq.process(event.position, pressed, view, now, self.drag_threshold) {
                trace!("Button {} click #{} at {:?}", button + 1, count, event.position);
                let mut click = MouseEvent::new(
                    MouseFlags::click(button, count) | event.flags.modifiers(),
                    event.position,
                );
                click.view = view;
                gestures.push(click);
            }
            if seq.dragged && !seq.pressed {
                *slot = None;
            }
        }
        gestures
    }

    /// Drop sequences whose repeat window has passed
    pub fn tick(&mut self) {
        let now = (self.clock)();
        for slot in &mut self.sequences {
            if slot
                .as_ref()
                .is_some_and(|seq| seq.is_finished(now, self.repeated_click_threshold))
            {
                *slot = None;
            }
        }
    }

    /// Resolve every open sequence now. A button still held completes its
    /// click; clicks already emitted are not repeated.
    pub fn release(&mut self) -> Vec<MouseEvent> {
        let now = (self.clock)();
        let mut gestures = Vec::new();
        for button in 0..BUTTON_COUNT {
            let Some(mut seq) = self.sequences[button].take() else {
                continue;
            };
            if !seq.is_pressed() {
                continue;
            }
            let position = seq.last_position;
            let view = self.hit(position);
            if let Some(count) = seq.process(position, false, view, now, self.drag_threshold) {
                let mut click = MouseEvent::new(MouseFlags::click(button, count), position);
                click.view = view;
                gestures.push(click);
            }
        }
        gestures
    }

    fn hit(&self, position: Point) -> Option<ViewHit> {
        self.hit_test.as_ref().and_then(|hit| hit(position))
    }
}
