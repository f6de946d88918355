//! SGR mouse reports: `ESC [ < Pb ; Px ; Py M/m`
//!
//! `M` is a press (or motion), `m` a release. Coordinates on the wire are
//! 1-based and come out 0-based.

use crate::core::Point;
use crate::input::{MouseEvent, MouseFlags};

/// Stateless matcher for SGR mouse reports
#[derive(Debug, Clone, Copy, Default)]
pub struct AnsiMouseParser;

impl AnsiMouseParser {
    pub fn new() -> Self {
        Self
    }

    pub fn is_mouse(&self, seq: &str) -> bool {
        self.parse(seq).is_some()
    }

    /// Decode a complete captured report
    pub fn parse(&self, seq: &str) -> Option<MouseEvent> {
        let body = seq.strip_prefix("\x1b[<")?;
        let (params, pressed) = if let Some(p) = body.strip_suffix('M') {
            (p, true)
        } else {
            (body.strip_suffix('m')?, false)
        };

        let mut parts = params.split(';');
        let pb: u16 = parse_number(parts.next()?)?;
        let x: u16 = parse_number(parts.next()?)?;
        let y: u16 = parse_number(parts.next()?)?;
        if parts.next().is_some() {
            return None;
        }

        let flags = decode_sgr_button(pb, pressed) | decode_sgr_modifiers(pb);
        Some(MouseEvent::new(flags, Point::new(x.saturating_sub(1), y.saturating_sub(1))))
    }
}

fn parse_number(s: &str) -> Option<u16> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Decode the SGR button byte
fn decode_sgr_button(pb: u16, pressed: bool) -> MouseFlags {
    let button_bits = pb & 0x03;
    let motion = (pb & 0x20) != 0;

    if (pb & 0x40) != 0 {
        return match button_bits {
            0 => MouseFlags::WHEELED_UP,
            1 => MouseFlags::WHEELED_DOWN,
            2 => MouseFlags::WHEELED_LEFT,
            _ => MouseFlags::WHEELED_RIGHT,
        };
    }

    let button = if (pb & 0x80) != 0 {
        // Extra buttons 8-11; only the first maps onto button 4
        (button_bits == 0).then_some(3)
    } else {
        match button_bits {
            3 => None,
            b => Some(b as usize),
        }
    };

    let mut flags = MouseFlags::empty();
    if let Some(button) = button {
        flags |= if pressed {
            MouseFlags::pressed(button)
        } else {
            MouseFlags::released(button)
        };
    }
    if motion {
        flags |= MouseFlags::REPORT_MOUSE_POSITION;
    }
    flags
}

/// Decode SGR modifiers
fn decode_sgr_modifiers(pb: u16) -> MouseFlags {
    let mut flags = MouseFlags::empty();
    if (pb & 0x04) != 0 {
        flags |= MouseFlags::BUTTON_SHIFT;
    }
    if (pb & 0x08) != 0 {
        flags |= MouseFlags::BUTTON_ALT;
    }
    if (pb & 0x10) != 0 {
        flags |= MouseFlags::BUTTON_CTRL;
    }
    flags
}
