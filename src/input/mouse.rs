//! Mouse values shared by the SGR parser and the gesture interpreter

use serde::{Deserialize, Serialize};

use crate::core::Point;
use crate::events::Handled;

/// Number of buttons tracked independently by the interpreter
pub const BUTTON_COUNT: usize = 4;

bitflags::bitflags! {
    /// Button state, gesture and modifier bits of a mouse event
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct MouseFlags: u32 {
        const BUTTON1_PRESSED = 1 << 0;
        const BUTTON1_RELEASED = 1 << 1;
        const BUTTON1_CLICKED = 1 << 2;
        const BUTTON1_DOUBLE_CLICKED = 1 << 3;
        const BUTTON1_TRIPLE_CLICKED = 1 << 4;
        const BUTTON2_PRESSED = 1 << 5;
        const BUTTON2_RELEASED = 1 << 6;
        const BUTTON2_CLICKED = 1 << 7;
        const BUTTON2_DOUBLE_CLICKED = 1 << 8;
        const BUTTON2_TRIPLE_CLICKED = 1 << 9;
        const BUTTON3_PRESSED = 1 << 10;
        const BUTTON3_RELEASED = 1 << 11;
        const BUTTON3_CLICKED = 1 << 12;
        const BUTTON3_DOUBLE_CLICKED = 1 << 13;
        const BUTTON3_TRIPLE_CLICKED = 1 << 14;
        const BUTTON4_PRESSED = 1 << 15;
        const BUTTON4_RELEASED = 1 << 16;
        const BUTTON4_CLICKED = 1 << 17;
        const BUTTON4_DOUBLE_CLICKED = 1 << 18;
        const BUTTON4_TRIPLE_CLICKED = 1 << 19;
        const BUTTON_SHIFT = 1 << 20;
        const BUTTON_CTRL = 1 << 21;
        const BUTTON_ALT = 1 << 22;
        const REPORT_MOUSE_POSITION = 1 << 23;
        const WHEELED_UP = 1 << 24;
        const WHEELED_DOWN = 1 << 25;
        const WHEELED_LEFT = 1 << 26;
        const WHEELED_RIGHT = 1 << 27;
    }
}

impl MouseFlags {
    const MODIFIERS: MouseFlags = MouseFlags::BUTTON_SHIFT
        .union(MouseFlags::BUTTON_CTRL)
        .union(MouseFlags::BUTTON_ALT);

    /// Each button owns five consecutive bits: pressed, released, clicked,
    /// double-clicked, triple-clicked.
    fn button_bit(button: usize, offset: u32) -> MouseFlags {
        debug_assert!(button < BUTTON_COUNT);
        MouseFlags::from_bits_truncate(1 << (button as u32 * 5 + offset))
    }

    /// Pressed flag of a zero-based button index
    pub fn pressed(button: usize) -> MouseFlags {
        Self::button_bit(button, 0)
    }

    /// Released flag of a zero-based button index
    pub fn released(button: usize) -> MouseFlags {
        Self::button_bit(button, 1)
    }

    /// Click flag for a click count; counts above three stay triple
    pub fn click(button: usize, count: u32) -> MouseFlags {
        match count {
            0 => MouseFlags::empty(),
            1 => Self::button_bit(button, 2),
            2 => Self::button_bit(button, 3),
            _ => Self::button_bit(button, 4),
        }
    }

    /// Only the shift/ctrl/alt bits
    pub fn modifiers(&self) -> MouseFlags {
        self.intersection(Self::MODIFIERS)
    }

    pub fn is_wheel(&self) -> bool {
        self.intersects(
            MouseFlags::WHEELED_UP | MouseFlags::WHEELED_DOWN | MouseFlags::WHEELED_LEFT | MouseFlags::WHEELED_RIGHT,
        )
    }
}

/// Opaque identifier of a view in the widget layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewId(pub u64);

/// Result of hit-testing a screen position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewHit {
    pub view: ViewId,
    /// Position relative to the view
    pub position: Point,
}

/// Resolves the view under a screen position
pub type HitTest = Box<dyn Fn(Point) -> Option<ViewHit>>;

/// A mouse notification with a mutable handled flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseEvent {
    pub flags: MouseFlags,
    /// Zero-based screen position
    pub position: Point,
    /// The view under the pointer, when a hit test is installed
    pub view: Option<ViewHit>,
    #[serde(skip)]
    pub handled: bool,
}

impl MouseEvent {
    pub fn new(flags: MouseFlags, position: Point) -> Self {
        Self {
            flags,
            position,
            view: None,
            handled: false,
        }
    }
}

impl Handled for MouseEvent {
    fn handled(&self) -> bool {
        self.handled
    }
}
