//! Terminal output
//!
//! [`ConsoleOutput`] is what the main loop writes through. [`AnsiOutput`]
//! implements it for any `io::Write` using the diffing [`OutputWriter`].

pub mod ansi_output;
pub mod writer;

pub use ansi_output::{AnsiOutput, CaptureWriter};
pub use writer::OutputWriter;

use crate::core::{OutputBuffer, Size};
use crate::error::Result;

/// Mouse tracking mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseMode {
    /// No mouse tracking
    None,
    /// Normal tracking - press and release
    Normal,
    /// Button event tracking - press, release, and drag
    Button,
    /// Any event tracking - all motion
    Any,
    /// SGR extended mode (better for large screens)
    Sgr,
}

impl MouseMode {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "normal" => MouseMode::Normal,
            "button" => MouseMode::Button,
            "any" => MouseMode::Any,
            "sgr" => MouseMode::Sgr,
            "none" | "off" => MouseMode::None,
            _ => MouseMode::Sgr, // Default to SGR
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MouseMode::None => "none",
            MouseMode::Normal => "normal",
            MouseMode::Button => "button",
            MouseMode::Any => "any",
            MouseMode::Sgr => "sgr",
        }
    }

    /// Sequence switching this mode on
    pub fn enable_sequence(&self) -> &'static str {
        match self {
            MouseMode::None => Self::disable_sequence(),
            MouseMode::Normal => "\x1b[?1000h",
            MouseMode::Button => "\x1b[?1002h",
            MouseMode::Any => "\x1b[?1003h",
            // SGR encoding + button event tracking
            MouseMode::Sgr => "\x1b[?1006h\x1b[?1002h",
        }
    }

    /// Sequence switching every mouse mode off
    pub fn disable_sequence() -> &'static str {
        "\x1b[?1000l\x1b[?1002l\x1b[?1003l\x1b[?1006l"
    }
}

/// Cursor shape as far as the runtime cares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorVisibility {
    #[default]
    Visible,
    Invisible,
}

/// Where the main loop sends its output
pub trait ConsoleOutput {
    /// Write raw text, e.g. a terminal query
    fn write_str(&mut self, text: &str) -> Result<()>;

    /// Flush the dirty part of `buffer`
    fn write(&mut self, buffer: &mut OutputBuffer) -> Result<()>;

    /// Current terminal size
    fn window_size(&self) -> Size;

    fn set_cursor_visibility(&mut self, visibility: CursorVisibility) -> Result<()>;

    /// Move the terminal cursor to a zero-based cell
    fn set_cursor_position(&mut self, col: usize, row: usize) -> Result<()>;

    /// Forget the cursor and attribute the terminal was last left in,
    /// e.g. after a resize reflowed the screen
    fn reset(&mut self) {}

    /// Restore the terminal. Safe to call more than once.
    fn dispose(&mut self) -> Result<()>;
}
