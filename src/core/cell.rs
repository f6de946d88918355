//! Output cells
//!
//! Each cell represents one column of one row with:
//! - Rune (Unicode scalar)
//! - Attribute: foreground, background and text style
//! - Dirty flag: set when the cell differs from what the terminal shows

use serde::{Deserialize, Serialize};

/// Rune stored in the cell that follows a double-width glyph
pub const WIDE_CONTINUATION: char = '\0';

/// Terminal colors: the 16-color ANSI palette plus 256-color and truecolor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    BrightBlack,
    BrightRed,
    BrightGreen,
    BrightYellow,
    BrightBlue,
    BrightMagenta,
    BrightCyan,
    BrightWhite,
    /// 256-color palette index
    Indexed(u8),
    /// 24-bit color
    Rgb(u8, u8, u8),
}

impl Default for Color {
    fn default() -> Self {
        Color::White
    }
}

impl From<u8> for Color {
    fn from(v: u8) -> Self {
        match v {
            0 => Color::Black,
            1 => Color::Red,
            2 => Color::Green,
            3 => Color::Yellow,
            4 => Color::Blue,
            5 => Color::Magenta,
            6 => Color::Cyan,
            7 => Color::White,
            8 => Color::BrightBlack,
            9 => Color::BrightRed,
            10 => Color::BrightGreen,
            11 => Color::BrightYellow,
            12 => Color::BrightBlue,
            13 => Color::BrightMagenta,
            14 => Color::BrightCyan,
            15 => Color::BrightWhite,
            n => Color::Indexed(n),
        }
    }
}

impl Color {
    fn palette_index(&self) -> Option<u16> {
        let v = match self {
            Color::Black => 0,
            Color::Red => 1,
            Color::Green => 2,
            Color::Yellow => 3,
            Color::Blue => 4,
            Color::Magenta => 5,
            Color::Cyan => 6,
            Color::White => 7,
            Color::BrightBlack => 8,
            Color::BrightRed => 9,
            Color::BrightGreen => 10,
            Color::BrightYellow => 11,
            Color::BrightBlue => 12,
            Color::BrightMagenta => 13,
            Color::BrightCyan => 14,
            Color::BrightWhite => 15,
            Color::Indexed(_) | Color::Rgb(..) => return None,
        };
        Some(v)
    }

    /// Append the SGR parameters selecting this color as foreground
    pub fn push_fg_params(&self, codes: &mut Vec<u16>) {
        self.push_params(codes, 30, 90, 38);
    }

    /// Append the SGR parameters selecting this color as background
    pub fn push_bg_params(&self, codes: &mut Vec<u16>) {
        self.push_params(codes, 40, 100, 48);
    }

    fn push_params(&self, codes: &mut Vec<u16>, base: u16, bright_base: u16, extended: u16) {
        match (self.palette_index(), self) {
            (Some(v), _) if v < 8 => codes.push(base + v),
            (Some(v), _) => codes.push(bright_base + (v - 8)),
            (None, Color::Indexed(n)) => codes.extend([extended, 5, *n as u16]),
            (None, Color::Rgb(r, g, b)) => codes.extend([extended, 2, *r as u16, *g as u16, *b as u16]),
            (None, _) => {}
        }
    }
}

bitflags::bitflags! {
    /// Text style flags
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct TextStyle: u8 {
        const BOLD = 1 << 0;
        const FAINT = 1 << 1;
        const ITALIC = 1 << 2;
        const UNDERLINE = 1 << 3;
        const BLINK = 1 << 4;
        const REVERSE = 1 << 5;
        const STRIKETHROUGH = 1 << 6;
    }
}

impl TextStyle {
    /// SGR codes that switch each flag on
    pub fn sgr_codes(&self) -> Vec<u16> {
        const TABLE: [(TextStyle, u16); 7] = [
            (TextStyle::BOLD, 1),
            (TextStyle::FAINT, 2),
            (TextStyle::ITALIC, 3),
            (TextStyle::UNDERLINE, 4),
            (TextStyle::BLINK, 5),
            (TextStyle::REVERSE, 7),
            (TextStyle::STRIKETHROUGH, 9),
        ];
        TABLE
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, code)| *code)
            .collect()
    }
}

/// Colors and style of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribute {
    pub fg: Color,
    pub bg: Color,
    pub style: TextStyle,
}

impl Default for Attribute {
    fn default() -> Self {
        Self {
            fg: Color::White,
            bg: Color::Black,
            style: TextStyle::empty(),
        }
    }
}

impl Attribute {
    pub fn new(fg: Color, bg: Color) -> Self {
        Self {
            fg,
            bg,
            style: TextStyle::empty(),
        }
    }

    pub fn with_style(mut self, style: TextStyle) -> Self {
        self.style = style;
        self
    }
}

/// A single output cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// The glyph to display
    pub rune: char,
    pub attribute: Attribute,
    /// Whether this cell needs to be sent to the terminal
    #[serde(skip)]
    pub dirty: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            rune: ' ',
            attribute: Attribute::default(),
            dirty: true,
        }
    }
}

impl Cell {
    pub fn new(rune: char, attribute: Attribute) -> Self {
        Self {
            rune,
            attribute,
            dirty: true,
        }
    }

    /// Set rune and attribute, marking the cell dirty if anything changed.
    /// Returns whether the cell changed.
    pub fn set(&mut self, rune: char, attribute: Attribute) -> bool {
        if self.rune != rune || self.attribute != attribute {
            self.rune = rune;
            self.attribute = attribute;
            self.dirty = true;
            return true;
        }
        false
    }

    /// Second half of a double-width glyph
    pub fn is_continuation(&self) -> bool {
        self.rune == WIDE_CONTINUATION
    }

    /// Reset to a blank cell
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
