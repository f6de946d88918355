//! Keyboard values
//!
//! Plain characters become keys through [`Key::from_char`]; escape
//! sequences are decoded by [`crate::ansi::AnsiKeyboardParser`].

use serde::{Deserialize, Serialize};

use crate::events::Handled;

/// What key was pressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum KeyCode {
    Char(char),
    Enter,
    Tab,
    Backspace,
    Esc,
    CursorUp,
    CursorDown,
    CursorLeft,
    CursorRight,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    /// Function key F1-F12
    F(u8),
}

/// Modifier keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
    };

    pub fn ctrl() -> Self {
        Self { ctrl: true, ..Self::NONE }
    }

    pub fn alt() -> Self {
        Self { alt: true, ..Self::NONE }
    }

    pub fn shift() -> Self {
        Self { shift: true, ..Self::NONE }
    }

    pub fn is_empty(&self) -> bool {
        !(self.shift || self.ctrl || self.alt)
    }
}

/// A key with its modifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    pub code: KeyCode,
    pub modifiers: Modifiers,
}

impl Key {
    pub const fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_ctrl(mut self) -> Self {
        self.modifiers.ctrl = true;
        self
    }

    pub fn with_alt(mut self) -> Self {
        self.modifiers.alt = true;
        self
    }

    pub fn with_shift(mut self) -> Self {
        self.modifiers.shift = true;
        self
    }

    /// Map a single released character to a key.
    ///
    /// C0 control characters become their Ctrl+letter chords, except the
    /// ones terminals use for Enter, Tab, Backspace and Esc.
    pub fn from_char(ch: char) -> Self {
        match ch {
            '\r' | '\n' => Key::new(KeyCode::Enter),
            '\t' => Key::new(KeyCode::Tab),
            '\x7f' | '\x08' => Key::new(KeyCode::Backspace),
            '\x1b' => Key::new(KeyCode::Esc),
            '\0' => Key::new(KeyCode::Char(' ')).with_ctrl(),
            '\x01'..='\x1a' => {
                let letter = (b'a' + (ch as u8 - 1)) as char;
                Key::new(KeyCode::Char(letter)).with_ctrl()
            }
            '\x1c'..='\x1f' => {
                let symbol = (b'\\' + (ch as u8 - 0x1c)) as char;
                Key::new(KeyCode::Char(symbol)).with_ctrl()
            }
            c => Key::new(KeyCode::Char(c)),
        }
    }

    /// The printable character carried by this key, if any
    pub fn as_char(&self) -> Option<char> {
        match self.code {
            KeyCode::Char(c) if !self.modifiers.ctrl && !self.modifiers.alt => Some(c),
            _ => None,
        }
    }
}

impl From<KeyCode> for Key {
    fn from(code: KeyCode) -> Self {
        Key::new(code)
    }
}

/// A key notification with a mutable handled flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: Key,
    #[serde(skip)]
    pub handled: bool,
}

impl KeyEvent {
    pub fn new(key: Key) -> Self {
        Self { key, handled: false }
    }
}

impl Handled for KeyEvent {
    fn handled(&self) -> bool {
        self.handled
    }
}
