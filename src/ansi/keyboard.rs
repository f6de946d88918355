//! Keyboard escape sequences
//!
//! Recognizes complete captured sequences (ESC included):
//! - Cursor keys: `ESC [ A-D`, `ESC [ 1;N A-D`, Home/End as `H`/`F`
//! - SS3 keys: `ESC O P-S` (F1-F4) and `ESC O A-D/H/F`
//! - Tilde keys: `ESC [ NN ~` (F1-F12, Insert, Delete, paging, Home/End)

use super::sequences::ESC;
use crate::input::{Key, KeyCode, Modifiers};

/// Stateless matcher for key sequences
#[derive(Debug, Clone, Copy, Default)]
pub struct AnsiKeyboardParser;

impl AnsiKeyboardParser {
    pub fn new() -> Self {
        Self
    }

    /// Whether the captured sequence is a complete key sequence
    pub fn is_keyboard(&self, seq: &str) -> bool {
        self.parse(seq).is_some()
    }

    /// Decode a complete captured sequence into a key
    pub fn parse(&self, seq: &str) -> Option<Key> {
        let body = seq.strip_prefix(ESC)?;
        if let Some(rest) = body.strip_prefix('O') {
            return parse_ss3(rest);
        }
        parse_csi(body.strip_prefix('[')?)
    }
}

/// Modifier digit of `ESC [ 1;N X`.
///
/// This table does not follow xterm (where N-1 is a shift/alt/ctrl bitmask);
/// it is kept as-is for compatibility with existing consumers.
fn modifier_from_digit(digit: &str) -> Modifiers {
    match digit {
        "3" => Modifiers::ctrl(),
        "4" => Modifiers::alt(),
        "5" => Modifiers::shift(),
        _ => Modifiers::NONE,
    }
}

fn cursor_code(final_char: char) -> Option<KeyCode> {
    match final_char {
        'A' => Some(KeyCode::CursorUp),
        'B' => Some(KeyCode::CursorDown),
        'C' => Some(KeyCode::CursorRight),
        'D' => Some(KeyCode::CursorLeft),
        'H' => Some(KeyCode::Home),
        'F' => Some(KeyCode::End),
        _ => None,
    }
}

fn parse_ss3(rest: &str) -> Option<Key> {
    let mut chars = rest.chars();
    let ch = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    let code = match ch {
        'P' => KeyCode::F(1),
        'Q' => KeyCode::F(2),
        'R' => KeyCode::F(3),
        'S' => KeyCode::F(4),
        c => cursor_code(c)?,
    };
    Some(Key::new(code))
}

fn parse_csi(rest: &str) -> Option<Key> {
    let final_char = rest.chars().last()?;
    let params = &rest[..rest.len() - final_char.len_utf8()];
    if !params.chars().all(|c| c.is_ascii_digit() || c == ';') {
        return None;
    }

    match final_char {
        'A'..='D' | 'H' | 'F' => {
            let code = cursor_code(final_char)?;
            let modifiers = match params {
                "" => Modifiers::NONE,
                p => {
                    let digit = p.strip_prefix("1;")?;
                    if digit.len() != 1 {
                        return None;
                    }
                    modifier_from_digit(digit)
                }
            };
            Some(Key::new(code).with_modifiers(modifiers))
        }
        '~' => {
            let mut parts = params.split(';');
            let number: u8 = parts.next()?.parse().ok()?;
            let modifiers = parts.next().map(modifier_from_digit).unwrap_or(Modifiers::NONE);
            if parts.next().is_some() {
                return None;
            }
            Some(Key::new(tilde_code(number)?).with_modifiers(modifiers))
        }
        _ => None,
    }
}

fn tilde_code(number: u8) -> Option<KeyCode> {
    let code = match number {
        1 | 7 => KeyCode::Home,
        2 => KeyCode::Insert,
        3 => KeyCode::Delete,
        4 | 8 => KeyCode::End,
        5 => KeyCode::PageUp,
        6 => KeyCode::PageDown,
        11 => KeyCode::F(1),
        12 => KeyCode::F(2),
        13 => KeyCode::F(3),
        14 => KeyCode::F(4),
        15 => KeyCode::F(5),
        17 => KeyCode::F(6),
        18 => KeyCode::F(7),
        19 => KeyCode::F(8),
        20 => KeyCode::F(9),
        21 => KeyCode::F(10),
        23 => KeyCode::F(11),
        24 => KeyCode::F(12),
        _ => return None,
    };
    Some(code)
}
