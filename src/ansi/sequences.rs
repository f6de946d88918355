//! Escape sequences sent to the terminal

use crate::core::Attribute;

pub const ESC: char = '\x1b';
pub const CSI: &str = "\x1b[";
pub const SS3: &str = "\x1bO";

/// Final characters that can end a CSI/SS3 response
pub fn is_known_terminator(ch: char) -> bool {
    matches!(ch, '@' | 'A'..='Z' | '^' | '`' | 'a'..='z' | '~')
}

/// CUP - move the cursor to a zero-based position
pub fn cursor_position(col: usize, row: usize) -> String {
    format!("{}{};{}H", CSI, row + 1, col + 1)
}

pub fn hide_cursor() -> &'static str {
    "\x1b[?25l"
}

pub fn show_cursor() -> &'static str {
    "\x1b[?25h"
}

pub fn enter_alternate_screen() -> &'static str {
    "\x1b[?1049h"
}

pub fn leave_alternate_screen() -> &'static str {
    "\x1b[?1049l"
}

pub fn clear_screen() -> String {
    format!("{}2J{}H", CSI, CSI)
}

pub fn reset_attributes() -> String {
    format!("{}0m", CSI)
}

/// SGR transition from `current` (None = unknown terminal state) to `next`.
/// Returns an empty string when nothing has to change.
pub fn attribute_change(current: Option<&Attribute>, next: &Attribute) -> String {
    let mut codes: Vec<u16> = Vec::new();

    // Style bits can only be switched off by a full reset
    let needs_reset = match current {
        None => true,
        Some(cur) => !next.style.contains(cur.style),
    };

    if needs_reset {
        codes.push(0);
        codes.extend(next.style.sgr_codes());
        next.fg.push_fg_params(&mut codes);
        next.bg.push_bg_params(&mut codes);
    } else if let Some(cur) = current {
        codes.extend(next.style.difference(cur.style).sgr_codes());
        if next.fg != cur.fg {
            next.fg.push_fg_params(&mut codes);
        }
        if next.bg != cur.bg {
            next.bg.push_bg_params(&mut codes);
        }
    }

    if codes.is_empty() {
        String::new()
    } else {
        let code_strs: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
        format!("{}{}m", CSI, code_strs.join(";"))
    }
}
