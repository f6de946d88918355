//! Output buffer - the cell grid the application draws into
//!
//! A 2D array of cells plus a per-row dirty flag. Drawing goes through a
//! virtual cursor (`move_to` + `add_rune`/`add_str`) that understands
//! double-width glyphs; the writer in [`crate::renderer`] reads the dirty
//! state back and clears it as it encodes cells.

use unicode_width::UnicodeWidthChar;

use super::cell::{Attribute, Cell, WIDE_CONTINUATION};
use super::geometry::{Rect, Size};

/// Shown where a wide glyph cannot fit or has been cut in half
pub const REPLACEMENT: char = '\u{FFFD}';

/// Display columns a rune occupies. Control characters count as one
/// (the writer sanitizes them), combining marks as zero.
pub fn rune_width(ch: char) -> usize {
    if ch.is_control() {
        return 1;
    }
    ch.width().unwrap_or(1)
}

/// The logical screen contents
pub struct OutputBuffer {
    cols: usize,
    rows: usize,
    /// Row-major cells
    cells: Vec<Cell>,
    dirty_lines: Vec<bool>,
    /// Attribute used by `add_rune`
    pub current_attribute: Attribute,
    col: usize,
    row: usize,
    clip: Rect,
}

impl OutputBuffer {
    /// Create a buffer with every cell blank and dirty
    pub fn new(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            cells: vec![Cell::default(); cols * rows],
            dirty_lines: vec![true; rows],
            current_attribute: Attribute::default(),
            col: 0,
            row: 0,
            clip: Rect::new(0, 0, cols, rows),
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn size(&self) -> Size {
        Size::new(self.cols as u16, self.rows as u16)
    }

    #[inline]
    fn index(&self, x: usize, y: usize) -> Option<usize> {
        if x < self.cols && y < self.rows {
            Some(y * self.cols + x)
        } else {
            None
        }
    }

    pub fn get(&self, x: usize, y: usize) -> Option<&Cell> {
        self.index(x, y).map(|i| &self.cells[i])
    }

    /// Set a single cell directly, bypassing the draw cursor and width rules
    pub fn set(&mut self, x: usize, y: usize, rune: char, attribute: Attribute) {
        if let Some(i) = self.index(x, y) {
            if self.cells[i].set(rune, attribute) {
                self.dirty_lines[y] = true;
            }
        }
    }

    /// Move the draw cursor. Positions outside the buffer are allowed;
    /// drawing there is clipped.
    pub fn move_to(&mut self, col: usize, row: usize) {
        self.col = col;
        self.row = row;
    }

    /// Current draw cursor (column, row)
    pub fn position(&self) -> (usize, usize) {
        (self.col, self.row)
    }

    pub fn clip(&self) -> Rect {
        self.clip
    }

    /// Restrict drawing to `clip` (intersected with the buffer)
    pub fn set_clip(&mut self, clip: Rect) {
        let x = clip.x.min(self.cols);
        let y = clip.y.min(self.rows);
        let right = clip.right().min(self.cols);
        let bottom = clip.bottom().min(self.rows);
        self.clip = Rect::new(x, y, right.saturating_sub(x), bottom.saturating_sub(y));
    }

    /// Draw one rune at the cursor with the current attribute and advance
    /// by its display width.
    pub fn add_rune(&mut self, rune: char) {
        let width = rune_width(rune);
        if width == 0 {
            return;
        }

        let (col, row) = (self.col, self.row);
        self.col += width;
        if !self.clip.contains(col, row) {
            return;
        }
        let attr = self.current_attribute;

        // Overwriting the right half of a wide glyph breaks the glyph
        if col > 0 && self.is_continuation(col, row) {
            let left_attr = self.cells[row * self.cols + col - 1].attribute;
            self.set(col - 1, row, REPLACEMENT, left_attr);
        }

        if width >= 2 {
            if col + 1 >= self.clip.right() {
                // No room for the right half
                self.set(col, row, REPLACEMENT, attr);
                return;
            }
            if self.is_continuation(col + 2, row) {
                self.set(col + 2, row, ' ', attr);
            }
            self.set(col, row, rune, attr);
            self.set(col + 1, row, WIDE_CONTINUATION, attr);
        } else {
            if self.is_continuation(col + 1, row) {
                self.set(col + 1, row, ' ', attr);
            }
            self.set(col, row, rune, attr);
        }
    }

    /// Draw a string starting at the cursor
    pub fn add_str(&mut self, s: &str) {
        for ch in s.chars() {
            self.add_rune(ch);
        }
    }

    fn is_continuation(&self, x: usize, y: usize) -> bool {
        self.get(x, y).map(Cell::is_continuation).unwrap_or(false)
    }

    /// Fill a rectangle with `rune` in the current attribute
    pub fn fill_rect(&mut self, rect: Rect, rune: char) {
        let attr = self.current_attribute;
        for y in rect.y..rect.bottom().min(self.rows) {
            for x in rect.x..rect.right().min(self.cols) {
                if self.clip.contains(x, y) {
                    self.set(x, y, rune, attr);
                }
            }
        }
    }

    /// Blank every cell and mark everything dirty
    pub fn clear_contents(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
        self.mark_all_dirty();
    }

    /// Resize the buffer (content is lost)
    pub fn resize(&mut self, cols: usize, rows: usize) {
        self.cols = cols;
        self.rows = rows;
        self.cells = vec![Cell::default(); cols * rows];
        self.dirty_lines = vec![true; rows];
        self.clip = Rect::new(0, 0, cols, rows);
        self.col = self.col.min(cols);
        self.row = self.row.min(rows);
    }

    /// Force the next flush to repaint every cell
    pub fn mark_all_dirty(&mut self) {
        for cell in &mut self.cells {
            cell.dirty = true;
        }
        self.dirty_lines.iter_mut().for_each(|d| *d = true);
    }

    /// Whether any row still has to be flushed
    pub fn is_dirty(&self) -> bool {
        self.dirty_lines.iter().any(|d| *d)
    }

    pub fn dirty_lines(&self) -> &[bool] {
        &self.dirty_lines
    }

    pub fn is_line_dirty(&self, row: usize) -> bool {
        self.dirty_lines.get(row).copied().unwrap_or(false)
    }

    /// Clear a row's dirty flag, returning whether it was set
    pub(crate) fn take_line_dirty(&mut self, row: usize) -> bool {
        match self.dirty_lines.get_mut(row) {
            Some(d) => std::mem::replace(d, false),
            None => false,
        }
    }

    pub(crate) fn row_mut(&mut self, row: usize) -> &mut [Cell] {
        let start = row * self.cols;
        &mut self.cells[start..start + self.cols]
    }

    /// Iterate over dirty cells with positions
    pub fn iter_dirty(&self) -> impl Iterator<Item = (usize, usize, &Cell)> {
        self.cells.iter().enumerate().filter(|(_, c)| c.dirty).map(move |(i, cell)| {
            (i % self.cols, i / self.cols, cell)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cell::Color;

    fn clean(buffer: &mut OutputBuffer) {
        for row in 0..buffer.rows() {
            buffer.take_line_dirty(row);
            for cell in buffer.row_mut(row) {
                cell.dirty = false;
            }
        }
    }

    #[test]
    fn test_new_is_dirty() {
        let buffer = OutputBuffer::new(80, 24);
        assert_eq!(buffer.cols(), 80);
        assert_eq!(buffer.rows(), 24);
        assert!(buffer.is_dirty());
    }

    #[test]
    fn test_add_str_marks_only_touched_row() {
        let mut buffer = OutputBuffer::new(10, 5);
        clean(&mut buffer);

        buffer.move_to(2, 3);
        buffer.add_str("Hi");
        assert_eq!(buffer.get(2, 3).unwrap().rune, 'H');
        assert_eq!(buffer.get(3, 3).unwrap().rune, 'i');
        assert_eq!(buffer.dirty_lines(), &[false, false, false, true, false]);
        assert_eq!(buffer.iter_dirty().count(), 2);
    }

    #[test]
    fn test_unchanged_write_stays_clean() {
        let mut buffer = OutputBuffer::new(4, 1);
        clean(&mut buffer);
        buffer.move_to(0, 0);
        buffer.add_str("    ");
        assert!(!buffer.is_dirty());
    }

    #[test]
    fn test_wide_glyph_takes_two_columns() {
        let mut buffer = OutputBuffer::new(6, 1);
        buffer.move_to(0, 0);
        buffer.add_str("中a");
        assert_eq!(buffer.get(0, 0).unwrap().rune, '中');
        assert!(buffer.get(1, 0).unwrap().is_continuation());
        assert_eq!(buffer.get(2, 0).unwrap().rune, 'a');
        assert_eq!(buffer.position(), (3, 0));
    }

    #[test]
    fn test_wide_glyph_in_last_column_is_replaced() {
        let mut buffer = OutputBuffer::new(3, 1);
        buffer.move_to(2, 0);
        buffer.add_rune('中');
        assert_eq!(buffer.get(2, 0).unwrap().rune, REPLACEMENT);
    }

    #[test]
    fn test_overwriting_half_of_wide_glyph() {
        let mut buffer = OutputBuffer::new(4, 1);
        buffer.move_to(0, 0);
        buffer.add_rune('中');
        buffer.move_to(1, 0);
        buffer.add_rune('x');
        assert_eq!(buffer.get(0, 0).unwrap().rune, REPLACEMENT);
        assert_eq!(buffer.get(1, 0).unwrap().rune, 'x');

        buffer.move_to(2, 0);
        buffer.add_rune('中');
        buffer.move_to(2, 0);
        buffer.add_rune('y');
        assert_eq!(buffer.get(2, 0).unwrap().rune, 'y');
        assert_eq!(buffer.get(3, 0).unwrap().rune, ' ');
    }

    #[test]
    fn test_clip() {
        let mut buffer = OutputBuffer::new(10, 2);
        buffer.set_clip(Rect::new(0, 0, 3, 1));
        buffer.move_to(1, 0);
        buffer.add_str("abcd");
        assert_eq!(buffer.get(2, 0).unwrap().rune, 'b');
        assert_eq!(buffer.get(3, 0).unwrap().rune, ' ');
    }

    #[test]
    fn test_fill_and_attribute() {
        let mut buffer = OutputBuffer::new(5, 5);
        buffer.current_attribute = Attribute::new(Color::Red, Color::Blue);
        buffer.fill_rect(Rect::new(1, 1, 2, 2), '#');
        let cell = buffer.get(2, 2).unwrap();
        assert_eq!(cell.rune, '#');
        assert_eq!(cell.attribute.fg, Color::Red);
        assert_eq!(buffer.get(3, 3).unwrap().rune, ' ');
    }

    #[test]
    fn test_resize_marks_dirty() {
        let mut buffer = OutputBuffer::new(5, 5);
        clean(&mut buffer);
        buffer.resize(8, 3);
        assert_eq!(buffer.size(), Size::new(8, 3));
        assert_eq!(buffer.dirty_lines(), &[true, true, true]);
    }
}
