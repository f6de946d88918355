//! Dirty-cell encoder
//!
//! Turns the dirty part of an [`OutputBuffer`] into the shortest ANSI stream
//! the terminal needs: clean rows are skipped without looking at their
//! cells, clean cells are skipped by moving the cursor past them, and SGR
//! sequences are emitted only when the attribute actually changes. The
//! attribute and cursor the terminal was last left in are remembered across
//! flushes.

use bytes::{BufMut, BytesMut};

use crate::ansi::sequences::{attribute_change, cursor_position};
use crate::core::{rune_width, Attribute, OutputBuffer};

/// Incremental buffer-to-ANSI encoder
#[derive(Debug, Default)]
pub struct OutputWriter {
    /// Attribute the terminal is currently using, None when unknown
    current_attr: Option<Attribute>,
    /// Where the terminal cursor is, None when unknown
    cursor: Option<(usize, usize)>,
}

impl OutputWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget what the terminal state is, e.g. after a clear or resize
    pub fn reset(&mut self) {
        self.current_attr = None;
        self.cursor = None;
    }

    /// Record a cursor move made outside the encoder
    pub fn note_cursor(&mut self, col: usize, row: usize) {
        self.cursor = Some((col, row));
    }

    /// Encode every dirty cell into `out`, clearing dirty flags as cells
    /// are encoded. Returns the number of cells written.
    pub fn encode(&mut self, buffer: &mut OutputBuffer, out: &mut BytesMut) -> usize {
        let cols = buffer.cols();
        let mut written = 0;
        let mut run = String::new();

        for row in 0..buffer.rows() {
            if !buffer.take_line_dirty(row) {
                continue;
            }
            let cells = buffer.row_mut(row);
            let mut col = 0;

            while col < cols {
                if !cells[col].dirty {
                    flush_run(&mut run, out);
                    col += 1;
                    continue;
                }
                if cells[col].is_continuation() {
                    // Painted together with the glyph to its left
                    cells[col].dirty = false;
                    col += 1;
                    continue;
                }

                if self.cursor != Some((col, row)) {
                    flush_run(&mut run, out);
                    out.put_slice(cursor_position(col, row).as_bytes());
                }

                let attr = cells[col].attribute;
                if self.current_attr != Some(attr) {
                    flush_run(&mut run, out);
                    out.put_slice(attribute_change(self.current_attr.as_ref(), &attr).as_bytes());
                    self.current_attr = Some(attr);
                }

                let ch = sanitize(cells[col].rune);
                run.push(ch);
                cells[col].dirty = false;
                written += 1;

                let width = rune_width(ch).max(1);
                if width >= 2 {
                    if let Some(next) = cells.get_mut(col + 1) {
                        next.dirty = false;
                    }
                    col += 2;
                    self.cursor = Some((col, row));
                } else if u32::from(ch) > 0xFFFF {
                    // Terminals disagree on the width of narrow astral
                    // glyphs; resync before the next cell
                    col += 1;
                    self.cursor = None;
                } else {
                    col += 1;
                    self.cursor = Some((col, row));
                }
            }
            flush_run(&mut run, out);

            // Past the last column the cursor may be in a pending wrap
            if matches!(self.cursor, Some((c, _)) if c >= cols) {
                self.cursor = None;
            }
        }
        written
    }
}

fn flush_run(run: &mut String, out: &mut BytesMut) {
    if !run.is_empty() {
        out.put_slice(run.as_bytes());
        run.clear();
    }
}

/// Control characters would corrupt the screen; draw them as spaces
fn sanitize(ch: char) -> char {
    if ch.is_control() {
        ' '
    } else {
        ch
    }
}
