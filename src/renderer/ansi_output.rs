//! ANSI terminal output over any `io::Write`

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::{BufMut, BytesMut};
use log::{debug, error};

use super::writer::OutputWriter;
use super::{ConsoleOutput, CursorVisibility, MouseMode};
use crate::ansi::sequences;
use crate::core::{OutputBuffer, Size};
use crate::error::{Error, Result};

/// Used when the terminal cannot report its size
const FALLBACK_SIZE: Size = Size { cols: 80, rows: 24 };

#[derive(Debug, Clone, Copy)]
enum SizeSource {
    Fixed(Size),
    Terminal,
}

/// A [`ConsoleOutput`] writing ANSI sequences to `W`
pub struct AnsiOutput<W: Write> {
    out: W,
    writer: OutputWriter,
    bytes: BytesMut,
    size: SizeSource,
    visibility: CursorVisibility,
    mouse_mode: MouseMode,
    alternate_screen: bool,
    initialized: bool,
    disposed: bool,
}

impl AnsiOutput<io::Stdout> {
    /// Output to stdout, sized by the controlling terminal
    pub fn stdout() -> Self {
        let mut output = Self::new(io::stdout(), FALLBACK_SIZE);
        output.size = SizeSource::Terminal;
        output
    }
}

impl<W: Write> AnsiOutput<W> {
    /// Output with a fixed size, e.g. for tests or a sink
    pub fn new(out: W, size: Size) -> Self {
        Self {
            out,
            writer: OutputWriter::new(),
            bytes: BytesMut::with_capacity(4096),
            size: SizeSource::Fixed(size),
            visibility: CursorVisibility::Visible,
            mouse_mode: MouseMode::None,
            alternate_screen: false,
            initialized: false,
            disposed: false,
        }
    }

    pub fn with_mouse_mode(mut self, mode: MouseMode) -> Self {
        self.mouse_mode = mode;
        self
    }

    pub fn with_alternate_screen(mut self, enabled: bool) -> Self {
        self.alternate_screen = enabled;
        self
    }

    /// Change the reported size of a fixed-size output
    pub fn set_size(&mut self, size: Size) {
        if let SizeSource::Fixed(_) = self.size {
            self.size = SizeSource::Fixed(size);
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    /// Prepare the terminal: alternate screen, clear, mouse tracking
    pub fn init(&mut self) -> Result<()> {
        if self.alternate_screen {
            self.bytes.put_slice(sequences::enter_alternate_screen().as_bytes());
        }
        self.bytes.put_slice(sequences::clear_screen().as_bytes());
        self.bytes.put_slice(sequences::reset_attributes().as_bytes());
        if self.mouse_mode != MouseMode::None {
            self.bytes.put_slice(self.mouse_mode.enable_sequence().as_bytes());
        }
        self.writer.reset();
        self.initialized = true;
        debug!("Terminal initialized (mouse mode {})", self.mouse_mode.as_str());
        self.flush_bytes()
    }

    fn flush_bytes(&mut self) -> Result<()> {
        if self.bytes.is_empty() {
            return Ok(());
        }
        let bytes = self.bytes.split();
        self.out
            .write_all(&bytes)
            .and_then(|_| self.out.flush())
            .map_err(|e| {
                error!("Terminal write failed: {}", e);
                Error::PlatformWriteFailure(e)
            })
    }

    fn put_visibility(&mut self, visibility: CursorVisibility) {
        let seq = match visibility {
            CursorVisibility::Visible => sequences::show_cursor(),
            CursorVisibility::Invisible => sequences::hide_cursor(),
        };
        self.bytes.put_slice(seq.as_bytes());
    }
}

impl<W: Write> ConsoleOutput for AnsiOutput<W> {
    fn write_str(&mut self, text: &str) -> Result<()> {
        self.bytes.put_slice(text.as_bytes());
        self.flush_bytes()
    }

    fn write(&mut self, buffer: &mut OutputBuffer) -> Result<()> {
        if !buffer.is_dirty() {
            return Ok(());
        }
        let start = self.bytes.len();
        self.put_visibility(CursorVisibility::Invisible);
        let written = self.writer.encode(buffer, &mut self.bytes);
        if written == 0 {
            // Only continuation cells were dirty
            self.bytes.truncate(start);
            return Ok(());
        }
        if self.visibility == CursorVisibility::Visible {
            self.put_visibility(CursorVisibility::Visible);
        }
        if let Err(e) = self.flush_bytes() {
            // Nothing reached the terminal; the next write repaints it all
            buffer.mark_all_dirty();
            self.writer.reset();
            return Err(e);
        }
        Ok(())
    }

    fn window_size(&self) -> Size {
        match self.size {
            SizeSource::Fixed(size) => size,
            SizeSource::Terminal => crossterm::terminal::size()
                .map(|(cols, rows)| Size::new(cols, rows))
                .unwrap_or(FALLBACK_SIZE),
        }
    }

    fn set_cursor_visibility(&mut self, visibility: CursorVisibility) -> Result<()> {
        if self.visibility == visibility {
            return Ok(());
        }
        self.visibility = visibility;
        self.put_visibility(visibility);
        self.flush_bytes()
    }

    fn set_cursor_position(&mut self, col: usize, row: usize) -> Result<()> {
        self.bytes.put_slice(sequences::cursor_position(col, row).as_bytes());
        self.writer.note_cursor(col, row);
        self.flush_bytes()
    }

    fn reset(&mut self) {
        self.writer.reset();
    }

    fn dispose(&mut self) -> Result<()> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;
        if !self.initialized {
            return Ok(());
        }
        self.bytes.put_slice(MouseMode::disable_sequence().as_bytes());
        self.bytes.put_slice(sequences::reset_attributes().as_bytes());
        self.bytes.put_slice(sequences::show_cursor().as_bytes());
        if self.alternate_screen {
            self.bytes.put_slice(sequences::leave_alternate_screen().as_bytes());
        } else {
            self.bytes.put_slice(sequences::clear_screen().as_bytes());
        }
        debug!("Terminal restored");
        self.flush_bytes()
    }
}

/// Shared in-memory `io::Write` target
#[derive(Debug, Clone, Default)]
pub struct CaptureWriter {
    data: Arc<Mutex<Vec<u8>>>,
}

impl CaptureWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        match self.data.lock() {
            Ok(data) => data,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Everything written so far, lossily decoded
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Fails the first write, then records like a capture
    struct FlakyPipe {
        failed: bool,
        capture: CaptureWriter,
    }

    impl Write for FlakyPipe {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if !self.failed {
                self.failed = true;
                return Err(io::Error::new(io::ErrorKind::WouldBlock, "terminal busy"));
            }
            self.capture.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_write_keeps_cells_dirty() {
        let capture = CaptureWriter::new();
        let pipe = FlakyPipe {
            failed: false,
            capture: capture.clone(),
        };
        let mut output = AnsiOutput::new(pipe, Size::new(3, 1));
        let mut buffer = OutputBuffer::new(3, 1);
        buffer.move_to(1, 0);
        buffer.add_str("X");

        assert!(output.write(&mut buffer).is_err());
        assert!(buffer.is_dirty());
        assert_eq!(capture.contents(), "");

        output.write(&mut buffer).unwrap();
        let retry = capture.contents();
        assert!(retry.contains("\x1b[1;1H"));
        assert!(retry.contains('X'));
        assert!(!buffer.is_dirty());
    }

    #[test]
    fn test_write_hides_cursor_during_flush() {
        let capture = CaptureWriter::new();
        let mut output = AnsiOutput::new(capture.clone(), Size::new(2, 1));
        let mut buffer = OutputBuffer::new(2, 1);

        output.write(&mut buffer).unwrap();
        assert_eq!(capture.contents(), "\x1b[?25l\x1b[1;1H\x1b[0;37;40m  \x1b[?25h");

        capture.clear();
        output.write(&mut buffer).unwrap();
        assert_eq!(capture.contents(), "");
    }

    #[test]
    fn test_reset_forces_cursor_move() {
        let capture = CaptureWriter::new();
        let mut output = AnsiOutput::new(capture.clone(), Size::new(3, 1));
        let mut buffer = OutputBuffer::new(3, 1);
        output.write(&mut buffer).unwrap();
        output.set_cursor_position(1, 0).unwrap();

        buffer.move_to(1, 0);
        buffer.add_str("Y");
        output.reset();
        capture.clear();
        output.write(&mut buffer).unwrap();
        let out = capture.contents();
        assert!(out.contains("\x1b[1;2H"));
        assert!(out.ends_with("Y\x1b[?25h"));
    }

    #[test]
    fn test_invisible_cursor_stays_hidden() {
        let capture = CaptureWriter::new();
        let mut output = AnsiOutput::new(capture.clone(), Size::new(1, 1));
        output.set_cursor_visibility(CursorVisibility::Invisible).unwrap();
        capture.clear();

        output.write(&mut OutputBuffer::new(1, 1)).unwrap();
        assert!(!capture.contents().contains("\x1b[?25h"));
    }

    #[test]
    fn test_init_and_dispose() {
        let capture = CaptureWriter::new();
        let mut output = AnsiOutput::new(capture.clone(), Size::new(10, 5))
            .with_mouse_mode(MouseMode::Sgr)
            .with_alternate_screen(true);
        output.init().unwrap();
        let init = capture.contents();
        assert!(init.starts_with("\x1b[?1049h"));
        assert!(init.contains("\x1b[?1006h"));

        capture.clear();
        output.dispose().unwrap();
        let shutdown = capture.contents();
        assert!(shutdown.contains("\x1b[?1006l"));
        assert!(shutdown.ends_with("\x1b[?1049l"));

        capture.clear();
        output.dispose().unwrap();
        assert_eq!(capture.contents(), "");
    }

    #[test]
    fn test_write_failure_propagates() {
        let mut output = AnsiOutput::new(BrokenPipe, Size::new(1, 1));
        let err = output.write_str("x").unwrap_err();
        assert!(matches!(err, Error::PlatformWriteFailure(_)));
    }

    #[test]
    fn test_sink_output_never_fails() {
        let mut output = AnsiOutput::new(io::sink(), Size::new(4, 2));
        output.write(&mut OutputBuffer::new(4, 2)).unwrap();
        output.dispose().unwrap();
        assert_eq!(output.window_size(), Size::new(4, 2));
    }
}
