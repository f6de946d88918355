//! Terminal resize detection by polling

use log::info;

use crate::core::Size;
use crate::events::{EventHandlers, Handled};
use crate::renderer::ConsoleOutput;

/// Raised when the terminal size changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeChangedEvent {
    pub size: Size,
    pub handled: bool,
}

impl Handled for SizeChangedEvent {
    fn handled(&self) -> bool {
        self.handled
    }
}

pub struct WindowSizeMonitor {
    last: Option<Size>,
    pub size_changed: EventHandlers<SizeChangedEvent>,
}

impl WindowSizeMonitor {
    pub fn new() -> Self {
        Self {
            last: None,
            size_changed: EventHandlers::new(),
        }
    }

    /// Size seen by the last poll
    pub fn last_size(&self) -> Option<Size> {
        self.last
    }

    /// Query the output and raise `size_changed` if the size differs from
    /// the last poll. The first poll only records the size.
    pub fn poll(&mut self, output: &dyn ConsoleOutput) -> bool {
        let size = output.window_size();
        match self.last.replace(size) {
            Some(previous) if previous != size => {
                info!("Terminal resized to {}x{}", size.cols, size.rows);
                let mut event = SizeChangedEvent { size, handled: false };
                self.size_changed.raise(&mut event);
                true
            }
            _ => false,
        }
    }
}

impl Default for WindowSizeMonitor {
    fn default() -> Self {
        Self::new()
    }
}
