//! The driver facade and the application interface
//!
//! A [`ConsoleDriver`] bundles everything the main loop touches: the input
//! processor, the output buffer and the output it is flushed to, the size
//! monitor, the request scheduler and the timers. It only exists once both
//! the input and the output side have been constructed.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::size_monitor::WindowSizeMonitor;
use super::timed_events::{IdleToken, TimedEvents, TimeoutToken};
use crate::ansi::{AnsiEscapeSequenceRequest, AnsiRequestScheduler};
use crate::config::RuntimeConfig;
use crate::core::{OutputBuffer, Point, Size};
use crate::error::Result;
use crate::input::{InputProcessor, InputUnit, KeyEvent, MouseEvent};
use crate::renderer::ConsoleOutput;

/// What the main loop drives. Everything here runs on the main-loop thread.
pub trait Application {
    /// Whether `draw` should run this iteration
    fn needs_draw(&self) -> bool {
        false
    }

    /// Draw into the buffer; only changed cells are sent to the terminal
    fn draw(&mut self, buffer: &mut OutputBuffer);

    /// Where to show the terminal cursor, or None to hide it
    fn cursor(&self) -> Option<Point> {
        None
    }

    fn on_key_down(&mut self, _event: &mut KeyEvent) {}

    fn on_key_up(&mut self, _event: &mut KeyEvent) {}

    fn on_mouse(&mut self, _event: &mut MouseEvent) {}

    /// The buffer has already been resized when this is called
    fn on_resized(&mut self, _size: Size) {}
}

pub struct ConsoleDriver<T> {
    pub(crate) processor: InputProcessor<T>,
    pub(crate) buffer: OutputBuffer,
    pub(crate) output: Box<dyn ConsoleOutput>,
    pub(crate) size_monitor: WindowSizeMonitor,
    pub(crate) scheduler: AnsiRequestScheduler,
    timers: Arc<TimedEvents>,
    token: CancellationToken,
}

impl<T: InputUnit> ConsoleDriver<T> {
    pub fn new(
        processor: InputProcessor<T>,
        output: Box<dyn ConsoleOutput>,
        config: &RuntimeConfig,
        timers: Arc<TimedEvents>,
        token: CancellationToken,
    ) -> Self {
        let mut size_monitor = WindowSizeMonitor::new();
        size_monitor.poll(output.as_ref());
        let size = output.window_size();
        Self {
            processor,
            buffer: OutputBuffer::new(size.cols as usize, size.rows as usize),
            output,
            size_monitor,
            scheduler: AnsiRequestScheduler::new(config.request_throttle(), config.stale_request_timeout()),
            timers,
            token,
        }
    }

    pub fn processor(&self) -> &InputProcessor<T> {
        &self.processor
    }

    /// Register key and mouse handlers here
    pub fn processor_mut(&mut self) -> &mut InputProcessor<T> {
        &mut self.processor
    }

    pub fn buffer(&self) -> &OutputBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut OutputBuffer {
        &mut self.buffer
    }

    pub fn output_mut(&mut self) -> &mut dyn ConsoleOutput {
        self.output.as_mut()
    }

    pub fn size_monitor_mut(&mut self) -> &mut WindowSizeMonitor {
        &mut self.size_monitor
    }

    /// Shared with other threads that need to schedule work on the loop
    pub fn timers(&self) -> &Arc<TimedEvents> {
        &self.timers
    }

    pub fn add_timeout(&self, interval: Duration, callback: impl FnMut() -> bool + Send + 'static) -> TimeoutToken {
        self.timers.add_timeout(interval, callback)
    }

    pub fn remove_timeout(&self, token: TimeoutToken) -> bool {
        self.timers.remove_timeout(token)
    }

    pub fn add_idle(&self, callback: impl FnMut() -> bool + Send + 'static) -> IdleToken {
        self.timers.add_idle(callback)
    }

    pub fn remove_idle(&self, token: IdleToken) -> bool {
        self.timers.remove_idle(token)
    }

    /// Send a terminal query now, or queue it until its terminator is free
    pub fn send_request(&mut self, request: AnsiEscapeSequenceRequest) -> Result<bool> {
        self.scheduler
            .send_or_schedule(request, self.processor.parser_mut(), self.output.as_mut())
    }

    /// Ask the main loop to stop after the current iteration
    pub fn request_stop(&self) {
        self.token.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }
}
