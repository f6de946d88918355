//! One frame at a time
//!
//! Each iteration is a single non-blocking pass:
//! 1. drain and dispatch input
//! 2. retry queued terminal requests
//! 3. run due timers, then idle handlers
//! 4. poll the terminal size
//! 5. draw if the application asks for it, flush dirty cells
//! 6. place the cursor

use std::time::{Duration, Instant};

use log::{debug, info};
use tokio_util::sync::CancellationToken;

use super::driver::{Application, ConsoleDriver};
use crate::core::Point;
use crate::error::Result;
use crate::input::{InputEvent, InputUnit};
use crate::renderer::CursorVisibility;

pub struct MainLoop<T> {
    driver: ConsoleDriver<T>,
    frame_budget: Duration,
    last_cursor: Option<Point>,
    iterations: u64,
}

impl<T> MainLoop<T> {
    pub fn new(driver: ConsoleDriver<T>, frame_budget: Duration) -> Self {
        Self {
            driver,
            frame_budget,
            last_cursor: None,
            iterations: 0,
        }
    }

    pub fn driver(&self) -> &ConsoleDriver<T> {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut ConsoleDriver<T> {
        &mut self.driver
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }
}

impl<T: InputUnit> MainLoop<T> {
    /// Run one pass
    pub fn iteration(&mut self, app: &mut dyn Application) -> Result<()> {
        self.iterations += 1;
        let driver = &mut self.driver;

        driver.processor.process_queue();
        for event in driver.processor.take_events() {
            match event {
                InputEvent::KeyDown(mut ev) => app.on_key_down(&mut ev),
                InputEvent::KeyUp(mut ev) => app.on_key_up(&mut ev),
                InputEvent::Mouse(mut ev) => app.on_mouse(&mut ev),
            }
        }

        driver
            .scheduler
            .run_schedule(false, driver.processor.parser_mut(), driver.output.as_mut())?;

        driver.timers().lock_and_run_timers();
        driver.timers().lock_and_run_idles();

        let mut force_draw = false;
        if driver.size_monitor.poll(driver.output.as_ref()) {
            let size = driver.output.window_size();
            driver.buffer.resize(size.cols as usize, size.rows as usize);
            driver.output.reset();
            app.on_resized(size);
            force_draw = true;
        }

        let mut flushed = false;
        if force_draw || app.needs_draw() {
            app.draw(&mut driver.buffer);
        }
        if driver.buffer.is_dirty() {
            driver.output.write(&mut driver.buffer)?;
            flushed = true;
        }

        let cursor = app.cursor();
        match cursor {
            Some(pos) => {
                // A flush moves the terminal cursor, so put it back
                if flushed || self.last_cursor != cursor {
                    driver.output.set_cursor_position(pos.x as usize, pos.y as usize)?;
                }
                driver.output.set_cursor_visibility(CursorVisibility::Visible)?;
            }
            None => driver.output.set_cursor_visibility(CursorVisibility::Invisible)?,
        }
        self.last_cursor = cursor;
        Ok(())
    }

    /// Iterate until `token` is cancelled, padding each iteration to the
    /// frame budget
    pub async fn run(&mut self, app: &mut dyn Application, token: &CancellationToken) -> Result<()> {
        info!("Main loop started ({:?} frames)", self.frame_budget);
        while !token.is_cancelled() {
            let started = Instant::now();
            self.iteration(app)?;
            let remaining = self.frame_budget.saturating_sub(started.elapsed());
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(remaining) => {}
            }
        }
        debug!("Main loop ran {} iterations", self.iterations);
        info!("Main loop stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::core::{OutputBuffer, Size};
    use crate::input::{InputProcessor, KeyCode, KeyEvent};
    use crate::renderer::{AnsiOutput, CaptureWriter};
    use crate::runtime::TimedEvents;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc::{self, UnboundedSender};

    #[derive(Default)]
    struct Recorder {
        dirty: bool,
        keys: Vec<KeyCode>,
        draws: usize,
        cursor: Option<Point>,
        wake: Option<Arc<AtomicBool>>,
    }

    impl Application for Recorder {
        fn needs_draw(&self) -> bool {
            self.dirty || self.wake.as_ref().is_some_and(|w| w.swap(false, Ordering::SeqCst))
        }

        fn draw(&mut self, buffer: &mut OutputBuffer) {
            self.draws += 1;
            self.dirty = false;
            buffer.move_to(0, 0);
            buffer.add_str("ok");
        }

        fn cursor(&self) -> Option<Point> {
            self.cursor
        }

        fn on_key_down(&mut self, event: &mut KeyEvent) {
            self.keys.push(event.key.code);
            self.dirty = true;
        }
    }

    fn setup() -> (UnboundedSender<char>, CaptureWriter, MainLoop<char>) {
        let config = RuntimeConfig::default();
        let (tx, rx) = mpsc::unbounded_channel();
        let capture = CaptureWriter::new();
        let output = Box::new(AnsiOutput::new(capture.clone(), Size::new(10, 2)));
        let driver = ConsoleDriver::new(
            InputProcessor::new(rx, &config),
            output,
            &config,
            Arc::new(TimedEvents::new()),
            CancellationToken::new(),
        );
        (tx, capture, MainLoop::new(driver, Duration::from_millis(5)))
    }

    #[test]
    fn test_iteration_dispatches_draws_and_flushes() {
        let (tx, capture, mut main_loop) = setup();
        let mut app = Recorder::default();

        // First pass paints the initial blank screen
        main_loop.iteration(&mut app).unwrap();
        assert!(!main_loop.driver().buffer().is_dirty());
        capture.clear();

        tx.send('x').unwrap();
        main_loop.iteration(&mut app).unwrap();
        assert_eq!(app.keys, vec![KeyCode::Char('x')]);
        assert_eq!(app.draws, 1);
        assert!(capture.contents().contains("ok"));

        capture.clear();
        main_loop.iteration(&mut app).unwrap();
        assert_eq!(app.draws, 1);
        assert_eq!(capture.contents(), "");
    }

    #[test]
    fn test_cursor_placed_after_flush() {
        let (_tx, capture, mut main_loop) = setup();
        let mut app = Recorder {
            cursor: Some(Point::new(3, 1)),
            ..Default::default()
        };
        main_loop.iteration(&mut app).unwrap();
        assert!(capture.contents().ends_with("\x1b[2;4H"));
    }

    #[test]
    fn test_timers_and_idles_run() {
        let (_tx, _capture, mut main_loop) = setup();
        let hits = Arc::new(AtomicUsize::new(0));
        let (h1, h2) = (hits.clone(), hits.clone());
        main_loop.driver().add_timeout(Duration::ZERO, move || {
            h1.fetch_add(1, Ordering::SeqCst);
            false
        });
        main_loop.driver().add_idle(move || {
            h2.fetch_add(10, Ordering::SeqCst);
            false
        });
        main_loop.iteration(&mut Recorder::default()).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn test_timer_changes_drawn_same_iteration() {
        let (_tx, capture, mut main_loop) = setup();
        let mut app = Recorder::default();
        main_loop.iteration(&mut app).unwrap();
        capture.clear();

        let flag = Arc::new(AtomicBool::new(false));
        let set = flag.clone();
        main_loop.driver().add_timeout(Duration::ZERO, move || {
            set.store(true, Ordering::SeqCst);
            false
        });
        app.wake = Some(flag);
        main_loop.iteration(&mut app).unwrap();
        assert_eq!(app.draws, 1);
        assert!(capture.contents().contains("ok"));
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let (_tx, _capture, mut main_loop) = setup();
        let token = main_loop.driver().cancellation_token();
        let stopper = token.clone();
        main_loop.driver().add_timeout(Duration::from_millis(20), move || {
            stopper.cancel();
            false
        });
        main_loop.run(&mut Recorder::default(), &token).await.unwrap();
        assert!(main_loop.iterations() >= 2);
    }
}
