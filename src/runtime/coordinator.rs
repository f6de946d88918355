//! Session startup and shutdown
//!
//! The coordinator owns the two threads of a session. The platform reader
//! is created by a factory that runs on the input thread itself, and the
//! output by a factory that runs on the caller's thread, so neither handle
//! ever crosses threads. The [`ConsoleDriver`] is assembled only after both
//! sides exist.

use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use log::{error, info, warn};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::driver::{Application, ConsoleDriver};
use super::main_loop::MainLoop;
use super::timed_events::TimedEvents;
use crate::config::RuntimeConfig;
use crate::error::{Error, Result};
use crate::input::{ConsoleInput, ConsoleReader, InputProcessor, InputUnit};
use crate::renderer::ConsoleOutput;

/// Builds the platform reader on the input thread
pub type InputFactory<T> = Box<dyn FnOnce() -> Result<Box<dyn ConsoleReader<T>>> + Send>;
/// Builds the output on the main-loop thread
pub type OutputFactory = Box<dyn FnOnce() -> Result<Box<dyn ConsoleOutput>>>;

pub struct MainLoopCoordinator<T> {
    config: RuntimeConfig,
    input_factory: Option<InputFactory<T>>,
    output_factory: Option<OutputFactory>,
    token: CancellationToken,
    timers: Arc<TimedEvents>,
    input_thread: Option<JoinHandle<Result<()>>>,
    input_thread_id: Option<ThreadId>,
    /// Parts waiting for the facade
    input_ready: Option<InputProcessor<T>>,
    output_ready: Option<Box<dyn ConsoleOutput>>,
    main_loop: Option<MainLoop<T>>,
    started: bool,
    stopped: bool,
}

impl<T: InputUnit> MainLoopCoordinator<T> {
    pub fn new(
        config: RuntimeConfig,
        input_factory: impl FnOnce() -> Result<Box<dyn ConsoleReader<T>>> + Send + 'static,
        output_factory: impl FnOnce() -> Result<Box<dyn ConsoleOutput>> + 'static,
    ) -> Self {
        Self {
            config,
            input_factory: Some(Box::new(input_factory)),
            output_factory: Some(Box::new(output_factory)),
            token: CancellationToken::new(),
            timers: Arc::new(TimedEvents::new()),
            input_thread: None,
            input_thread_id: None,
            input_ready: None,
            output_ready: None,
            main_loop: None,
            started: false,
            stopped: false,
        }
    }

    /// Start the input thread, build the output, and wait (bounded) until
    /// the input side is ready
    pub async fn start_async(&mut self) -> Result<()> {
        if self.started {
            return Err(Error::AlreadyInitialized);
        }
        self.started = true;
        let (Some(input_factory), Some(output_factory)) = (self.input_factory.take(), self.output_factory.take())
        else {
            return Err(Error::AlreadyInitialized);
        };

        let (queue_tx, queue_rx) = mpsc::unbounded_channel::<T>();
        let (ready_tx, ready_rx) = oneshot::channel::<()>();
        let token = self.token.clone();
        let poll_interval = self.config.poll_interval();

        let handle = thread::Builder::new()
            .name("console-input".into())
            .spawn(move || -> Result<()> {
                let reader = input_factory()?;
                let mut input = ConsoleInput::new(reader, queue_tx, poll_interval);
                // The starter may have timed out already
                let _ = ready_tx.send(());
                let result = input.run(&token);
                if result.is_err() {
                    // Take the main loop down with us
                    token.cancel();
                }
                result
            })
            .map_err(|e| Error::StartupFailed(e.to_string()))?;
        self.input_thread_id = Some(handle.thread().id());
        self.input_thread = Some(handle);
        info!("Input thread spawned");

        let output = match output_factory() {
            Ok(output) => output,
            Err(e) => {
                error!("Output construction failed: {}", e);
                self.abort_input();
                return Err(e);
            }
        };
        self.output_ready = Some(output);

        let timeout = self.config.startup_timeout();
        match tokio::time::timeout(timeout, ready_rx).await {
            Ok(Ok(())) => {
                self.input_ready = Some(InputProcessor::new(queue_rx, &self.config));
            }
            Ok(Err(_)) => {
                // The thread dropped its sender: it is exiting with an error
                let reason = match self.join_input() {
                    Err(e) => e.to_string(),
                    Ok(()) => "input thread exited before it was ready".to_string(),
                };
                error!("Input thread failed during startup: {}", reason);
                self.dispose_output();
                return Err(Error::StartupFailed(reason));
            }
            Err(_) => {
                error!("Input thread not ready after {:?}", timeout);
                // It may still be inside the factory; stop() joins it once
                // the factory returns and sees the cancelled token
                self.token.cancel();
                self.dispose_output();
                return Err(Error::StartupTimeout(timeout));
            }
        }

        self.build_facade_if_possible();
        info!("Console session started");
        Ok(())
    }

    /// Assemble the driver once both sides are present
    fn build_facade_if_possible(&mut self) -> bool {
        if self.main_loop.is_some() {
            return true;
        }
        let (Some(processor), Some(output)) = (self.input_ready.take(), self.output_ready.take()) else {
            return false;
        };
        let driver = ConsoleDriver::new(
            processor,
            output,
            &self.config,
            self.timers.clone(),
            self.token.clone(),
        );
        self.main_loop = Some(MainLoop::new(driver, self.config.frame_budget()));
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.main_loop.is_some()
    }

    pub fn driver(&self) -> Result<&ConsoleDriver<T>> {
        self.main_loop.as_ref().map(MainLoop::driver).ok_or(Error::NotInitialized)
    }

    pub fn driver_mut(&mut self) -> Result<&mut ConsoleDriver<T>> {
        self.main_loop
            .as_mut()
            .map(MainLoop::driver_mut)
            .ok_or(Error::NotInitialized)
    }

    /// Timers can be registered before startup
    pub fn timers(&self) -> &Arc<TimedEvents> {
        &self.timers
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// One main-loop pass
    pub fn run_iteration(&mut self, app: &mut dyn Application) -> Result<()> {
        self.main_loop.as_mut().ok_or(Error::NotInitialized)?.iteration(app)
    }

    /// Run the main loop until cancelled. A failure of the input thread
    /// ends the loop and is returned here.
    pub async fn run(&mut self, app: &mut dyn Application) -> Result<()> {
        let token = self.token.clone();
        self.main_loop
            .as_mut()
            .ok_or(Error::NotInitialized)?
            .run(app, &token)
            .await?;
        // Cancelled: the input thread exits within one poll interval
        self.join_input()
    }

    /// Shut the session down: cancel, resolve held mouse buttons, restore
    /// the terminal, and wait for the input thread. Later calls do nothing.
    pub fn stop(&mut self) -> Result<()> {
        if self.input_thread_id == Some(thread::current().id()) {
            return Err(Error::InvalidOperation("stop() called from the input thread"));
        }
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        info!("Stopping console session");
        self.token.cancel();

        let mut result = Ok(());
        if let Some(main_loop) = self.main_loop.as_mut() {
            let driver = main_loop.driver_mut();
            driver.processor.release_mouse();
            result = driver.output.dispose();
        }
        self.dispose_output();

        if let Err(e) = self.join_input() {
            warn!("Input thread ended with an error: {}", e);
        }
        info!("Console session stopped");
        result
    }

    fn dispose_output(&mut self) {
        if let Some(output) = self.output_ready.as_mut() {
            if let Err(e) = output.dispose() {
                warn!("Failed to restore terminal: {}", e);
            }
        }
    }

    fn abort_input(&mut self) {
        self.token.cancel();
        if let Err(e) = self.join_input() {
            warn!("Input thread ended with an error: {}", e);
        }
    }

    /// Wait for the input thread and return its result
    fn join_input(&mut self) -> Result<()> {
        let Some(handle) = self.input_thread.take() else {
            return Ok(());
        };
        match handle.join() {
            Ok(result) => result,
            Err(_) => Err(Error::StartupFailed("input thread panicked".into())),
        }
    }
}

impl<T> Drop for MainLoopCoordinator<T> {
    fn drop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.token.cancel();
        if let Some(main_loop) = self.main_loop.as_mut() {
            if let Err(e) = main_loop.driver_mut().output.dispose() {
                warn!("Failed to restore terminal: {}", e);
            }
        }
        if let Some(output) = self.output_ready.as_mut() {
            if let Err(e) = output.dispose() {
                warn!("Failed to restore terminal: {}", e);
            }
        }
        if let Some(handle) = self.input_thread.take() {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                error!("Input thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{OutputBuffer, Size};
    use crate::input::{headless_input, HeadlessFeed, KeyCode, KeyEvent};
    use crate::renderer::{AnsiOutput, CaptureWriter};
    use std::time::Duration;

    #[derive(Default)]
    struct Keys(Vec<KeyCode>);

    impl Application for Keys {
        fn draw(&mut self, _buffer: &mut OutputBuffer) {}

        fn on_key_down(&mut self, event: &mut KeyEvent) {
            self.0.push(event.key.code);
        }
    }

    fn config() -> RuntimeConfig {
        RuntimeConfig {
            poll_interval_ms: 1,
            frame_budget_ms: 5,
            startup_timeout_ms: 2_000,
            ..RuntimeConfig::default()
        }
    }

    fn headless_coordinator() -> (MainLoopCoordinator<char>, HeadlessFeed<char>, CaptureWriter) {
        let (reader, feed) = headless_input::<char>();
        let capture = CaptureWriter::new();
        let out = capture.clone();
        let coordinator = MainLoopCoordinator::new(
            config(),
            move || Ok(Box::new(reader) as Box<dyn ConsoleReader<char>>),
            move || {
                let mut output = AnsiOutput::new(out, Size::new(20, 5));
                output.init()?;
                Ok(Box::new(output) as Box<dyn ConsoleOutput>)
            },
        );
        (coordinator, feed, capture)
    }

    #[tokio::test]
    async fn test_start_iterate_stop() {
        let (mut coordinator, feed, capture) = headless_coordinator();
        assert!(matches!(coordinator.driver_mut(), Err(Error::NotInitialized)));

        coordinator.start_async().await.unwrap();
        assert!(coordinator.is_initialized());
        assert_eq!(coordinator.driver().unwrap().buffer().size(), Size::new(20, 5));

        feed.push_str("hi");
        let mut app = Keys::default();
        for _ in 0..200 {
            coordinator.run_iteration(&mut app).unwrap();
            if app.0.len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(app.0, vec![KeyCode::Char('h'), KeyCode::Char('i')]);

        coordinator.stop().unwrap();
        assert!(feed.is_reader_dropped());
        assert!(capture.contents().ends_with("\x1b[2J\x1b[H"));

        capture.clear();
        coordinator.stop().unwrap();
        assert_eq!(capture.contents(), "");
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let (mut coordinator, _feed, _capture) = headless_coordinator();
        coordinator.start_async().await.unwrap();
        assert!(matches!(coordinator.start_async().await, Err(Error::AlreadyInitialized)));
        coordinator.stop().unwrap();
    }

    #[tokio::test]
    async fn test_input_factory_failure_fails_startup() {
        let mut coordinator = MainLoopCoordinator::<char>::new(
            config(),
            || Err(Error::StartupFailed("no console".into())),
            || Ok(Box::new(AnsiOutput::new(std::io::sink(), Size::new(1, 1))) as Box<dyn ConsoleOutput>),
        );
        match coordinator.start_async().await {
            Err(Error::StartupFailed(reason)) => assert!(reason.contains("no console")),
            other => panic!("expected startup failure, got {:?}", other.err()),
        }
        assert!(!coordinator.is_initialized());
    }

    #[tokio::test]
    async fn test_slow_input_factory_times_out() {
        let (reader, feed) = headless_input::<char>();
        let mut coordinator = MainLoopCoordinator::new(
            RuntimeConfig {
                startup_timeout_ms: 20,
                ..config()
            },
            move || {
                std::thread::sleep(Duration::from_millis(200));
                Ok(Box::new(reader) as Box<dyn ConsoleReader<char>>)
            },
            || Ok(Box::new(AnsiOutput::new(std::io::sink(), Size::new(1, 1))) as Box<dyn ConsoleOutput>),
        );
        assert!(matches!(coordinator.start_async().await, Err(Error::StartupTimeout(_))));
        assert!(coordinator.cancellation_token().is_cancelled());
        assert!(!feed.is_reader_dropped());

        // Waits out the factory, then the thread sees the cancelled token
        coordinator.stop().unwrap();
        assert!(feed.is_reader_dropped());
    }

    #[tokio::test]
    async fn test_input_failure_ends_run() {
        let (mut coordinator, feed, _capture) = headless_coordinator();
        coordinator.start_async().await.unwrap();
        feed.fail_with("device gone");
        let err = coordinator.run(&mut Keys::default()).await.unwrap_err();
        assert!(matches!(err, Error::PlatformReadFailure(_)));
        coordinator.stop().unwrap();
    }
}
