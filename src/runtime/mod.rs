//! Session runtime: the input thread, the main loop and their coordinator

pub mod coordinator;
pub mod driver;
pub mod main_loop;
pub mod size_monitor;
pub mod timed_events;

pub use coordinator::{InputFactory, MainLoopCoordinator, OutputFactory};
pub use driver::{Application, ConsoleDriver};
pub use main_loop::MainLoop;
pub use size_monitor::{SizeChangedEvent, WindowSizeMonitor};
pub use timed_events::{IdleToken, TimedEvents, TimeoutToken};
