//! ttycore - terminal runtime core
//!
//! The layer between a widget toolkit and a raw terminal.
//!
//! # Overview
//!
//! ttycore provides:
//! - An ANSI response parser that separates typed input from terminal
//!   replies, key sequences and mouse reports
//! - A mouse interpreter turning presses and releases into clicks,
//!   double-clicks and triple-clicks
//! - A two-thread session: a polling input thread and a main loop that
//!   drains input, runs timers and flushes output
//! - A diffing output writer that only sends changed cells
//!
//! # Example
//!
//! ```no_run
//! use ttycore::core::{OutputBuffer, Size};
//! use ttycore::input::{headless_input, ConsoleReader};
//! use ttycore::renderer::{AnsiOutput, ConsoleOutput};
//! use ttycore::runtime::{Application, MainLoopCoordinator};
//! use ttycore::RuntimeConfig;
//!
//! struct Hello;
//!
//! impl Application for Hello {
//!     fn needs_draw(&self) -> bool {
//!         true
//!     }
//!
//!     fn draw(&mut self, buffer: &mut OutputBuffer) {
//!         buffer.move_to(2, 1);
//!         buffer.add_str("Hello!");
//!     }
//! }
//!
//! # async fn demo() -> ttycore::Result<()> {
//! let (reader, feed) = headless_input::<char>();
//! let mut session = MainLoopCoordinator::new(
//!     RuntimeConfig::default(),
//!     move || Ok(Box::new(reader) as Box<dyn ConsoleReader<char>>),
//!     || Ok(Box::new(AnsiOutput::new(std::io::sink(), Size::new(80, 24))) as Box<dyn ConsoleOutput>),
//! );
//! session.start_async().await?;
//! feed.push_str("q");
//! session.run_iteration(&mut Hello)?;
//! session.stop()?;
//! # Ok(())
//! # }
//! ```

pub mod ansi;
pub mod clock;
pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod input;
pub mod renderer;
pub mod runtime;

// Re-export commonly used types
pub use ansi::{AnsiEscapeSequenceRequest, AnsiResponseParser, ParsedEvent, ParserState};
pub use config::RuntimeConfig;
pub use core::{Attribute, Cell, Color, OutputBuffer, Point, Size};
pub use error::{Error, Result};
pub use events::{EventHandlers, Handled, HandlerId};
pub use input::{Key, KeyCode, KeyEvent, Modifiers, MouseEvent, MouseFlags};
pub use renderer::{AnsiOutput, ConsoleOutput, CursorVisibility, MouseMode};
pub use runtime::{Application, ConsoleDriver, MainLoopCoordinator};
