//! Input side of the runtime
//!
//! - `console`: the input thread's poll loop and the reader trait
//! - `processor`: parsing and event dispatch on the main loop
//! - `interpreter`: click/double-click/drag detection
//! - `key`, `mouse`: event values

pub mod console;
pub mod headless;
pub mod interpreter;
pub mod key;
pub mod mouse;
pub mod processor;
#[cfg(unix)]
pub mod unix;

pub use console::{ConsoleInput, ConsoleReader, InputUnit, KeyRecord};
pub use headless::{headless_input, HeadlessFeed, HeadlessReader};
pub use interpreter::{ButtonStateRecord, MouseButtonSequence, MouseInterpreter};
pub use key::{Key, KeyCode, KeyEvent, Modifiers};
pub use mouse::{HitTest, MouseEvent, MouseFlags, ViewHit, ViewId, BUTTON_COUNT};
pub use processor::{InputEvent, InputProcessor};
#[cfg(unix)]
pub use unix::UnixConsoleReader;
