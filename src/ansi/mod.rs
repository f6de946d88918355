//! ANSI escape handling on both sides of the terminal:
//! - Sequences we write (cursor movement, SGR, screen modes)
//! - Responses we read back (replies to queries, keys, mouse reports)

pub mod keyboard;
pub mod mouse;
pub mod request;
pub mod response_parser;
pub mod sequences;

pub use keyboard::AnsiKeyboardParser;
pub use mouse::AnsiMouseParser;
pub use request::{AnsiEscapeSequenceRequest, AnsiRequestScheduler};
pub use response_parser::{AnsiResponseParser, ParsedEvent, ParserState};
