//! Error types shared by every layer of the runtime.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong inside the runtime core.
///
/// Protocol ambiguity (a lone ESC, a half-received sequence) is *not* an
/// error; it is resolved by the parser's timeout release and never shows up
/// here.
#[derive(Debug, Error)]
pub enum Error {
    /// A request could not be matched unambiguously (e.g. an empty terminator
    /// would match every response).
    #[error("ambiguous: {0}")]
    Ambiguous(String),

    /// A named command or request is not known to the runtime
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// The driver facade was used before startup completed
    #[error("console driver is not initialized")]
    NotInitialized,

    /// Startup was requested twice on the same coordinator
    #[error("console driver is already initialized")]
    AlreadyInitialized,

    /// Writing to the terminal failed
    #[error("terminal write failed: {0}")]
    PlatformWriteFailure(#[source] io::Error),

    /// Reading from the console failed
    #[error("console read failed: {0}")]
    PlatformReadFailure(#[source] io::Error),

    /// The input thread exited before it signalled readiness
    #[error("input thread failed during startup: {0}")]
    StartupFailed(String),

    /// The input thread did not signal readiness in time
    #[error("input thread not ready after {0:?}")]
    StartupTimeout(Duration),

    /// An API was used from the wrong place or in the wrong order
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),

    /// Configuration could not be parsed
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}
