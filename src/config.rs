//! Runtime configuration
//!
//! All timing knobs of the runtime live here. Every field has a default so a
//! partial JSON document (or none at all) is enough:
//!
//! ```json
//! {"frame_budget_ms": 33, "mouse_mode": "button"}
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::renderer::MouseMode;

/// Tunables for a console session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// How long a partial escape sequence may sit in the parser before it is
    /// released as literal input
    pub escape_timeout_ms: u64,
    /// Sleep between console polls on the input thread
    pub poll_interval_ms: u64,
    /// Target duration of one main-loop iteration
    pub frame_budget_ms: u64,
    /// Bounded wait for the input thread during startup
    pub startup_timeout_ms: u64,
    /// Window in which a follow-up press continues a multi-click
    pub repeated_click_threshold_ms: u64,
    /// Cells the pointer may travel while pressed before a click becomes a drag
    pub drag_threshold: u16,
    /// Minimum gap between two requests sharing a terminator
    pub request_throttle_ms: u64,
    /// Age after which an unanswered request is abandoned
    pub stale_request_timeout_ms: u64,
    /// Recognize SGR mouse reports in the input stream
    pub handle_mouse: bool,
    /// Recognize cursor and function key sequences in the input stream
    pub handle_keyboard: bool,
    /// Mouse tracking mode requested from the terminal
    #[serde(with = "mouse_mode_serde")]
    pub mouse_mode: MouseMode,
    /// Switch to the alternate screen while the session runs
    pub alternate_screen: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            escape_timeout_ms: 50,
            poll_interval_ms: 20,
            frame_budget_ms: 50,
            startup_timeout_ms: 5_000,
            repeated_click_threshold_ms: 500,
            drag_threshold: 1,
            request_throttle_ms: 100,
            stale_request_timeout_ms: 1_000,
            handle_mouse: true,
            handle_keyboard: true,
            mouse_mode: MouseMode::Sgr,
            alternate_screen: true,
        }
    }
}

impl RuntimeConfig {
    /// Parse a JSON document, filling missing fields with defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(Error::PlatformReadFailure)?;
        Self::from_json(&text)
    }

    pub fn escape_timeout(&self) -> Duration {
        Duration::from_millis(self.escape_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn frame_budget(&self) -> Duration {
        Duration::from_millis(self.frame_budget_ms)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn repeated_click_threshold(&self) -> Duration {
        Duration::from_millis(self.repeated_click_threshold_ms)
    }

    pub fn request_throttle(&self) -> Duration {
        Duration::from_millis(self.request_throttle_ms)
    }

    pub fn stale_request_timeout(&self) -> Duration {
        Duration::from_millis(self.stale_request_timeout_ms)
    }
}

mod mouse_mode_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::renderer::MouseMode;

    pub fn serialize<S: Serializer>(mode: &MouseMode, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(mode.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<MouseMode, D::Error> {
        let s = String::deserialize(d)?;
        Ok(MouseMode::from_str(&s))
    }
}
