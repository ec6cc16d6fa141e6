//! OS action providers
//!
//! Every provider call returns an [`ActionResult`]; failures are reported
//! as a message naming the attempted operation, never as an error.

mod desktop;
mod keys;
mod lookup;
mod system_info;

use std::path::Path;

use serde::Serialize;

pub use desktop::{DesktopActions, Launcher};

/// Outcome of one provider call; `message` is always spoken
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResult {
    pub succeeded: bool,
    pub message: String,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            message: message.into(),
        }
    }
}

/// Volume sub-actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeAction {
    Up,
    Down,
    ToggleMute,
    Unmute,
}

/// Power sub-actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerAction {
    Shutdown,
    Restart,
    Cancel,
}

/// One blocking call per action type
pub trait SystemActions: Send + Sync {
    /// Open a file, folder or application by path or name
    fn open_target(&self, target: &str) -> ActionResult;

    /// Open an absolute URL in the default browser
    fn open_url(&self, url: &str) -> ActionResult;

    /// Seven-line telemetry report
    fn system_info(&self) -> ActionResult;

    /// Capture the full screen to the desktop
    fn screenshot(&self) -> ActionResult;

    /// Numbered listing of `dir`, or the working directory
    fn list_files(&self, dir: Option<&Path>) -> ActionResult;

    fn volume(&self, action: VolumeAction) -> ActionResult;

    /// Schedule or cancel a delayed shutdown/restart
    fn power(&self, action: PowerAction) -> ActionResult;

    /// Create `name` relative to the working directory
    fn create_file(&self, name: &str, content: &str) -> ActionResult;

    /// Press a key combination such as `["ctrl", "shift", "t"]`
    fn send_keystroke(&self, keys: &[String]) -> ActionResult;
}
