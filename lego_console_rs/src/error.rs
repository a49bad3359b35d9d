//! Error types shared by the device layer and the shells.

use thiserror::Error;

/// Marker MicroPython prints when a path does not exist.
const ENOENT_MARKER: &str = "OSError: [Errno 2] ENOENT";

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("device i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote program raised; carries the traceback text.
    #[error("remote execution failed: {traceback}")]
    Remote { traceback: String },

    #[error("unexpected response from device: {0}")]
    Protocol(String),

    #[error("failed to decode device output: {0}")]
    Decode(#[from] serde_json::Error),
}

impl DeviceError {
    pub fn remote(traceback: impl Into<String>) -> Self {
        Self::Remote {
            traceback: traceback.into(),
        }
    }

    /// The remote traceback reports a missing file or directory.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Remote { traceback } if traceback.contains(ENOENT_MARKER))
    }
}

/// Errors that end a single command.
///
/// `Device` and `Io` are reported at the command boundary and the shell keeps
/// running; `UnknownParser` is a defect in the command tables and ends the
/// session.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Not connected to a device!")]
    NotConnected,

    #[error("no argument parser for {subsystem}::{command}")]
    UnknownParser { subsystem: String, command: String },
}

impl ShellError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::UnknownParser { .. })
    }
}

pub type ShellResult<T> = Result<T, ShellError>;
