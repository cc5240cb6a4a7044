//! Error types for the capture crate.

use thiserror::Error;

/// Errors that can occur while opening or controlling a capture session.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Bad camera name or an empty driver capability set.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The driver refused to open or failed to apply parameters.
    #[error("failed to open camera: {0}")]
    Open(String),

    /// Asynchronous driver error while the session was running.
    #[error("driver error: {0}")]
    Driver(String),

    /// A mutating session operation was invoked off the camera thread.
    #[error("operation invoked off the camera thread")]
    WrongThread,
}
