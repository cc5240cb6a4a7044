//! Callbacks consumed by the outer framework.

use crate::frame::CapturedFrame;

/// Why a session failed to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Fatal configuration or driver error.
    Error,

    /// The camera was taken by another client.
    Disconnected,
}

/// Session lifecycle and frame callbacks.
///
/// All methods are invoked on the camera thread.
pub trait SessionEvents: Send + Sync {
    /// Invoked exactly once, before any open attempt.
    fn on_camera_opening(&self);

    /// Invoked for every frame delivered while the session is running.
    fn on_frame_captured(&self, frame: CapturedFrame);

    /// Invoked exactly once, on the stop transition.
    fn on_camera_closed(&self);

    /// Invoked when the camera is evicted by another client.
    fn on_camera_disconnected(&self);

    /// Invoked on a fatal driver error.
    fn on_camera_error(&self, message: &str);
}

/// One-shot result callback for session construction.
///
/// Exactly one of the two methods is invoked per create request.
pub trait CreateSessionCallback: Send {
    /// The session opened and the preview is running.
    fn on_done(&self);

    /// The session could not be constructed; the driver handle was
    /// released.
    fn on_failure(&self, kind: FailureKind, message: &str);
}
