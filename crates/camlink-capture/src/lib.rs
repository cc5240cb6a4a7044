//! Single-camera capture session with a dedicated control thread.
//!
//! This crate opens a camera through the [`CameraEnumerator`] seam, selects
//! the capture format closest to the requested one, and delivers frames
//! either from a surface-texture listener or from a recycled pool of
//! preview callback buffers. All control operations are serialized onto the
//! camera thread owned by [`CameraController`].

mod controller;
mod device;
mod error;
mod events;
mod format;
mod frame;
mod metrics;
mod pool;
mod session;

pub mod virtual_device;

pub use controller::{CameraCommand, CameraController, SessionConfig, COMMAND_CHANNEL_CAPACITY};
pub use device::{
    CameraDevice, CameraEnumerator, CaptureMode, DeviceCapabilities, DeviceError,
    DeviceParameters, DriverFault, FixedOrientation, FlashMode, FocusMode, FocusRect,
    OrientationSource, TextureSource,
};
pub use camlink_types::ImageFormat;
pub use error::CaptureError;
pub use events::{CreateSessionCallback, FailureKind, SessionEvents};
pub use format::{
    closest_framerate_range, closest_size, select_capture_format, select_picture_size,
};
pub use frame::{frame_orientation, CapturedFrame, FrameReleaser, PlanarYuvFrame, TextureFrame};
pub use metrics::{MetricsCollector, MetricsSink, NoopMetrics};
pub use pool::BufferPool;
pub use session::{calculate_tap_area, CameraSession, SessionState, SharedSessionState};

/// Number of preview callback buffers lent to the driver in pixel mode.
pub const NUMBER_OF_CAPTURE_BUFFERS: usize = 3;

/// Zoom level change applied per zoom-in/zoom-out request.
pub const ZOOM_STEP: u32 = 4;

/// Side length of a tap-to-focus region in driver focus coordinates.
pub const FOCUS_AREA_SIZE: i32 = 250;

/// Half-range of the driver focus coordinate space (`[-1000, +1000]`).
pub const FOCUS_SPACE_BOUND: i32 = 1000;

/// Result type for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;
