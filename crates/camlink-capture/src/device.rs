//! The camera driver seam.
//!
//! The physical driver/HAL is an external collaborator; this module defines
//! the traits the session talks to. Production code plugs a real backend in
//! here, tests use [`crate::virtual_device`].

use std::sync::atomic::{AtomicU32, Ordering};

use bytes::BytesMut;
use thiserror::Error;

use camlink_types::{CameraInfo, FramerateRange, ImageFormat, Size};

use crate::error::CaptureError;
use crate::frame::TextureFrame;
use crate::CaptureResult;

/// A driver call failed.
///
/// Control-path failures are contained by the session (logged and
/// swallowed); open-path failures abort construction.
#[derive(Debug, Error)]
#[error("driver call failed: {0}")]
pub struct DeviceError(pub String);

/// Asynchronous driver error causes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverFault {
    /// The camera was taken by another client.
    Evicted,

    /// The camera server process died.
    ServerDied,

    /// Unspecified driver error code.
    Other(i32),
}

/// Flash modes the session drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashMode {
    Off,
    Torch,
}

/// Focus modes reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusMode {
    Auto,
    ContinuousVideo,
    Infinity,
    Fixed,
}

/// A rectangle in the driver focus coordinate space (`[-1000, +1000]²`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// Capability sets reported by an open driver handle.
#[derive(Debug, Clone, Default)]
pub struct DeviceCapabilities {
    /// Supported preview sizes.
    pub preview_sizes: Vec<Size>,

    /// Supported picture sizes.
    pub picture_sizes: Vec<Size>,

    /// Supported preview frame-rate ranges, in milli-fps.
    pub fps_ranges: Vec<FramerateRange>,

    /// Maximum zoom level; 0 means zoom is unsupported.
    pub max_zoom: u32,

    /// Maximum number of focus areas; 0 means unsupported.
    pub max_focus_areas: u32,

    /// Maximum number of metering areas; 0 means unsupported.
    pub max_metering_areas: u32,

    /// Focus modes the driver accepts.
    pub focus_modes: Vec<FocusMode>,

    /// Whether video stabilization can be enabled.
    pub supports_video_stabilization: bool,
}

/// Parameter block applied to the driver at open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceParameters {
    /// Preview frame-rate range, in milli-fps.
    pub framerate: FramerateRange,

    /// Preview size.
    pub preview_size: Size,

    /// Still picture size.
    pub picture_size: Size,

    /// Preview pixel layout; `None` in texture mode.
    pub preview_format: Option<ImageFormat>,

    /// Enable video stabilization.
    pub video_stabilization: bool,

    /// Focus mode to prefer, if any.
    pub focus_mode: Option<FocusMode>,

    /// Display orientation in degrees. The pipeline sets 0 and carries
    /// rotation as CVO metadata instead.
    pub display_orientation: u32,
}

/// Callback receiving one filled preview buffer per frame.
pub type PreviewCallback = Box<dyn FnMut(BytesMut) + Send>;

/// Callback receiving asynchronous driver errors.
pub type ErrorCallback = Box<dyn FnMut(DriverFault) + Send>;

/// An open camera driver handle.
///
/// All methods are called on the camera thread only. Callbacks registered
/// here may fire on driver-provided threads and must re-post their work.
pub trait CameraDevice: Send {
    /// Capability sets of this handle.
    fn capabilities(&self) -> DeviceCapabilities;

    /// Apply the open-time parameter block.
    fn apply_parameters(&mut self, params: &DeviceParameters) -> Result<(), DeviceError>;

    /// Start the preview stream.
    fn start_preview(&mut self) -> Result<(), DeviceError>;

    /// Stop the preview stream. May block; never fails.
    fn stop_preview(&mut self);

    /// Release the handle. The handle is unusable afterwards.
    fn release(&mut self);

    /// Lend a buffer to the driver for the next preview frame.
    fn queue_buffer(&mut self, buffer: BytesMut);

    /// Register the per-frame preview callback (pixel mode).
    fn set_preview_callback(&mut self, callback: PreviewCallback);

    /// Register the asynchronous error callback.
    fn set_error_callback(&mut self, callback: ErrorCallback);

    /// Current zoom level.
    fn zoom(&self) -> Result<u32, DeviceError>;

    /// Set the zoom level.
    fn set_zoom(&mut self, level: u32) -> Result<(), DeviceError>;

    /// Set the flash mode.
    fn set_flash_mode(&mut self, mode: FlashMode) -> Result<(), DeviceError>;

    /// Currently active focus mode.
    fn focus_mode(&self) -> Result<FocusMode, DeviceError>;

    /// Set the focus areas.
    fn set_focus_areas(&mut self, areas: &[FocusRect]) -> Result<(), DeviceError>;

    /// Set the metering areas.
    fn set_metering_areas(&mut self, areas: &[FocusRect]) -> Result<(), DeviceError>;

    /// Cancel any in-progress autofocus.
    fn cancel_autofocus(&mut self) -> Result<(), DeviceError>;

    /// Trigger a one-shot autofocus.
    fn trigger_autofocus(&mut self) -> Result<(), DeviceError>;
}

/// Maps camera names to driver ids and opens handles.
pub trait CameraEnumerator: Send {
    /// Driver id for a camera name, or `None` if unknown.
    fn camera_id(&self, name: &str) -> Option<usize>;

    /// Static description of a camera.
    fn camera_info(&self, id: usize) -> CaptureResult<CameraInfo>;

    /// Open a driver handle.
    fn open(&self, id: usize) -> CaptureResult<Box<dyn CameraDevice>>;
}

/// Callback receiving texture-path frames from the surface listener.
pub type TextureFrameCallback = Box<dyn FnMut(TextureFrame) + Send>;

/// The platform surface-texture helper (texture mode collaborator).
pub trait TextureSource: Send {
    /// Resize the backing surface texture to the negotiated preview size.
    fn set_texture_size(&mut self, size: Size);

    /// Start delivering texture frames. Frames arrive on the camera
    /// thread.
    fn start_listening(&mut self, callback: TextureFrameCallback);

    /// Stop delivering frames and break the callback edge.
    fn stop_listening(&mut self);
}

/// How frames leave the driver.
pub enum CaptureMode {
    /// GPU path through a surface-texture listener.
    Texture(Box<dyn TextureSource>),

    /// CPU path through pooled preview callback buffers.
    PixelBuffer,
}

impl std::fmt::Debug for CaptureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Texture(_) => f.write_str("Texture"),
            Self::PixelBuffer => f.write_str("PixelBuffer"),
        }
    }
}

/// Reports the current display rotation in degrees.
pub trait OrientationSource: Send + Sync {
    /// One of 0, 90, 180, 270.
    fn display_rotation(&self) -> u32;
}

/// An [`OrientationSource`] holding an explicit rotation value.
pub struct FixedOrientation {
    degrees: AtomicU32,
}

impl FixedOrientation {
    /// Create a source reporting `degrees`.
    pub fn new(degrees: u32) -> Self {
        Self {
            degrees: AtomicU32::new(degrees),
        }
    }

    /// Change the reported rotation.
    pub fn set(&self, degrees: u32) {
        self.degrees.store(degrees, Ordering::Release);
    }
}

impl OrientationSource for FixedOrientation {
    fn display_rotation(&self) -> u32 {
        self.degrees.load(Ordering::Acquire)
    }
}

impl From<DeviceError> for CaptureError {
    fn from(err: DeviceError) -> Self {
        Self::Driver(err.0)
    }
}
