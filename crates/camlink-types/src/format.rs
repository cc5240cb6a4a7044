//! Capture format types negotiated with the camera driver.

use serde::{Deserialize, Serialize};

/// A frame size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,
}

impl Size {
    /// Create a new size.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Pixel area of this size.
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Aspect ratio (width over height).
    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A frame-rate range as reported by the driver, in milli-fps.
///
/// Drivers express preview frame rates as `fps * 1000`; a range of
/// `(15000, 30000)` means 15-30 fps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FramerateRange {
    /// Minimum frame rate in milli-fps.
    pub min: i32,

    /// Maximum frame rate in milli-fps.
    pub max: i32,
}

impl FramerateRange {
    /// Create a new frame-rate range.
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }
}

impl std::fmt::Display for FramerateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}:{}]", self.min, self.max)
    }
}

/// Pixel layout of a captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageFormat {
    /// Planar YUV 4:2:0 with interleaved VU chroma, the native preview
    /// format of the camera driver.
    Nv21,

    /// 8-bit RGBA.
    Rgba8888,
}

impl ImageFormat {
    /// Bits per pixel of this layout.
    pub fn bits_per_pixel(self) -> u32 {
        match self {
            Self::Nv21 => 12,
            Self::Rgba8888 => 32,
        }
    }
}

/// The capture format negotiated with the camera driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureFormat {
    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Preview frame-rate range in milli-fps.
    pub framerate: FramerateRange,

    /// Pixel layout of delivered frames.
    pub image_format: ImageFormat,
}

impl CaptureFormat {
    /// Create a new capture format with the native preview pixel layout.
    pub fn new(width: u32, height: u32, framerate: FramerateRange) -> Self {
        Self {
            width,
            height,
            framerate,
            image_format: ImageFormat::Nv21,
        }
    }

    /// Frame dimensions.
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Byte size of one frame in the negotiated pixel layout.
    ///
    /// Used to size preview callback buffers; recomputed from the format's
    /// bits-per-pixel so a non-NV21 negotiated layout sizes correctly.
    pub fn frame_size(&self) -> usize {
        let bits = self.width as usize * self.height as usize
            * self.image_format.bits_per_pixel() as usize;
        bits / 8
    }
}

impl std::fmt::Display for CaptureFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}@{}", self.width, self.height, self.framerate)
    }
}
