//! Captured frame types and rotation rules.

use bytes::BytesMut;
use crossbeam_channel::Sender;
use tracing::trace;

use camlink_types::{CameraFacing, CameraInfo, Matrix3};

use crate::controller::CameraCommand;

/// A frame delivered through the GPU texture path.
#[derive(Debug, Clone)]
pub struct TextureFrame {
    /// Opaque GPU texture id holding the frame.
    pub texture_id: u32,

    /// Texture coordinate transform of the surface texture.
    pub transform: Matrix3,

    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Monotonic capture timestamp in nanoseconds.
    pub timestamp_ns: i64,

    /// CVO rotation in degrees, set by the session.
    pub rotation: u32,
}

/// Returns a pooled preview buffer to the camera thread on release.
#[derive(Clone)]
pub struct FrameReleaser {
    command_tx: Sender<CameraCommand>,
}

impl FrameReleaser {
    pub(crate) fn new(command_tx: Sender<CameraCommand>) -> Self {
        Self { command_tx }
    }

    fn release(&self, buffer: BytesMut) {
        // The session drops the buffer if it has stopped; a send failure
        // means the camera thread itself is gone.
        if self.command_tx.send(CameraCommand::RequeueBuffer(buffer)).is_err() {
            trace!("Buffer released after camera thread exit");
        }
    }
}

/// A frame delivered through the pooled pixel-buffer path.
///
/// The backing buffer is returned to the driver exactly once: either by
/// [`PlanarYuvFrame::release`] or when the frame is dropped.
pub struct PlanarYuvFrame {
    data: Option<BytesMut>,
    releaser: FrameReleaser,

    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Monotonic capture timestamp in nanoseconds.
    pub timestamp_ns: i64,

    /// CVO rotation in degrees.
    pub rotation: u32,
}

impl PlanarYuvFrame {
    pub(crate) fn new(
        data: BytesMut,
        width: u32,
        height: u32,
        timestamp_ns: i64,
        rotation: u32,
        releaser: FrameReleaser,
    ) -> Self {
        Self {
            data: Some(data),
            releaser,
            width,
            height,
            timestamp_ns,
            rotation,
        }
    }

    /// Pixel data in the negotiated planar layout.
    pub fn data(&self) -> &[u8] {
        self.data.as_deref().unwrap_or(&[])
    }

    /// Return the backing buffer to the pool.
    pub fn release(self) {
        // Drop does the work; by-value receiver enforces exactly-once.
    }
}

impl Drop for PlanarYuvFrame {
    fn drop(&mut self) {
        if let Some(buffer) = self.data.take() {
            self.releaser.release(buffer);
        }
    }
}

impl std::fmt::Debug for PlanarYuvFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanarYuvFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("timestamp_ns", &self.timestamp_ns)
            .field("rotation", &self.rotation)
            .finish()
    }
}

/// A captured frame from either delivery path.
#[derive(Debug)]
pub enum CapturedFrame {
    /// GPU texture path.
    Texture(TextureFrame),

    /// Pooled pixel-buffer path.
    PlanarYuv(PlanarYuvFrame),
}

impl CapturedFrame {
    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        match self {
            Self::Texture(frame) => frame.width,
            Self::PlanarYuv(frame) => frame.width,
        }
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        match self {
            Self::Texture(frame) => frame.height,
            Self::PlanarYuv(frame) => frame.height,
        }
    }

    /// Monotonic capture timestamp in nanoseconds.
    pub fn timestamp_ns(&self) -> i64 {
        match self {
            Self::Texture(frame) => frame.timestamp_ns,
            Self::PlanarYuv(frame) => frame.timestamp_ns,
        }
    }

    /// CVO rotation in degrees.
    pub fn rotation(&self) -> u32 {
        match self {
            Self::Texture(frame) => frame.rotation,
            Self::PlanarYuv(frame) => frame.rotation,
        }
    }
}

/// Degrees by which a raw frame must be rotated to appear upright.
///
/// `(mount + display) mod 360`, where the display rotation is reflected
/// for back-facing cameras.
pub fn frame_orientation(info: &CameraInfo, display_rotation: u32) -> u32 {
    let rotation = match info.facing {
        CameraFacing::Back => (360 - display_rotation) % 360,
        CameraFacing::Front => display_rotation,
    };
    (info.mount_orientation + rotation) % 360
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_back_facing_reflects_display_rotation() {
        let info = CameraInfo::new(CameraFacing::Back, 90);
        assert_eq!(frame_orientation(&info, 270), 180);
    }

    #[test]
    fn test_orientation_full_grid_is_quarter_turn() {
        for facing in [CameraFacing::Front, CameraFacing::Back] {
            for mount in [0, 90, 180, 270] {
                for display in [0, 90, 180, 270] {
                    let info = CameraInfo::new(facing, mount);
                    let rotation = frame_orientation(&info, display);
                    assert!(
                        [0, 90, 180, 270].contains(&rotation),
                        "{facing:?} mount={mount} display={display} -> {rotation}"
                    );

                    let expected = match facing {
                        CameraFacing::Front => (mount + display) % 360,
                        CameraFacing::Back => (mount + (360 - display) % 360) % 360,
                    };
                    assert_eq!(rotation, expected);
                }
            }
        }
    }
}
