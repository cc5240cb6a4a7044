//! Camera device descriptions.

use serde::{Deserialize, Serialize};

/// Which way the camera lens points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraFacing {
    /// Same side as the display.
    Front,

    /// Opposite side from the display.
    Back,
}

/// Static description of a physical camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraInfo {
    /// Lens direction.
    pub facing: CameraFacing,

    /// Clockwise angle through which a captured frame must be rotated to
    /// appear upright in the sensor's natural orientation. One of
    /// 0, 90, 180, 270.
    pub mount_orientation: u32,
}

impl CameraInfo {
    /// Create a new camera description.
    pub fn new(facing: CameraFacing, mount_orientation: u32) -> Self {
        debug_assert!(mount_orientation % 90 == 0 && mount_orientation < 360);
        Self {
            facing,
            mount_orientation,
        }
    }
}
