//! Shared data types for the camlink capture pipeline.
//!
//! This crate defines the plain data model exchanged between the capture
//! core, the overlay compositor, and consumers: capture formats, camera
//! descriptions, transform matrices, and metrics snapshots.

mod camera;
mod format;
mod matrix;
mod metrics;

pub use camera::{CameraFacing, CameraInfo};
pub use format::{CaptureFormat, FramerateRange, ImageFormat, Size};
pub use matrix::Matrix3;
pub use metrics::SessionMetrics;
