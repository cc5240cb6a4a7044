//! Session timing metrics.

use serde::{Deserialize, Serialize};

use crate::format::Size;

/// Timing samples collected over the lifetime of one capture session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMetrics {
    /// Milliseconds from session construction to a running preview.
    pub open_time_ms: Option<u64>,

    /// Milliseconds from the stop request to a released driver handle.
    pub stop_time_ms: Option<u64>,

    /// Milliseconds from construction to the first delivered frame.
    pub first_frame_time_ms: Option<u64>,

    /// Preview resolution chosen by format selection.
    pub resolution: Option<Size>,

    /// Total frames delivered while running.
    pub frames_captured: u64,
}
