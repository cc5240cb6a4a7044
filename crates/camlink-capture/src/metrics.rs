//! Session timing metrics collection.

use parking_lot::Mutex;

use camlink_types::{SessionMetrics, Size};

/// Sink for session timing samples.
///
/// Implementations may no-op; the session reports open, stop and
/// first-frame durations plus the chosen preview resolution.
pub trait MetricsSink: Send + Sync {
    /// Milliseconds from construction start to a running preview.
    fn record_open_time(&self, ms: u64);

    /// Milliseconds spent in the stop transition.
    fn record_stop_time(&self, ms: u64);

    /// Milliseconds from construction start to the first delivered frame.
    fn record_first_frame_time(&self, ms: u64);

    /// Preview resolution chosen by format selection.
    fn record_resolution(&self, size: Size);

    /// One frame was delivered downstream.
    fn record_frame(&self);
}

/// Metrics sink that discards every sample.
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_open_time(&self, _ms: u64) {}
    fn record_stop_time(&self, _ms: u64) {}
    fn record_first_frame_time(&self, _ms: u64) {}
    fn record_resolution(&self, _size: Size) {}
    fn record_frame(&self) {}
}

/// Collects session timing samples into a [`SessionMetrics`] snapshot.
#[derive(Default)]
pub struct MetricsCollector {
    inner: Mutex<SessionMetrics>,
}

impl MetricsCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot of the collected samples.
    pub fn snapshot(&self) -> SessionMetrics {
        self.inner.lock().clone()
    }
}

impl MetricsSink for MetricsCollector {
    fn record_open_time(&self, ms: u64) {
        self.inner.lock().open_time_ms = Some(ms);
    }

    fn record_stop_time(&self, ms: u64) {
        self.inner.lock().stop_time_ms = Some(ms);
    }

    fn record_first_frame_time(&self, ms: u64) {
        self.inner.lock().first_frame_time_ms = Some(ms);
    }

    fn record_resolution(&self, size: Size) {
        self.inner.lock().resolution = Some(size);
    }

    fn record_frame(&self) {
        self.inner.lock().frames_captured += 1;
    }
}
