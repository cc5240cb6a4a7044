//! Capture format selection against driver-reported capability sets.

use tracing::debug;

use camlink_types::{CaptureFormat, FramerateRange, Size};

use crate::device::DeviceCapabilities;
use crate::error::CaptureError;
use crate::CaptureResult;

/// Pick the supported frame-rate range closest to `framerate` fps.
///
/// Driver ranges are in milli-fps, so the target is scaled by 1000.
/// Primary key: distance of `range.max` from the target. Ranges tied on
/// that prefer the lower `min`, so a wider range wins over a narrow one
/// pinned above the target.
pub fn closest_framerate_range(
    supported: &[FramerateRange],
    framerate: u32,
) -> CaptureResult<FramerateRange> {
    let target = framerate as i64 * 1000;
    supported
        .iter()
        .copied()
        .min_by_key(|range| ((range.max as i64 - target).abs(), range.min))
        .ok_or_else(|| CaptureError::Configuration("no supported fps ranges".to_string()))
}

/// Pick the supported size closest to `width` x `height`.
///
/// Primary key: squared Euclidean distance. Ties prefer the closer aspect
/// ratio, then the smaller area.
pub fn closest_size(supported: &[Size], width: u32, height: u32) -> CaptureResult<Size> {
    let target_ratio = width as f64 / height as f64;
    supported
        .iter()
        .copied()
        .min_by(|a, b| {
            let key = |s: &Size| {
                let dw = s.width as i64 - width as i64;
                let dh = s.height as i64 - height as i64;
                (dw * dw + dh * dh, (s.aspect_ratio() - target_ratio).abs(), s.area())
            };
            let (da, ra, aa) = key(a);
            let (db, rb, ab) = key(b);
            da.cmp(&db)
                .then(ra.partial_cmp(&rb).unwrap_or(std::cmp::Ordering::Equal))
                .then(aa.cmp(&ab))
        })
        .ok_or_else(|| CaptureError::Configuration("no supported sizes".to_string()))
}

/// Select the capture format best matching the requested resolution and
/// frame rate. The result is always an element of the supported sets.
pub fn select_capture_format(
    capabilities: &DeviceCapabilities,
    width: u32,
    height: u32,
    framerate: u32,
) -> CaptureResult<CaptureFormat> {
    debug!(
        ranges = ?capabilities.fps_ranges,
        sizes = ?capabilities.preview_sizes,
        "Selecting capture format"
    );

    let fps_range = closest_framerate_range(&capabilities.fps_ranges, framerate)?;
    let preview_size = closest_size(&capabilities.preview_sizes, width, height)?;

    let format = CaptureFormat::new(preview_size.width, preview_size.height, fps_range);
    debug!(%format, "Capture format selected");
    Ok(format)
}

/// Select the picture size best matching the requested resolution,
/// independently of the preview selection.
pub fn select_picture_size(
    capabilities: &DeviceCapabilities,
    width: u32,
    height: u32,
) -> CaptureResult<Size> {
    closest_size(&capabilities.picture_sizes, width, height)
}
