//! Composites active layers into a single RGBA raster.

use image::{imageops, RgbaImage};
use tracing::{trace, warn};

use crate::layer::OverlayLayer;

/// Draws active layers, ascending by z, onto a fixed-size raster.
///
/// The raster dimensions are fixed at construction and never change for
/// the lifetime of the session. Single writer: only the thread mutating
/// the layer store composes; readers see completed rasters only.
#[derive(Debug)]
pub struct Compositor {
    raster: RgbaImage,
}

impl Compositor {
    /// Create a compositor with a transparent `width` x `height` raster.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            raster: RgbaImage::new(width, height),
        }
    }

    /// Raster width in pixels.
    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    /// Raster height in pixels.
    pub fn height(&self) -> u32 {
        self.raster.height()
    }

    /// Rebuild the raster from `layers`, which must already be ordered by
    /// ascending z.
    ///
    /// Layers that fail to decode are logged and skipped; a bad payload
    /// never aborts composition.
    pub fn compose<'a>(
        &mut self,
        layers: impl IntoIterator<Item = &'a OverlayLayer>,
    ) -> &RgbaImage {
        self.raster.fill(0);

        for layer in layers {
            if !layer.is_active() {
                continue;
            }
            let bitmap = match layer.load() {
                Ok(bitmap) => bitmap,
                Err(e) => {
                    warn!(id = layer.id(), "Could not draw overlay: {e}");
                    continue;
                }
            };
            let (x, y) = layer.position();
            trace!(id = layer.id(), x, y, z = layer.z_index(), "Drawing overlay");
            // Source-over blend, clipped to the raster bounds.
            imageops::overlay(&mut self.raster, &bitmap, i64::from(x), i64::from(y));
        }

        &self.raster
    }

    /// The most recently composed raster.
    pub fn raster(&self) -> &RgbaImage {
        &self.raster
    }
}
