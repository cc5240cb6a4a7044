//! GPU texture publishing types.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use camlink_types::Matrix3;

/// Texture sampling filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFilter {
    Linear,
    LinearMipmapLinear,
}

/// How a composite raster is uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadParams {
    /// Generate a mipmap chain after upload.
    pub generate_mipmaps: bool,

    /// Minification filter.
    pub min_filter: TextureFilter,

    /// Magnification filter.
    pub mag_filter: TextureFilter,
}

impl Default for UploadParams {
    fn default() -> Self {
        Self {
            generate_mipmaps: true,
            min_filter: TextureFilter::LinearMipmapLinear,
            mag_filter: TextureFilter::Linear,
        }
    }
}

/// The GPU runtime seam.
///
/// Both methods are invoked on the render thread only; the render-thread
/// queue serializes concurrent composites.
pub trait TextureUploader: Send {
    /// Upload an RGBA raster as a 2D texture and return its non-zero id.
    fn upload_rgba(&mut self, pixels: &[u8], width: u32, height: u32, params: &UploadParams)
        -> u32;

    /// Delete a texture id.
    fn delete_texture(&mut self, id: u32);
}

/// The currently published composite texture.
///
/// `current_id` is written only on the render thread; zero means no
/// texture has been published. Readers must tolerate a transient zero.
#[derive(Debug, Default)]
pub struct PublishedTexture {
    current_id: AtomicU32,
    generation: AtomicU64,
}

impl PublishedTexture {
    /// Create with no published texture.
    pub fn new() -> Self {
        Self::default()
    }

    /// The live texture id, or 0 if none.
    pub fn current_id(&self) -> u32 {
        self.current_id.load(Ordering::Acquire)
    }

    /// Monotonic publish counter.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Publish `new_id` and return the superseded id (0 if none).
    ///
    /// Render thread only; the caller deletes the returned id there.
    pub(crate) fn swap(&self, new_id: u32) -> u32 {
        let previous = self.current_id.swap(new_id, Ordering::AcqRel);
        self.generation.fetch_add(1, Ordering::AcqRel);
        previous
    }
}

/// A handle to the published texture for drawing onto a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureBuffer {
    /// Raster width in pixels.
    pub width: u32,

    /// Raster height in pixels.
    pub height: u32,

    /// GPU texture id.
    pub texture_id: u32,

    /// Texture coordinate transform supplied by the caller.
    pub transform: Matrix3,
}
