//! Z-ordered overlay compositing published as a GPU texture.
//!
//! An [`OverlayManager`] owns a store of bitmap layers, composites the
//! active ones into a single RGBA raster, and republishes the raster as a
//! GPU texture whose lifecycle is confined to a dedicated render thread.

mod compositor;
mod error;
mod layer;
mod manager;
mod render;
mod store;
mod texture;

pub use compositor::Compositor;
pub use error::OverlayError;
pub use layer::{LayerPayload, OverlayLayer};
pub use manager::OverlayManager;
pub use render::{RenderJob, RenderThread};
pub use store::LayerStore;
pub use texture::{
    PublishedTexture, TextureBuffer, TextureFilter, TextureUploader, UploadParams,
};

/// Result type for overlay operations.
pub type OverlayResult<T> = Result<T, OverlayError>;
