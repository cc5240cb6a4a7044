//! Error types for the overlay crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while persisting or compositing overlays.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// The supplied temp directory does not exist.
    #[error("temporary directory inaccessible: {0}")]
    MissingDirectory(PathBuf),

    /// An overlay payload could not be decoded.
    #[error("failed to decode overlay {id}: {source}")]
    Decode {
        id: String,
        #[source]
        source: image::ImageError,
    },

    /// An overlay payload could not be encoded.
    #[error("failed to encode overlay {id}: {source}")]
    Encode {
        id: String,
        #[source]
        source: image::ImageError,
    },

    /// The manager has been released.
    #[error("overlay manager released")]
    Released,

    /// The render thread is gone.
    #[error("render thread disconnected")]
    RenderThreadGone,
}
