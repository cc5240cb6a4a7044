//! A single overlay layer: placement metadata plus a bitmap payload.

use std::fs;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use tracing::debug;

use crate::error::OverlayError;
use crate::OverlayResult;

/// Where a layer's bitmap lives.
pub enum LayerPayload {
    /// PNG file in the manager's temp directory, decoded on demand.
    Disk(PathBuf),

    /// Held in memory (persistence disabled).
    Memory(RgbaImage),
}

impl std::fmt::Debug for LayerPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disk(path) => f.debug_tuple("Disk").field(path).finish(),
            Self::Memory(image) => f
                .debug_tuple("Memory")
                .field(&format_args!("{}x{}", image.width(), image.height()))
                .finish(),
        }
    }
}

/// One overlay bitmap with its placement and draw flag.
///
/// Payloads are cached on disk and only read back when the composite
/// raster is rebuilt, so inactive layers cost no memory.
#[derive(Debug)]
pub struct OverlayLayer {
    id: String,
    x: i32,
    y: i32,
    z: i32,
    active: bool,
    payload: LayerPayload,
}

impl OverlayLayer {
    /// Persist `image` as `<id>.png` under `dir` and build the layer.
    ///
    /// Fails with [`OverlayError::MissingDirectory`] if `dir` does not
    /// exist. An existing file for the same id is overwritten.
    pub fn persist(
        id: &str,
        image: &RgbaImage,
        dir: &Path,
        x: i32,
        y: i32,
        z: i32,
    ) -> OverlayResult<Self> {
        if !dir.is_dir() {
            return Err(OverlayError::MissingDirectory(dir.to_path_buf()));
        }

        let path = dir.join(format!("{id}.png"));
        image
            .save_with_format(&path, image::ImageFormat::Png)
            .map_err(|source| OverlayError::Encode {
                id: id.to_string(),
                source,
            })?;
        debug!(id, path = %path.display(), "Overlay payload persisted");

        Ok(Self {
            id: id.to_string(),
            x,
            y,
            z,
            active: false,
            payload: LayerPayload::Disk(path),
        })
    }

    /// Build a layer holding `image` in memory.
    pub fn in_memory(id: &str, image: RgbaImage, x: i32, y: i32, z: i32) -> Self {
        Self {
            id: id.to_string(),
            x,
            y,
            z,
            active: false,
            payload: LayerPayload::Memory(image),
        }
    }

    /// Layer id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Top-left anchor of the layer in raster coordinates.
    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    /// Draw-order key; higher z draws on top.
    pub fn z_index(&self) -> i32 {
        self.z
    }

    /// Whether the layer is drawn.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Mark the layer drawable or not.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Fetch the bitmap, decoding from disk if persisted.
    pub fn load(&self) -> OverlayResult<RgbaImage> {
        match &self.payload {
            LayerPayload::Memory(image) => Ok(image.clone()),
            LayerPayload::Disk(path) => {
                let decoded = image::open(path).map_err(|source| OverlayError::Decode {
                    id: self.id.clone(),
                    source,
                })?;
                Ok(decoded.into_rgba8())
            }
        }
    }

    /// Delete the backing payload. The layer is unusable afterwards.
    pub(crate) fn delete_payload(&mut self) {
        if let LayerPayload::Disk(path) = &self.payload {
            if let Err(e) = fs::remove_file(path) {
                debug!(id = self.id, "Overlay payload removal failed: {e}");
            }
        }
        self.payload = LayerPayload::Memory(RgbaImage::new(0, 0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(color))
    }

    #[test]
    fn test_persist_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let source = solid(4, 4, [255, 0, 0, 255]);

        let layer = OverlayLayer::persist("badge", &source, dir.path(), 1, 2, 3).unwrap();
        assert!(dir.path().join("badge.png").is_file());
        assert_eq!(layer.position(), (1, 2));
        assert_eq!(layer.z_index(), 3);
        assert!(!layer.is_active());

        let loaded = layer.load().unwrap();
        assert_eq!(loaded, source);
    }

    #[test]
    fn test_persist_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = OverlayLayer::persist("x", &solid(1, 1, [0; 4]), &missing, 0, 0, 0)
            .unwrap_err();
        assert!(matches!(err, OverlayError::MissingDirectory(_)));
    }

    #[test]
    fn test_delete_payload_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut layer =
            OverlayLayer::persist("gone", &solid(2, 2, [0, 0, 255, 255]), dir.path(), 0, 0, 0)
                .unwrap();
        let path = dir.path().join("gone.png");
        assert!(path.is_file());
        layer.delete_payload();
        assert!(!path.exists());
    }
}
