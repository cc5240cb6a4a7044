//! Owns the layer store, the compositor, and the published texture.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::RgbaImage;
use tracing::{debug, info, instrument};

use camlink_types::Matrix3;

use crate::compositor::Compositor;
use crate::error::OverlayError;
use crate::layer::OverlayLayer;
use crate::render::RenderThread;
use crate::store::LayerStore;
use crate::texture::{PublishedTexture, TextureBuffer, TextureUploader, UploadParams};
use crate::OverlayResult;

/// Manages overlay layers and republishes their composite as a texture.
///
/// Mutating calls (`add_overlay_bitmap`, `set_overlay_bitmap_active`,
/// `remove_overlay_bitmap`, `release`) take `&mut self` and must come
/// from the owning thread. `get_buffer`, `get_draw_matrix`, `is_ready`
/// and `should_draw` are safe to call from any thread holding a shared
/// reference.
#[derive(Debug)]
pub struct OverlayManager {
    store: LayerStore,
    compositor: Compositor,
    temp_dir: Option<PathBuf>,
    render: RenderThread,
    published: Arc<PublishedTexture>,
    mirrored: AtomicBool,
    should_draw: AtomicBool,
    released: AtomicBool,
}

impl OverlayManager {
    /// Create a manager compositing onto a `width` x `height` raster.
    ///
    /// Overlay payloads are persisted as PNG files under `temp_dir`;
    /// pass `None` to keep them in memory instead. The directory must
    /// already exist.
    pub fn init(
        temp_dir: Option<PathBuf>,
        width: u32,
        height: u32,
        uploader: Box<dyn TextureUploader>,
    ) -> OverlayResult<Self> {
        if let Some(dir) = &temp_dir {
            if !dir.is_dir() {
                return Err(OverlayError::MissingDirectory(dir.clone()));
            }
        }
        info!(width, height, persisted = temp_dir.is_some(), "Overlay manager initialized");

        Ok(Self {
            store: LayerStore::new(),
            compositor: Compositor::new(width, height),
            temp_dir,
            render: RenderThread::spawn(uploader),
            published: Arc::new(PublishedTexture::new()),
            mirrored: AtomicBool::new(false),
            should_draw: AtomicBool::new(false),
            released: AtomicBool::new(false),
        })
    }

    /// Add or replace the overlay with `id`, anchored at `(x, y)` with
    /// draw order `z`. The layer starts inactive.
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    pub fn add_overlay_bitmap(
        &mut self,
        id: &str,
        image: &RgbaImage,
        x: i32,
        y: i32,
        z: i32,
    ) -> OverlayResult<()> {
        self.check_released()?;

        let layer = match &self.temp_dir {
            Some(dir) => OverlayLayer::persist(id, image, dir, x, y, z)?,
            None => OverlayLayer::in_memory(id, image.clone(), x, y, z),
        };
        let replaced_active = self.store.get(id).is_some_and(|l| l.is_active());
        self.store.insert(layer);

        // A fresh layer is invisible until activated, but replacing an
        // active layer changes the composite.
        if replaced_active {
            self.republish()?;
        }
        Ok(())
    }

    /// Show or hide the overlay with `id`. Unknown ids are ignored.
    pub fn set_overlay_bitmap_active(&mut self, id: &str, active: bool) -> OverlayResult<()> {
        self.check_released()?;
        if self.store.set_active(id, active) {
            self.republish()?;
        }
        Ok(())
    }

    /// Remove the overlay with `id` and delete its payload.
    pub fn remove_overlay_bitmap(&mut self, id: &str) -> OverlayResult<()> {
        self.check_released()?;
        if self.store.remove(id) {
            self.republish()?;
        }
        Ok(())
    }

    /// Mirror the composite horizontally when drawn.
    pub fn set_horizontal_mirror(&self, mirrored: bool) {
        self.mirrored.store(mirrored, Ordering::Release);
    }

    /// Whether at least one active layer exists.
    pub fn should_draw(&self) -> bool {
        self.should_draw.load(Ordering::Acquire) && !self.released.load(Ordering::Acquire)
    }

    /// Whether a composite texture is currently published.
    pub fn is_ready(&self) -> bool {
        self.published.current_id() != 0
    }

    /// The published composite as a drawable buffer, or `None` when no
    /// texture is live.
    pub fn get_buffer(&self, transform: Matrix3) -> Option<TextureBuffer> {
        if self.released.load(Ordering::Acquire) {
            return None;
        }
        let texture_id = self.published.current_id();
        if texture_id == 0 {
            return None;
        }
        Some(TextureBuffer {
            width: self.compositor.width(),
            height: self.compositor.height(),
            texture_id,
            transform,
        })
    }

    /// The model matrix to draw the composite with.
    pub fn get_draw_matrix(&self) -> Matrix3 {
        if self.mirrored.load(Ordering::Acquire) {
            Matrix3::horizontal_flip()
        } else {
            Matrix3::identity()
        }
    }

    /// Block until all queued uploads and deletions have run.
    pub fn flush(&self) -> OverlayResult<()> {
        self.render.flush()
    }

    /// Tear down: unpublish and delete the live texture, free every
    /// payload. Subsequent `get_buffer` calls return `None`.
    pub fn release(&mut self) -> OverlayResult<()> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        info!("Overlay manager releasing");
        self.should_draw.store(false, Ordering::Release);
        self.store.clear();

        let published = Arc::clone(&self.published);
        self.render.post(Box::new(move |uploader| {
            let previous = published.swap(0);
            if previous != 0 {
                uploader.delete_texture(previous);
            }
        }))
    }

    /// Recompose the raster and swap in a freshly uploaded texture,
    /// deleting the superseded one on the render thread.
    fn republish(&mut self) -> OverlayResult<()> {
        let layers = self.store.iter_by_z();
        let any_active = layers.iter().any(|layer| layer.is_active());
        self.should_draw.store(any_active, Ordering::Release);

        let published = Arc::clone(&self.published);
        if !any_active {
            // Nothing to show: unpublish so readers stop drawing.
            debug!("No active overlays, unpublishing");
            return self.render.post(Box::new(move |uploader| {
                let previous = published.swap(0);
                if previous != 0 {
                    uploader.delete_texture(previous);
                }
            }));
        }

        let raster = self.compositor.compose(layers);
        let width = raster.width();
        let height = raster.height();
        let pixels = raster.as_raw().clone();

        self.render.post(Box::new(move |uploader| {
            let id = uploader.upload_rgba(&pixels, width, height, &UploadParams::default());
            let previous = published.swap(id);
            if previous != 0 {
                uploader.delete_texture(previous);
            }
        }))
    }

    fn check_released(&self) -> OverlayResult<()> {
        if self.released.load(Ordering::Acquire) {
            return Err(OverlayError::Released);
        }
        Ok(())
    }
}

impl Drop for OverlayManager {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use parking_lot::Mutex;

    #[derive(Debug, Default)]
    struct UploaderLog {
        next_id: u32,
        uploads: Vec<(u32, u32, u32)>,
        deletes: Vec<u32>,
    }

    #[derive(Debug, Clone, Default)]
    struct FakeUploader {
        log: Arc<Mutex<UploaderLog>>,
    }

    impl TextureUploader for FakeUploader {
        fn upload_rgba(
            &mut self,
            _pixels: &[u8],
            width: u32,
            height: u32,
            _params: &UploadParams,
        ) -> u32 {
            let mut log = self.log.lock();
            log.next_id += 1;
            let id = log.next_id;
            log.uploads.push((id, width, height));
            id
        }

        fn delete_texture(&mut self, id: u32) {
            self.log.lock().deletes.push(id);
        }
    }

    fn manager_with_log() -> (OverlayManager, Arc<Mutex<UploaderLog>>) {
        let uploader = FakeUploader::default();
        let log = Arc::clone(&uploader.log);
        let manager = OverlayManager::init(None, 64, 64, Box::new(uploader)).unwrap();
        (manager, log)
    }

    fn solid(color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(8, 8, Rgba(color))
    }

    #[test]
    fn test_buffer_is_none_before_first_publish() {
        let (manager, _) = manager_with_log();
        assert!(!manager.is_ready());
        assert!(manager.get_buffer(Matrix3::identity()).is_none());
    }

    #[test]
    fn test_activation_publishes_a_texture() {
        let (mut manager, log) = manager_with_log();
        manager
            .add_overlay_bitmap("logo", &solid([255, 0, 0, 255]), 0, 0, 1)
            .unwrap();
        assert!(!manager.should_draw());

        manager.set_overlay_bitmap_active("logo", true).unwrap();
        manager.flush().unwrap();

        assert!(manager.should_draw());
        assert!(manager.is_ready());
        let buffer = manager.get_buffer(Matrix3::identity()).unwrap();
        assert_eq!(buffer.texture_id, 1);
        assert_eq!((buffer.width, buffer.height), (64, 64));
        assert_eq!(log.lock().uploads, vec![(1, 64, 64)]);
    }

    #[test]
    fn test_republish_deletes_predecessor_exactly_once() {
        let (mut manager, log) = manager_with_log();
        manager
            .add_overlay_bitmap("a", &solid([255, 0, 0, 255]), 0, 0, 1)
            .unwrap();
        manager
            .add_overlay_bitmap("b", &solid([0, 255, 0, 255]), 8, 8, 2)
            .unwrap();
        manager.set_overlay_bitmap_active("a", true).unwrap();
        manager.set_overlay_bitmap_active("b", true).unwrap();
        manager.flush().unwrap();

        let log = log.lock();
        assert_eq!(log.uploads.len(), 2);
        assert_eq!(log.deletes, vec![1]);
    }

    #[test]
    fn test_deactivating_last_layer_unpublishes() {
        let (mut manager, log) = manager_with_log();
        manager
            .add_overlay_bitmap("a", &solid([255, 0, 0, 255]), 0, 0, 1)
            .unwrap();
        manager.set_overlay_bitmap_active("a", true).unwrap();
        manager.set_overlay_bitmap_active("a", false).unwrap();
        manager.flush().unwrap();

        assert!(!manager.should_draw());
        assert!(manager.get_buffer(Matrix3::identity()).is_none());
        assert_eq!(log.lock().deletes, vec![1]);
    }

    #[test]
    fn test_release_deletes_live_texture_and_blocks_mutation() {
        let (mut manager, log) = manager_with_log();
        manager
            .add_overlay_bitmap("a", &solid([255, 0, 0, 255]), 0, 0, 1)
            .unwrap();
        manager.set_overlay_bitmap_active("a", true).unwrap();
        manager.release().unwrap();
        manager.flush().unwrap();

        assert!(manager.get_buffer(Matrix3::identity()).is_none());
        assert_eq!(log.lock().deletes, vec![1]);
        assert!(matches!(
            manager.add_overlay_bitmap("b", &solid([0; 4]), 0, 0, 0),
            Err(OverlayError::Released)
        ));
        // Idempotent.
        manager.release().unwrap();
    }

    #[test]
    fn test_draw_matrix_follows_mirror_flag() {
        let (manager, _) = manager_with_log();
        assert!(manager.get_draw_matrix().is_identity());
        manager.set_horizontal_mirror(true);
        assert_eq!(manager.get_draw_matrix(), Matrix3::horizontal_flip());
        manager.set_horizontal_mirror(false);
        assert!(manager.get_draw_matrix().is_identity());
    }

    #[test]
    fn test_no_change_mutations_do_not_republish() {
        let (mut manager, log) = manager_with_log();
        manager
            .add_overlay_bitmap("a", &solid([255, 0, 0, 255]), 0, 0, 1)
            .unwrap();
        manager.flush().unwrap();
        // Inactive on arrival: nothing to composite yet.
        assert_eq!(log.lock().uploads.len(), 0);

        manager.set_overlay_bitmap_active("a", true).unwrap();
        manager.set_overlay_bitmap_active("a", true).unwrap();
        manager.remove_overlay_bitmap("ghost").unwrap();
        manager.flush().unwrap();

        // One composite for the activation; the repeats changed nothing.
        assert_eq!(log.lock().uploads.len(), 1);
        assert!(log.lock().deletes.is_empty());
    }

    #[test]
    fn test_unknown_id_activation_is_noop() {
        let (mut manager, log) = manager_with_log();
        manager.set_overlay_bitmap_active("ghost", true).unwrap();
        manager.flush().unwrap();
        assert!(log.lock().uploads.is_empty());
    }
}
