//! The camera session state machine.
//!
//! A session owns the driver handle and is confined to the camera thread:
//! every mutating operation checks the calling thread and fails with
//! [`CaptureError::WrongThread`] off it. The state is monotonic; once
//! stopped a session never emits another frame.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Instant;

use bytes::BytesMut;
use crossbeam_channel::Sender;
use tracing::{debug, error, info, instrument, warn};

use camlink_types::{CameraInfo, CaptureFormat, ImageFormat};

use crate::controller::{CameraCommand, SessionConfig};
use crate::device::{
    CameraDevice, CameraEnumerator, CaptureMode, DeviceError, DeviceParameters, DriverFault,
    FlashMode, FocusMode, FocusRect, OrientationSource, TextureSource,
};
use crate::error::CaptureError;
use crate::events::SessionEvents;
use crate::format::{select_capture_format, select_picture_size};
use crate::frame::{frame_orientation, CapturedFrame, FrameReleaser, PlanarYuvFrame, TextureFrame};
use crate::metrics::MetricsSink;
use crate::pool::BufferPool;
use crate::{CaptureResult, FOCUS_AREA_SIZE, FOCUS_SPACE_BOUND, NUMBER_OF_CAPTURE_BUFFERS, ZOOM_STEP};

/// Lifecycle state of a session. Monotonic: `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Preview is running and frames may be delivered.
    Running,

    /// The driver handle has been released.
    Stopped,
}

/// Cross-thread view of the session state.
///
/// Written only on the camera thread with release ordering; readable from
/// any thread with acquire ordering.
#[derive(Clone, Default)]
pub struct SharedSessionState {
    stopped: Arc<AtomicBool>,
}

impl SharedSessionState {
    /// Create a state reading `Running`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state snapshot.
    pub fn get(&self) -> SessionState {
        if self.stopped.load(Ordering::Acquire) {
            SessionState::Stopped
        } else {
            SessionState::Running
        }
    }

    /// Whether the session is still running.
    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::Acquire)
    }

    pub(crate) fn set_stopped(&self) {
        self.stopped.store(true, Ordering::Release);
    }
}

/// Map a preview tap onto the driver focus coordinate space.
///
/// `(x, y)` are preview pixels inside a `width` x `height` rectangle. The
/// result is a square of side [`FOCUS_AREA_SIZE`] centred on the tap,
/// clamped to `[-1000, +1000]²`.
pub fn calculate_tap_area(x: f32, y: f32, width: u32, height: u32) -> FocusRect {
    let u = 2000.0 * f64::from(x) / f64::from(width) - 1000.0;
    let v = 2000.0 * f64::from(y) / f64::from(height) - 1000.0;
    let half = f64::from(FOCUS_AREA_SIZE) / 2.0;

    let clamp = |value: f64| (value as i32).clamp(-FOCUS_SPACE_BOUND, FOCUS_SPACE_BOUND);
    FocusRect {
        left: clamp(u - half),
        top: clamp(v - half),
        right: clamp(u + half),
        bottom: clamp(v + half),
    }
}

enum SessionMode {
    Texture(Box<dyn TextureSource>),
    Pixel { pool: BufferPool },
}

/// A running capture session against one open driver handle.
pub struct CameraSession {
    camera_thread: ThreadId,
    device: Box<dyn CameraDevice>,
    mode: SessionMode,
    info: CameraInfo,
    capture_format: CaptureFormat,
    orientation: Arc<dyn OrientationSource>,
    events: Arc<dyn SessionEvents>,
    metrics: Arc<dyn MetricsSink>,
    command_tx: Sender<CameraCommand>,
    state: SharedSessionState,
    constructed_at: Instant,
    first_frame_reported: bool,
}

impl CameraSession {
    /// Open the camera, apply parameters, and start the preview.
    ///
    /// Emits `on_camera_opening` first. On any failure the driver handle
    /// is released before the error is returned and no session exists.
    #[instrument(name = "session_open", skip_all, fields(camera = %config.camera_name))]
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        enumerator: &dyn CameraEnumerator,
        mode: CaptureMode,
        orientation: Arc<dyn OrientationSource>,
        events: Arc<dyn SessionEvents>,
        metrics: Arc<dyn MetricsSink>,
        command_tx: Sender<CameraCommand>,
        state: SharedSessionState,
        config: &SessionConfig,
    ) -> CaptureResult<Self> {
        let open_start = Instant::now();
        info!("Open camera {}", config.camera_name);
        events.on_camera_opening();

        let camera_id = enumerator.camera_id(&config.camera_name).ok_or_else(|| {
            CaptureError::Configuration(format!("unknown camera name: {}", config.camera_name))
        })?;
        let info = enumerator.camera_info(camera_id)?;
        let mut device = enumerator.open(camera_id)?;

        let capture_format = match Self::configure(&mut *device, &mode, config) {
            Ok(format) => format,
            Err(e) => {
                device.release();
                return Err(e);
            }
        };
        metrics.record_resolution(capture_format.size());

        let mode = match mode {
            CaptureMode::Texture(mut source) => {
                source.set_texture_size(capture_format.size());
                SessionMode::Texture(source)
            }
            CaptureMode::PixelBuffer => {
                let mut pool =
                    BufferPool::new(capture_format.frame_size(), NUMBER_OF_CAPTURE_BUFFERS);
                while let Some(buffer) = pool.take() {
                    device.queue_buffer(buffer);
                }
                SessionMode::Pixel { pool }
            }
        };

        debug!(format = %capture_format, "Create new camera session on camera {camera_id}");
        let mut session = Self {
            camera_thread: thread::current().id(),
            state,
            first_frame_reported: false,
            constructed_at: open_start,
            device,
            info,
            capture_format,
            orientation,
            events,
            metrics: Arc::clone(&metrics),
            command_tx,
            mode,
        };

        session.start_capturing();
        metrics.record_open_time(open_start.elapsed().as_millis() as u64);
        Ok(session)
    }

    /// Select formats and apply the driver parameter block.
    fn configure(
        device: &mut dyn CameraDevice,
        mode: &CaptureMode,
        config: &SessionConfig,
    ) -> CaptureResult<CaptureFormat> {
        let capabilities = device.capabilities();

        let mut capture_format =
            select_capture_format(&capabilities, config.width, config.height, config.framerate)?;
        let picture_size = select_picture_size(&capabilities, config.width, config.height)?;

        let preview_format = match mode {
            CaptureMode::PixelBuffer => {
                capture_format.image_format = ImageFormat::Nv21;
                Some(ImageFormat::Nv21)
            }
            CaptureMode::Texture(_) => None,
        };

        let params = DeviceParameters {
            framerate: capture_format.framerate,
            preview_size: capture_format.size(),
            picture_size,
            preview_format,
            video_stabilization: capabilities.supports_video_stabilization,
            focus_mode: capabilities
                .focus_modes
                .contains(&FocusMode::Auto)
                .then_some(FocusMode::Auto),
            // Rotation travels as CVO metadata; the OS mirror is trusted.
            display_orientation: 0,
        };
        device
            .apply_parameters(&params)
            .map_err(|e| CaptureError::Open(e.0))?;

        Ok(capture_format)
    }

    fn start_capturing(&mut self) {
        debug!("Start capturing");

        let fault_tx = self.command_tx.clone();
        self.device.set_error_callback(Box::new(move |fault| {
            let _ = fault_tx.send(CameraCommand::DriverFault(fault));
        }));

        match &mut self.mode {
            SessionMode::Texture(source) => {
                let frame_tx = self.command_tx.clone();
                source.start_listening(Box::new(move |frame| {
                    let _ = frame_tx.send(CameraCommand::TextureFrame(frame));
                }));
            }
            SessionMode::Pixel { .. } => {
                let frame_tx = self.command_tx.clone();
                self.device.set_preview_callback(Box::new(move |data| {
                    let _ = frame_tx.send(CameraCommand::PreviewFrame(data));
                }));
            }
        }

        if let Err(e) = self.device.start_preview() {
            error!("Preview start failed: {e}");
            self.stop_internal();
            self.events.on_camera_error(&e.0);
        }
    }

    /// Current state, readable from any thread via [`SharedSessionState`].
    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// The negotiated capture format.
    pub fn capture_format(&self) -> CaptureFormat {
        self.capture_format
    }

    /// Execute one queued command on the camera thread.
    pub(crate) fn handle_command(&mut self, command: CameraCommand) -> CaptureResult<()> {
        match command {
            CameraCommand::Stop | CameraCommand::Shutdown => self.stop(),
            CameraCommand::EnableTorch => self.enable_torch(),
            CameraCommand::DisableTorch => self.disable_torch(),
            CameraCommand::ZoomIn => self.zoom_in(),
            CameraCommand::ZoomOut => self.zoom_out(),
            CameraCommand::Focus {
                x,
                y,
                width,
                height,
                reply,
            } => {
                let focused = self.focus(x, y, width, height)?;
                let _ = reply.try_send(focused);
                Ok(())
            }
            CameraCommand::RequeueBuffer(buffer) => self.requeue_buffer(buffer),
            CameraCommand::PreviewFrame(data) => self.on_preview_frame(data),
            CameraCommand::TextureFrame(frame) => self.on_texture_frame(frame),
            CameraCommand::DriverFault(fault) => self.on_driver_fault(fault),
        }
    }

    /// Stop the session. Idempotent; the second call is a no-op.
    pub fn stop(&mut self) -> CaptureResult<()> {
        debug!("Stop camera session");
        self.check_camera_thread()?;
        if self.state.is_running() {
            let stop_start = Instant::now();
            self.stop_internal();
            self.metrics
                .record_stop_time(stop_start.elapsed().as_millis() as u64);
        }
        Ok(())
    }

    /// Turn the torch on. No-op when stopped; driver errors are contained.
    pub fn enable_torch(&mut self) -> CaptureResult<()> {
        debug!("Enable torch");
        self.check_camera_thread()?;
        if self.state.is_running() {
            self.set_flash(FlashMode::Torch);
        }
        Ok(())
    }

    /// Turn the torch off. No-op when stopped; driver errors are contained.
    pub fn disable_torch(&mut self) -> CaptureResult<()> {
        debug!("Disable torch");
        self.check_camera_thread()?;
        if self.state.is_running() {
            self.set_flash(FlashMode::Off);
        }
        Ok(())
    }

    /// Step the zoom level up by [`ZOOM_STEP`], clamped to the maximum.
    pub fn zoom_in(&mut self) -> CaptureResult<()> {
        debug!("Zoom in");
        self.check_camera_thread()?;
        if self.state.is_running() {
            self.adjust_zoom(ZOOM_STEP as i32);
        }
        Ok(())
    }

    /// Step the zoom level down by [`ZOOM_STEP`], clamped to zero.
    pub fn zoom_out(&mut self) -> CaptureResult<()> {
        debug!("Zoom out");
        self.check_camera_thread()?;
        if self.state.is_running() {
            self.adjust_zoom(-(ZOOM_STEP as i32));
        }
        Ok(())
    }

    /// Tap-to-focus at preview pixel `(x, y)` in a `width` x `height`
    /// preview. Returns `false` when stopped, when focus mode AUTO is not
    /// active, or when any driver call fails.
    pub fn focus(&mut self, x: f32, y: f32, width: u32, height: u32) -> CaptureResult<bool> {
        debug!("Focus at ({x}, {y})");
        self.check_camera_thread()?;
        if !self.state.is_running() {
            return Ok(false);
        }
        Ok(self.focus_internal(x, y, width, height))
    }

    fn stop_internal(&mut self) {
        debug!("Stop internal");
        if !self.state.is_running() {
            debug!("Camera is already stopped");
            return;
        }

        // State flips before any teardown so in-flight callbacks observe
        // Stopped and exit without touching the handle.
        self.state.set_stopped();

        if let SessionMode::Texture(source) = &mut self.mode {
            source.stop_listening();
        }
        // stopPreview has been observed to block on some devices; the
        // outer framework owns the watchdog.
        self.device.stop_preview();
        self.device.release();
        self.events.on_camera_closed();
        debug!("Stop done");
    }

    fn set_flash(&mut self, mode: FlashMode) {
        if let Err(e) = self.device.set_flash_mode(mode) {
            warn!("Flash mode change failed: {e}");
        }
    }

    fn adjust_zoom(&mut self, delta: i32) {
        let result = (|| -> Result<(), DeviceError> {
            let current = self.device.zoom()?;
            let max_zoom = self.device.capabilities().max_zoom;
            let new_level = current.saturating_add_signed(delta).min(max_zoom);
            if new_level != current {
                self.device.set_zoom(new_level)?;
            }
            Ok(())
        })();
        if let Err(e) = result {
            warn!("Zoom change failed: {e}");
        }
    }

    fn focus_internal(&mut self, x: f32, y: f32, width: u32, height: u32) -> bool {
        let rect = calculate_tap_area(x, y, width, height);
        let capabilities = self.device.capabilities();

        let result = (|| -> Result<bool, DeviceError> {
            if !capabilities.focus_modes.contains(&FocusMode::Auto)
                || self.device.focus_mode()? != FocusMode::Auto
            {
                debug!("Focus mode AUTO not active, ignoring tap");
                return Ok(false);
            }

            if capabilities.max_focus_areas > 0 {
                self.device.set_focus_areas(&[rect])?;
            }
            if capabilities.max_metering_areas > 0 {
                self.device.set_metering_areas(&[rect])?;
            }
            self.device.cancel_autofocus()?;
            self.device.trigger_autofocus()?;
            debug!("Focus done");
            Ok(true)
        })();

        match result {
            Ok(focused) => focused,
            Err(e) => {
                warn!("Tap-to-focus failed: {e}");
                false
            }
        }
    }

    fn requeue_buffer(&mut self, buffer: BytesMut) -> CaptureResult<()> {
        self.check_camera_thread()?;
        if !self.state.is_running() {
            // Late release; the driver handle is gone.
            debug!("Dropping buffer released after stop");
            return Ok(());
        }
        if let SessionMode::Pixel { pool } = &mut self.mode {
            // Round-trip through the pool so resized buffers are replaced
            // by nothing rather than handed back to the driver.
            pool.put_back(buffer);
            if let Some(buffer) = pool.take() {
                self.device.queue_buffer(buffer);
            }
        }
        Ok(())
    }

    fn on_preview_frame(&mut self, data: BytesMut) -> CaptureResult<()> {
        self.check_camera_thread()?;
        if !self.state.is_running() {
            debug!("Bytebuffer frame captured but camera is no longer running");
            return Ok(());
        }

        self.report_first_frame();
        let timestamp_ns = self.constructed_at.elapsed().as_nanos() as i64;
        let rotation = frame_orientation(&self.info, self.orientation.display_rotation());
        let frame = PlanarYuvFrame::new(
            data,
            self.capture_format.width,
            self.capture_format.height,
            timestamp_ns,
            rotation,
            FrameReleaser::new(self.command_tx.clone()),
        );

        self.metrics.record_frame();
        self.events.on_frame_captured(CapturedFrame::PlanarYuv(frame));
        Ok(())
    }

    fn on_texture_frame(&mut self, mut frame: TextureFrame) -> CaptureResult<()> {
        self.check_camera_thread()?;
        if !self.state.is_running() {
            debug!("Texture frame captured but camera is no longer running");
            return Ok(());
        }

        self.report_first_frame();
        frame.rotation = frame_orientation(&self.info, self.orientation.display_rotation());

        self.metrics.record_frame();
        self.events.on_frame_captured(CapturedFrame::Texture(frame));
        Ok(())
    }

    fn on_driver_fault(&mut self, fault: DriverFault) -> CaptureResult<()> {
        self.check_camera_thread()?;
        let message = match fault {
            DriverFault::Evicted => "Camera evicted by another client".to_string(),
            DriverFault::ServerDied => "Camera server died!".to_string(),
            DriverFault::Other(code) => format!("Camera error: {code}"),
        };
        error!("{message}");

        self.stop_internal();
        if fault == DriverFault::Evicted {
            self.events.on_camera_disconnected();
        } else {
            self.events.on_camera_error(&message);
        }
        Ok(())
    }

    fn report_first_frame(&mut self) {
        if !self.first_frame_reported {
            self.metrics
                .record_first_frame_time(self.constructed_at.elapsed().as_millis() as u64);
            self.first_frame_reported = true;
        }
    }

    fn check_camera_thread(&self) -> CaptureResult<()> {
        if thread::current().id() != self.camera_thread {
            return Err(CaptureError::WrongThread);
        }
        Ok(())
    }
}
