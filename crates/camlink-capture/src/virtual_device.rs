//! In-process virtual camera backend.
//!
//! Emits patterned frames from the queued preview buffers and records
//! every driver interaction, so session behaviour can be exercised without
//! hardware. Handles are cheaply cloneable views onto shared state: the
//! session owns one, the test keeps another to tick frames and inspect
//! applied parameters.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::Mutex;

use camlink_types::{CameraInfo, Matrix3};

use crate::device::{
    CameraDevice, CameraEnumerator, DeviceCapabilities, DeviceError, DeviceParameters,
    DriverFault, ErrorCallback, FlashMode, FocusMode, FocusRect, PreviewCallback,
    TextureFrameCallback, TextureSource,
};
use crate::error::CaptureError;
use crate::frame::TextureFrame;
use crate::CaptureResult;

#[derive(Default)]
struct CameraState {
    capabilities: DeviceCapabilities,
    applied_parameters: Option<DeviceParameters>,
    zoom: u32,
    flash_mode: Option<FlashMode>,
    focus_mode: Option<FocusMode>,
    focus_areas: Vec<FocusRect>,
    metering_areas: Vec<FocusRect>,
    autofocus_triggers: u32,
    autofocus_cancels: u32,
    queued: VecDeque<BytesMut>,
    preview_callback: Option<PreviewCallback>,
    error_callback: Option<ErrorCallback>,
    previewing: bool,
    released: bool,
    frame_counter: u64,
    fail_open: bool,
    fail_apply_parameters: bool,
    fail_start_preview: bool,
    fail_controls: bool,
}

/// A virtual camera driver handle.
#[derive(Clone)]
pub struct VirtualCamera {
    state: Arc<Mutex<CameraState>>,
}

impl VirtualCamera {
    /// Create a virtual camera with the given capability sets.
    pub fn new(capabilities: DeviceCapabilities) -> Self {
        let focus_mode = capabilities
            .focus_modes
            .first()
            .copied();
        Self {
            state: Arc::new(Mutex::new(CameraState {
                capabilities,
                focus_mode,
                ..Default::default()
            })),
        }
    }

    /// Make `open` fail for this camera.
    pub fn fail_open(&self) {
        self.state.lock().fail_open = true;
    }

    /// Make `apply_parameters` fail.
    pub fn fail_apply_parameters(&self) {
        self.state.lock().fail_apply_parameters = true;
    }

    /// Make `start_preview` fail.
    pub fn fail_start_preview(&self) {
        self.state.lock().fail_start_preview = true;
    }

    /// Make every control call (zoom, flash, focus) fail.
    pub fn fail_controls(&self, fail: bool) {
        self.state.lock().fail_controls = fail;
    }

    /// Fill the next queued buffer with a pattern and deliver it through
    /// the preview callback. Returns `false` if no buffer or callback is
    /// available or the preview is not running.
    pub fn emit_frame(&self) -> bool {
        let (mut callback, buffer) = {
            let mut state = self.state.lock();
            if !state.previewing || state.released {
                return false;
            }
            let Some(mut buffer) = state.queued.pop_front() else {
                return false;
            };
            let Some(callback) = state.preview_callback.take() else {
                state.queued.push_front(buffer);
                return false;
            };
            let pattern = (state.frame_counter % 256) as u8;
            state.frame_counter += 1;
            buffer.fill(pattern);
            (callback, buffer)
        };

        // Invoked without the lock held; the callback posts to the camera
        // thread, which may immediately call back into the device.
        callback(buffer);
        self.state.lock().preview_callback = Some(callback);
        true
    }

    /// Deliver an asynchronous driver error.
    pub fn inject_fault(&self, fault: DriverFault) -> bool {
        let Some(mut callback) = self.state.lock().error_callback.take() else {
            return false;
        };
        callback(fault);
        self.state.lock().error_callback = Some(callback);
        true
    }

    /// Number of buffers currently lent to the driver.
    pub fn queued_buffers(&self) -> usize {
        self.state.lock().queued.len()
    }

    /// Whether the handle has been released.
    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }

    /// Whether the preview is running.
    pub fn is_previewing(&self) -> bool {
        self.state.lock().previewing
    }

    /// Current zoom level.
    pub fn zoom_level(&self) -> u32 {
        self.state.lock().zoom
    }

    /// Last flash mode written, if any.
    pub fn flash_mode(&self) -> Option<FlashMode> {
        self.state.lock().flash_mode
    }

    /// The parameter block applied at open, if any.
    pub fn applied_parameters(&self) -> Option<DeviceParameters> {
        self.state.lock().applied_parameters.clone()
    }

    /// Focus areas last written.
    pub fn focus_areas(&self) -> Vec<FocusRect> {
        self.state.lock().focus_areas.clone()
    }

    /// Metering areas last written.
    pub fn metering_areas(&self) -> Vec<FocusRect> {
        self.state.lock().metering_areas.clone()
    }

    /// Number of one-shot autofocus triggers.
    pub fn autofocus_triggers(&self) -> u32 {
        self.state.lock().autofocus_triggers
    }

    /// Number of autofocus cancellations.
    pub fn autofocus_cancels(&self) -> u32 {
        self.state.lock().autofocus_cancels
    }

    fn control_guard(state: &CameraState) -> Result<(), DeviceError> {
        if state.fail_controls {
            return Err(DeviceError("injected control failure".to_string()));
        }
        if state.released {
            return Err(DeviceError("handle released".to_string()));
        }
        Ok(())
    }
}

impl CameraDevice for VirtualCamera {
    fn capabilities(&self) -> DeviceCapabilities {
        self.state.lock().capabilities.clone()
    }

    fn apply_parameters(&mut self, params: &DeviceParameters) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        if state.fail_apply_parameters {
            return Err(DeviceError("injected parameter failure".to_string()));
        }
        if let Some(mode) = params.focus_mode {
            state.focus_mode = Some(mode);
        }
        state.applied_parameters = Some(params.clone());
        Ok(())
    }

    fn start_preview(&mut self) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        if state.fail_start_preview {
            return Err(DeviceError("injected preview failure".to_string()));
        }
        state.previewing = true;
        Ok(())
    }

    fn stop_preview(&mut self) {
        self.state.lock().previewing = false;
    }

    fn release(&mut self) {
        let mut state = self.state.lock();
        state.released = true;
        state.previewing = false;
        state.queued.clear();
        state.preview_callback = None;
        state.error_callback = None;
    }

    fn queue_buffer(&mut self, buffer: BytesMut) {
        let mut state = self.state.lock();
        if state.released {
            return;
        }
        state.queued.push_back(buffer);
    }

    fn set_preview_callback(&mut self, callback: PreviewCallback) {
        self.state.lock().preview_callback = Some(callback);
    }

    fn set_error_callback(&mut self, callback: ErrorCallback) {
        self.state.lock().error_callback = Some(callback);
    }

    fn zoom(&self) -> Result<u32, DeviceError> {
        let state = self.state.lock();
        Self::control_guard(&state)?;
        Ok(state.zoom)
    }

    fn set_zoom(&mut self, level: u32) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        Self::control_guard(&state)?;
        if level > state.capabilities.max_zoom {
            return Err(DeviceError(format!("zoom {level} out of range")));
        }
        state.zoom = level;
        Ok(())
    }

    fn set_flash_mode(&mut self, mode: FlashMode) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        Self::control_guard(&state)?;
        state.flash_mode = Some(mode);
        Ok(())
    }

    fn focus_mode(&self) -> Result<FocusMode, DeviceError> {
        let state = self.state.lock();
        Self::control_guard(&state)?;
        state
            .focus_mode
            .ok_or_else(|| DeviceError("no focus mode".to_string()))
    }

    fn set_focus_areas(&mut self, areas: &[FocusRect]) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        Self::control_guard(&state)?;
        state.focus_areas = areas.to_vec();
        Ok(())
    }

    fn set_metering_areas(&mut self, areas: &[FocusRect]) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        Self::control_guard(&state)?;
        state.metering_areas = areas.to_vec();
        Ok(())
    }

    fn cancel_autofocus(&mut self) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        Self::control_guard(&state)?;
        state.autofocus_cancels += 1;
        Ok(())
    }

    fn trigger_autofocus(&mut self) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        Self::control_guard(&state)?;
        state.autofocus_triggers += 1;
        Ok(())
    }
}

/// Enumerates a fixed set of virtual cameras by name.
#[derive(Default)]
pub struct VirtualEnumerator {
    cameras: Vec<(String, CameraInfo, VirtualCamera)>,
}

impl VirtualEnumerator {
    /// Create an empty enumerator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a camera under `name`.
    pub fn with_camera(mut self, name: &str, info: CameraInfo, camera: VirtualCamera) -> Self {
        self.cameras.push((name.to_string(), info, camera));
        self
    }

    /// Test handle for a registered camera.
    pub fn camera(&self, name: &str) -> Option<VirtualCamera> {
        self.cameras
            .iter()
            .find(|(n, _, _)| n == name)
            .map(|(_, _, camera)| camera.clone())
    }
}

impl CameraEnumerator for VirtualEnumerator {
    fn camera_id(&self, name: &str) -> Option<usize> {
        self.cameras.iter().position(|(n, _, _)| n == name)
    }

    fn camera_info(&self, id: usize) -> CaptureResult<CameraInfo> {
        self.cameras
            .get(id)
            .map(|(_, info, _)| *info)
            .ok_or_else(|| CaptureError::Configuration(format!("no camera with id {id}")))
    }

    fn open(&self, id: usize) -> CaptureResult<Box<dyn CameraDevice>> {
        let (name, _, camera) = self
            .cameras
            .get(id)
            .ok_or_else(|| CaptureError::Configuration(format!("no camera with id {id}")))?;
        if camera.state.lock().fail_open {
            return Err(CaptureError::Open(format!("camera {name} unavailable")));
        }
        Ok(Box::new(camera.clone()))
    }
}

#[derive(Default)]
struct TextureState {
    texture_size: Option<camlink_types::Size>,
    callback: Option<TextureFrameCallback>,
    listening: bool,
    next_texture_id: u32,
}

/// A virtual surface-texture helper for texture-mode sessions.
#[derive(Clone, Default)]
pub struct VirtualTextureSource {
    state: Arc<Mutex<TextureState>>,
}

impl VirtualTextureSource {
    /// Create a new source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a listener is attached.
    pub fn is_listening(&self) -> bool {
        self.state.lock().listening
    }

    /// The texture size set by the session, if any.
    pub fn texture_size(&self) -> Option<camlink_types::Size> {
        self.state.lock().texture_size
    }

    /// Deliver one texture frame to the listener, with a fresh texture id.
    pub fn emit_frame(&self, timestamp_ns: i64) -> bool {
        let (mut callback, frame) = {
            let mut state = self.state.lock();
            if !state.listening {
                return false;
            }
            let Some(callback) = state.callback.take() else {
                return false;
            };
            let Some(size) = state.texture_size else {
                state.callback = Some(callback);
                return false;
            };
            state.next_texture_id += 1;
            let frame = TextureFrame {
                texture_id: state.next_texture_id,
                transform: Matrix3::identity(),
                width: size.width,
                height: size.height,
                timestamp_ns,
                rotation: 0,
            };
            (callback, frame)
        };

        callback(frame);
        self.state.lock().callback = Some(callback);
        true
    }
}

impl TextureSource for VirtualTextureSource {
    fn set_texture_size(&mut self, size: camlink_types::Size) {
        self.state.lock().texture_size = Some(size);
    }

    fn start_listening(&mut self, callback: TextureFrameCallback) {
        let mut state = self.state.lock();
        state.callback = Some(callback);
        state.listening = true;
    }

    fn stop_listening(&mut self) {
        let mut state = self.state.lock();
        state.listening = false;
        state.callback = None;
    }
}
