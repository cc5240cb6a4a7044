//! End-to-end controller tests against the virtual camera backend.

use std::sync::{Arc, Once};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use camlink_capture::virtual_device::{VirtualCamera, VirtualEnumerator, VirtualTextureSource};
use camlink_capture::{
    CameraController, CaptureMode, CapturedFrame, CreateSessionCallback, DeviceCapabilities,
    DriverFault, FailureKind, FixedOrientation, FlashMode, FocusMode, FocusRect, ImageFormat,
    SessionConfig, SessionEvents, SessionState, NUMBER_OF_CAPTURE_BUFFERS,
};
use camlink_types::{CameraFacing, CameraInfo, FramerateRange, Size};

#[derive(Default)]
struct Recorded {
    opening: usize,
    closed: usize,
    disconnected: usize,
    errors: Vec<String>,
    frames: Vec<CapturedFrame>,
}

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Recorded>>);

impl SessionEvents for Recorder {
    fn on_camera_opening(&self) {
        self.0.lock().opening += 1;
    }

    fn on_frame_captured(&self, frame: CapturedFrame) {
        self.0.lock().frames.push(frame);
    }

    fn on_camera_closed(&self) {
        self.0.lock().closed += 1;
    }

    fn on_camera_disconnected(&self) {
        self.0.lock().disconnected += 1;
    }

    fn on_camera_error(&self, message: &str) {
        self.0.lock().errors.push(message.to_string());
    }
}

struct CreateProbe {
    tx: Sender<Result<(), (FailureKind, String)>>,
}

impl CreateSessionCallback for CreateProbe {
    fn on_done(&self) {
        let _ = self.tx.send(Ok(()));
    }

    fn on_failure(&self, kind: FailureKind, message: &str) {
        let _ = self.tx.send(Err((kind, message.to_string())));
    }
}

fn default_capabilities() -> DeviceCapabilities {
    DeviceCapabilities {
        preview_sizes: vec![Size::new(640, 480), Size::new(1280, 720)],
        picture_sizes: vec![Size::new(640, 480), Size::new(1280, 720)],
        fps_ranges: vec![
            FramerateRange::new(15000, 30000),
            FramerateRange::new(5000, 15000),
        ],
        max_zoom: 10,
        max_focus_areas: 1,
        max_metering_areas: 1,
        focus_modes: vec![FocusMode::Auto, FocusMode::ContinuousVideo],
        ..Default::default()
    }
}

struct Rig {
    controller: CameraController,
    camera: VirtualCamera,
    events: Recorder,
    created: Receiver<Result<(), (FailureKind, String)>>,
}

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

fn open_rig(
    mode: CaptureMode,
    capabilities: DeviceCapabilities,
    facing: CameraFacing,
    mount_orientation: u32,
    display_rotation: u32,
    prepare: impl FnOnce(&VirtualCamera),
) -> Rig {
    init_tracing();
    let camera = VirtualCamera::new(capabilities);
    prepare(&camera);
    let enumerator = VirtualEnumerator::new().with_camera(
        "cam0",
        CameraInfo::new(facing, mount_orientation),
        camera.clone(),
    );
    let events = Recorder::default();
    let (tx, created) = crossbeam_channel::unbounded();

    let controller = CameraController::create(
        SessionConfig {
            camera_name: "cam0".to_string(),
            width: 640,
            height: 480,
            framerate: 30,
        },
        mode,
        Box::new(enumerator),
        Arc::new(FixedOrientation::new(display_rotation)),
        Arc::new(events.clone()),
        Box::new(CreateProbe { tx }),
        Arc::new(camlink_capture::NoopMetrics),
    );

    Rig {
        controller,
        camera,
        events,
        created,
    }
}

fn pixel_rig() -> Rig {
    let rig = open_rig(
        CaptureMode::PixelBuffer,
        default_capabilities(),
        CameraFacing::Back,
        90,
        270,
        |_| {},
    );
    assert!(rig
        .created
        .recv_timeout(Duration::from_secs(5))
        .unwrap()
        .is_ok());
    rig
}

/// Round-trips a command through the camera thread so everything sent
/// before it has been handled.
fn drain(controller: &CameraController) {
    let _ = controller.focus(0.0, 0.0, 640, 480);
}

fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("condition not reached within 5s");
}

#[test]
fn test_open_applies_negotiated_parameters() {
    let rig = pixel_rig();

    let params = rig.camera.applied_parameters().unwrap();
    assert_eq!(params.preview_size, Size::new(640, 480));
    assert_eq!(params.framerate, FramerateRange::new(15000, 30000));
    assert_eq!(params.preview_format, Some(ImageFormat::Nv21));
    assert_eq!(params.focus_mode, Some(FocusMode::Auto));
    assert_eq!(params.display_orientation, 0);

    assert_eq!(rig.camera.queued_buffers(), NUMBER_OF_CAPTURE_BUFFERS);
    assert!(rig.camera.is_previewing());
    assert_eq!(rig.events.0.lock().opening, 1);
    assert_eq!(rig.controller.session_state(), SessionState::Running);
}

#[test]
fn test_frame_flow_rotation_and_buffer_conservation() {
    let rig = pixel_rig();

    assert!(rig.camera.emit_frame());
    wait_until(|| !rig.events.0.lock().frames.is_empty());

    {
        let recorded = rig.events.0.lock();
        let frame = &recorded.frames[0];
        assert_eq!((frame.width(), frame.height()), (640, 480));
        // Back-facing, mounted at 90, display rotated 270.
        assert_eq!(frame.rotation(), 180);
        assert!(matches!(frame, CapturedFrame::PlanarYuv(_)));
    }

    // One buffer is lent to the frame holder.
    assert_eq!(
        rig.camera.queued_buffers(),
        NUMBER_OF_CAPTURE_BUFFERS - 1
    );

    let frames = std::mem::take(&mut rig.events.0.lock().frames);
    drop(frames);
    drain(&rig.controller);
    assert_eq!(rig.camera.queued_buffers(), NUMBER_OF_CAPTURE_BUFFERS);
}

#[test]
fn test_stop_is_idempotent() {
    let rig = pixel_rig();

    rig.controller.stop();
    rig.controller.stop();
    drain(&rig.controller);

    assert!(rig.camera.is_released());
    assert!(!rig.camera.is_previewing());
    assert_eq!(rig.controller.session_state(), SessionState::Stopped);
    assert_eq!(rig.events.0.lock().closed, 1);
}

#[test]
fn test_frame_released_after_stop_is_dropped() {
    let rig = pixel_rig();

    assert!(rig.camera.emit_frame());
    wait_until(|| !rig.events.0.lock().frames.is_empty());

    rig.controller.stop();
    drain(&rig.controller);
    assert_eq!(rig.camera.queued_buffers(), 0);

    // The driver handle is gone; the late release must not requeue.
    let frames = std::mem::take(&mut rig.events.0.lock().frames);
    drop(frames);
    drain(&rig.controller);
    assert_eq!(rig.camera.queued_buffers(), 0);
}

#[test]
fn test_eviction_stops_and_reports_disconnected() {
    let rig = pixel_rig();

    assert!(rig.camera.inject_fault(DriverFault::Evicted));
    wait_until(|| rig.events.0.lock().disconnected == 1);

    let recorded = rig.events.0.lock();
    assert_eq!(recorded.closed, 1);
    assert!(recorded.errors.is_empty());
    drop(recorded);
    assert!(!rig.controller.is_running());
    assert!(rig.camera.is_released());
}

#[test]
fn test_driver_error_stops_and_reports_error() {
    let rig = pixel_rig();

    assert!(rig.camera.inject_fault(DriverFault::ServerDied));
    wait_until(|| !rig.events.0.lock().errors.is_empty());

    let recorded = rig.events.0.lock();
    assert_eq!(recorded.closed, 1);
    assert_eq!(recorded.disconnected, 0);
    drop(recorded);
    assert!(!rig.controller.is_running());
}

#[test]
fn test_open_failure_reports_failure_exactly_once() {
    let rig = open_rig(
        CaptureMode::PixelBuffer,
        default_capabilities(),
        CameraFacing::Front,
        0,
        0,
        VirtualCamera::fail_open,
    );

    let outcome = rig.created.recv_timeout(Duration::from_secs(5)).unwrap();
    let (kind, message) = outcome.unwrap_err();
    assert_eq!(kind, FailureKind::Error);
    assert!(message.contains("unavailable"));

    assert!(rig.created.try_recv().is_err());
    assert!(!rig.controller.is_running());
    assert_eq!(rig.events.0.lock().opening, 1);
}

#[test]
fn test_empty_capabilities_fail_session_creation() {
    let rig = open_rig(
        CaptureMode::PixelBuffer,
        DeviceCapabilities::default(),
        CameraFacing::Front,
        0,
        0,
        |_| {},
    );

    let outcome = rig.created.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(outcome.is_err());
    assert!(!rig.controller.is_running());
}

#[test]
fn test_zoom_steps_clamp_at_maximum() {
    let rig = pixel_rig();

    rig.controller.zoom_in();
    rig.controller.zoom_in();
    drain(&rig.controller);
    assert_eq!(rig.camera.zoom_level(), 8);

    // 8 + 4 exceeds max_zoom 10 and clamps.
    rig.controller.zoom_in();
    rig.controller.zoom_in();
    drain(&rig.controller);
    assert_eq!(rig.camera.zoom_level(), 10);

    rig.controller.zoom_out();
    drain(&rig.controller);
    assert_eq!(rig.camera.zoom_level(), 6);
}

#[test]
fn test_torch_toggles_flash_mode() {
    let rig = pixel_rig();

    rig.controller.enable_torch();
    drain(&rig.controller);
    assert_eq!(rig.camera.flash_mode(), Some(FlashMode::Torch));

    rig.controller.disable_torch();
    drain(&rig.controller);
    assert_eq!(rig.camera.flash_mode(), Some(FlashMode::Off));
}

#[test]
fn test_focus_maps_tap_and_triggers_autofocus() {
    let rig = pixel_rig();

    assert!(rig.controller.focus(500.0, 500.0, 1000, 1000));
    assert_eq!(
        rig.camera.focus_areas(),
        vec![FocusRect {
            left: -125,
            top: -125,
            right: 125,
            bottom: 125
        }]
    );
    assert_eq!(rig.camera.metering_areas().len(), 1);
    assert_eq!(rig.camera.autofocus_cancels(), 1);
    assert_eq!(rig.camera.autofocus_triggers(), 1);
}

#[test]
fn test_focus_without_auto_mode_returns_false() {
    let mut capabilities = default_capabilities();
    capabilities.focus_modes = vec![FocusMode::ContinuousVideo];
    let rig = open_rig(
        CaptureMode::PixelBuffer,
        capabilities,
        CameraFacing::Back,
        90,
        0,
        |_| {},
    );
    assert!(rig.created.recv_timeout(Duration::from_secs(5)).unwrap().is_ok());

    assert!(!rig.controller.focus(500.0, 500.0, 1000, 1000));
    assert_eq!(rig.camera.autofocus_triggers(), 0);
}

#[test]
fn test_focus_after_stop_returns_false() {
    let rig = pixel_rig();
    rig.controller.stop();
    assert!(!rig.controller.focus(500.0, 500.0, 1000, 1000));
}

#[test]
fn test_texture_mode_frame_flow() {
    let source = VirtualTextureSource::new();
    let rig = open_rig(
        CaptureMode::Texture(Box::new(source.clone())),
        default_capabilities(),
        CameraFacing::Front,
        270,
        90,
        |_| {},
    );
    assert!(rig.created.recv_timeout(Duration::from_secs(5)).unwrap().is_ok());

    assert!(source.is_listening());
    assert_eq!(source.texture_size(), Some(Size::new(640, 480)));

    assert!(source.emit_frame(42));
    wait_until(|| !rig.events.0.lock().frames.is_empty());
    {
        let recorded = rig.events.0.lock();
        let frame = &recorded.frames[0];
        assert!(matches!(frame, CapturedFrame::Texture(_)));
        assert_eq!(frame.timestamp_ns(), 42);
        // Front-facing, mounted at 270, display rotated 90.
        assert_eq!(frame.rotation(), 0);
    }

    rig.controller.stop();
    drain(&rig.controller);
    assert!(!source.is_listening());
    assert!(rig.camera.is_released());
}
