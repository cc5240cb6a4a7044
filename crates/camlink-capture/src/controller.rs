//! The external control surface and camera thread owner.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::BytesMut;
use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, info, instrument, warn};

use crate::device::{CameraEnumerator, CaptureMode, DriverFault, OrientationSource};
use crate::events::{CreateSessionCallback, FailureKind, SessionEvents};
use crate::frame::TextureFrame;
use crate::metrics::MetricsSink;
use crate::session::{CameraSession, SessionState, SharedSessionState};

/// Channel capacity for camera thread commands.
pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Requested camera and capture target.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Camera name resolved through the enumerator.
    pub camera_name: String,

    /// Requested preview width in pixels.
    pub width: u32,

    /// Requested preview height in pixels.
    pub height: u32,

    /// Requested frame rate in fps.
    pub framerate: u32,
}

/// Work items executed in order on the camera thread.
pub enum CameraCommand {
    /// Stop the session.
    Stop,

    /// Turn the torch on.
    EnableTorch,

    /// Turn the torch off.
    DisableTorch,

    /// Step the zoom in.
    ZoomIn,

    /// Step the zoom out.
    ZoomOut,

    /// Tap-to-focus; the outcome is reported through `reply`.
    Focus {
        x: f32,
        y: f32,
        width: u32,
        height: u32,
        reply: Sender<bool>,
    },

    /// Return a released preview buffer to the driver.
    RequeueBuffer(BytesMut),

    /// A filled preview buffer arrived from the driver.
    PreviewFrame(BytesMut),

    /// A frame arrived from the surface-texture listener.
    TextureFrame(TextureFrame),

    /// An asynchronous driver error occurred.
    DriverFault(DriverFault),

    /// Stop the session and exit the camera thread.
    Shutdown,
}

impl std::fmt::Debug for CameraCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Stop => "Stop",
            Self::EnableTorch => "EnableTorch",
            Self::DisableTorch => "DisableTorch",
            Self::ZoomIn => "ZoomIn",
            Self::ZoomOut => "ZoomOut",
            Self::Focus { .. } => "Focus",
            Self::RequeueBuffer(_) => "RequeueBuffer",
            Self::PreviewFrame(_) => "PreviewFrame",
            Self::TextureFrame(_) => "TextureFrame",
            Self::DriverFault(_) => "DriverFault",
            Self::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

/// Owns the camera thread and serializes every control operation onto it.
///
/// Dropping the controller stops the session and joins the thread.
pub struct CameraController {
    command_tx: Sender<CameraCommand>,
    camera_thread: Option<JoinHandle<()>>,
    state: SharedSessionState,
}

impl CameraController {
    /// Spawn the camera thread and open a session on it.
    ///
    /// Exactly one of `callback.on_done` / `callback.on_failure` is
    /// invoked, on the camera thread, once the open attempt resolves.
    #[instrument(name = "controller_create", skip_all, fields(camera = %config.camera_name))]
    pub fn create(
        config: SessionConfig,
        mode: CaptureMode,
        enumerator: Box<dyn CameraEnumerator>,
        orientation: Arc<dyn OrientationSource>,
        events: Arc<dyn SessionEvents>,
        callback: Box<dyn CreateSessionCallback>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let (command_tx, command_rx) = crossbeam_channel::bounded(COMMAND_CHANNEL_CAPACITY);
        let state = SharedSessionState::new();

        let session_tx = command_tx.clone();
        let session_state = state.clone();
        let handle = thread::spawn(move || {
            camera_thread_main(
                config,
                mode,
                enumerator,
                orientation,
                events,
                callback,
                metrics,
                session_tx,
                session_state,
                command_rx,
            );
        });

        Self {
            command_tx,
            camera_thread: Some(handle),
            state,
        }
    }

    /// Stop the session. Safe to call more than once.
    pub fn stop(&self) {
        self.send(CameraCommand::Stop);
    }

    /// Turn the torch on.
    pub fn enable_torch(&self) {
        self.send(CameraCommand::EnableTorch);
    }

    /// Turn the torch off.
    pub fn disable_torch(&self) {
        self.send(CameraCommand::DisableTorch);
    }

    /// Step the zoom in.
    pub fn zoom_in(&self) {
        self.send(CameraCommand::ZoomIn);
    }

    /// Step the zoom out.
    pub fn zoom_out(&self) {
        self.send(CameraCommand::ZoomOut);
    }

    /// Tap-to-focus at preview pixel `(x, y)` in a `width` x `height`
    /// preview rectangle. Blocks until the camera thread reports the
    /// outcome; `false` if the session is gone.
    pub fn focus(&self, x: f32, y: f32, width: u32, height: u32) -> bool {
        let (reply, reply_rx) = crossbeam_channel::bounded(1);
        if !self.send(CameraCommand::Focus {
            x,
            y,
            width,
            height,
            reply,
        }) {
            return false;
        }
        reply_rx.recv().unwrap_or(false)
    }

    /// Cross-thread state snapshot; monotonically advancing.
    pub fn session_state(&self) -> SessionState {
        self.state.get()
    }

    /// Whether the session is still running.
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    fn send(&self, command: CameraCommand) -> bool {
        let accepted = self.command_tx.send(command).is_ok();
        if !accepted {
            warn!("Camera thread is gone, command dropped");
        }
        accepted
    }
}

impl Drop for CameraController {
    fn drop(&mut self) {
        let _ = self.command_tx.send(CameraCommand::Shutdown);
        if let Some(handle) = self.camera_thread.take() {
            let _ = handle.join();
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn camera_thread_main(
    config: SessionConfig,
    mode: CaptureMode,
    enumerator: Box<dyn CameraEnumerator>,
    orientation: Arc<dyn OrientationSource>,
    events: Arc<dyn SessionEvents>,
    callback: Box<dyn CreateSessionCallback>,
    metrics: Arc<dyn MetricsSink>,
    command_tx: Sender<CameraCommand>,
    state: SharedSessionState,
    command_rx: Receiver<CameraCommand>,
) {
    let mut session = match CameraSession::open(
        &*enumerator,
        mode,
        orientation,
        events,
        metrics,
        command_tx,
        state.clone(),
        &config,
    ) {
        Ok(session) => {
            callback.on_done();
            session
        }
        Err(e) => {
            error!("Session open failed: {e}");
            state.set_stopped();
            callback.on_failure(FailureKind::Error, &e.to_string());
            return;
        }
    };

    info!("Camera thread running");
    for command in command_rx.iter() {
        let shutdown = matches!(command, CameraCommand::Shutdown);
        debug!(?command, "Handling command");
        if let Err(e) = session.handle_command(command) {
            error!("Command failed: {e}");
        }
        if shutdown {
            break;
        }
    }
    debug!("Camera thread exiting");
}
