// This is free and unencumbered software released into the public domain.

//! The viewer lifecycle: permission, resume/pause, the processing toggle and
//! the FPS readout, wired around the session manager and the camera thread.

use crate::shared::{
    BackgroundExecutor, CAMERA_PERMISSION_REQUEST_CODE, CAMERA_PERMISSION_REQUIRED,
    CAMERA_THREAD_NAME, CameraDriver, CameraError, CameraEvent, DisplayFrame, EdgeDetector,
    Frame, FpsCounter, FrameSink, OutputTarget, PermissionGate, PermissionRequest,
    PermissionStatus, PixelFormat, PreviewSurface, SessionManager, SessionPhase, ViewerConfig,
    fps_text, is_granted,
};
use bytes::Bytes;
use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
        mpsc::{Receiver, sync_channel},
    },
    time::Instant,
};

pub const LABEL_SHOW_RAW: &str = "Show Raw";
pub const LABEL_SHOW_PROCESSED: &str = "Show Processed";

const EVENT_CAPACITY: usize = 64;

/// The host's user interface: one toggle button, one text readout.
pub trait ViewerUi: Send + Sync {
    fn set_toggle_label(&self, label: &str);
    fn set_fps_text(&self, text: &str);
    fn show_message(&self, message: &str);
    fn finish(&self);
}

/// Whether frames are shown edge-detected or raw.
#[derive(Debug)]
pub struct ProcessingToggle(AtomicBool);

impl ProcessingToggle {
    pub fn new(enabled: bool) -> Self {
        Self(AtomicBool::new(enabled))
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Flips the flag and returns the new value.
    pub fn toggle(&self) -> bool {
        !self.0.fetch_xor(true, Ordering::AcqRel)
    }

    pub fn label(&self) -> &'static str {
        toggle_label(self.is_enabled())
    }
}

pub fn toggle_label(enabled: bool) -> &'static str {
    if enabled {
        LABEL_SHOW_RAW
    } else {
        LABEL_SHOW_PROCESSED
    }
}

pub struct EdgeViewer {
    config: ViewerConfig,
    ui: Arc<dyn ViewerUi>,
    gate: Box<dyn PermissionGate>,
    session: SessionManager,
    executor: BackgroundExecutor,
    surface: Arc<dyn PreviewSurface>,
    events_rx: Receiver<CameraEvent>,
    toggle: Arc<ProcessingToggle>,
    permission_granted: bool,
    surface_available: bool,
    resumed: bool,
    finished: bool,
}

impl EdgeViewer {
    pub fn new(
        config: ViewerConfig,
        driver: Box<dyn CameraDriver>,
        gate: Box<dyn PermissionGate>,
        surface: Arc<dyn PreviewSurface>,
        ui: Arc<dyn ViewerUi>,
    ) -> Self {
        let (events_tx, events_rx) = sync_channel(EVENT_CAPACITY);
        let executor = BackgroundExecutor::new(
            CAMERA_THREAD_NAME,
            config.camera.buffer_frames,
            events_tx,
        );
        let preview = OutputTarget {
            width: config.camera.width,
            height: config.camera.height,
            pixel_format: PixelFormat::I420,
        };
        let session = SessionManager::new(driver, preview);
        let toggle = Arc::new(ProcessingToggle::new(config.processing_enabled));
        let fps = Arc::new(Mutex::new(FpsCounter::default()));

        executor.add_sink(frame_sink(
            EdgeDetector::from(config.edge),
            Arc::clone(&toggle),
            fps,
            Arc::clone(&surface),
            Arc::clone(&ui),
        ));

        Self {
            config,
            ui,
            gate,
            session,
            executor,
            surface,
            events_rx,
            toggle,
            permission_granted: false,
            surface_available: false,
            resumed: false,
            finished: false,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn events(&self) -> &Receiver<CameraEvent> {
        &self.events_rx
    }

    pub fn is_processing_enabled(&self) -> bool {
        self.toggle.is_enabled()
    }

    pub fn is_background_running(&self) -> bool {
        self.executor.is_running()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Checks for camera access, requesting it when missing.
    pub fn create(&mut self) {
        self.ui.set_toggle_label(self.toggle.label());
        if self.gate.check() == PermissionStatus::Granted {
            self.setup_camera();
            return;
        }
        match self.gate.request(CAMERA_PERMISSION_REQUEST_CODE) {
            PermissionRequest::Pending => {
                tracing::debug!(target: "edge_viewer", "waiting for camera permission");
            },
            PermissionRequest::Answered(grants) => {
                self.on_permission_result(CAMERA_PERMISSION_REQUEST_CODE, &grants);
            },
        }
    }

    pub fn on_permission_result(&mut self, request_code: i32, grants: &[PermissionStatus]) {
        if request_code != CAMERA_PERMISSION_REQUEST_CODE {
            return;
        }
        if is_granted(grants) {
            self.setup_camera();
        } else {
            tracing::warn!(target: "edge_viewer", "camera permission denied");
            self.ui.show_message(CAMERA_PERMISSION_REQUIRED);
            self.finish();
        }
    }

    fn setup_camera(&mut self) {
        tracing::debug!(target: "edge_viewer", "setting up camera");
        self.permission_granted = true;
        if self.resumed && self.surface_available {
            self.open_camera();
        }
    }

    pub fn resume(&mut self) -> Result<(), CameraError> {
        if self.finished {
            return Err(CameraError::Closed);
        }
        self.executor.start()?;
        self.resumed = true;
        if self.surface_available {
            self.open_camera();
        }
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), CameraError> {
        self.close_camera();
        self.resumed = false;
        self.executor.stop()
    }

    pub fn on_surface_available(&mut self, width: u32, height: u32) {
        tracing::debug!(target: "edge_viewer", width, height, "preview surface available");
        self.surface.on_available(width, height);
        self.surface_available = true;
        if self.resumed {
            self.open_camera();
        }
    }

    pub fn on_surface_size_changed(&mut self, width: u32, height: u32) {
        self.surface.on_size_changed(width, height);
    }

    /// Returns whether the host may release the surface.
    pub fn on_surface_destroyed(&mut self) -> bool {
        self.surface_available = false;
        self.surface.on_destroyed()
    }

    pub fn toggle_processing(&self) -> bool {
        let enabled = self.toggle.toggle();
        self.ui.set_toggle_label(toggle_label(enabled));
        tracing::info!(target: "edge_viewer", enabled, "processing toggled");
        enabled
    }

    fn open_camera(&mut self) {
        if !self.permission_granted || self.gate.check() != PermissionStatus::Granted {
            return;
        }
        let Some(handler) = self.executor.handler() else {
            tracing::error!(target: "edge_viewer", "camera thread is not running");
            return;
        };
        let configured = self.config.camera.device.as_deref();
        let camera_id = match self
            .session
            .with_driver(|d| crate::shared::select_camera_id(d, configured))
        {
            Ok(id) => id,
            Err(err) => {
                tracing::error!(target: "edge_viewer", %err, "error opening camera");
                return;
            },
        };
        if let Err(err) = self.session.open(&camera_id, handler) {
            tracing::error!(target: "edge_viewer", %err, camera_id, "error opening camera");
        }
    }

    fn close_camera(&mut self) {
        if self.session.phase() != SessionPhase::Closed {
            self.session.close();
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.ui.finish();
    }
}

impl Drop for EdgeViewer {
    fn drop(&mut self) {
        let _ = self.pause();
    }
}

/// Per-frame pipeline on the camera thread: count, process, display.
fn frame_sink(
    detector: EdgeDetector,
    toggle: Arc<ProcessingToggle>,
    fps: Arc<Mutex<FpsCounter>>,
    surface: Arc<dyn PreviewSurface>,
    ui: Arc<dyn ViewerUi>,
) -> FrameSink {
    Arc::new(move |frame: Frame| {
        if !frame.is_complete() {
            tracing::warn!(
                target: "edge_viewer",
                len = frame.data.len(),
                width = frame.width,
                height = frame.height,
                "skipping truncated frame"
            );
            return;
        }
        let published = fps
            .lock()
            .map(|mut f| f.tick(Instant::now()))
            .unwrap_or(None);
        if let Some(n) = published {
            ui.set_fps_text(&fps_text(n));
        }

        let enabled = toggle.is_enabled();
        let len = frame.pixel_format.buffer_len(frame.width, frame.height);
        let input = &frame.data[..len];
        let jpeg = match detector.process_i420(input, frame.width, frame.height, enabled) {
            Ok(jpeg) => jpeg,
            Err(err) => {
                tracing::error!(target: "edge_viewer", %err, "frame processing failed");
                return;
            },
        };

        let display = DisplayFrame {
            jpeg: Bytes::from(jpeg),
            width: frame.width,
            height: frame.height,
            processed: enabled,
            timestamp_ns: frame.timestamp_ns,
        };
        if let Err(err) = surface.on_updated(&display) {
            tracing::warn!(target: "edge_viewer", %err, "failed to display frame");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_flips_flag_and_label() {
        let toggle = ProcessingToggle::new(true);
        assert_eq!(toggle.label(), LABEL_SHOW_RAW);
        assert!(!toggle.toggle());
        assert!(!toggle.is_enabled());
        assert_eq!(toggle.label(), LABEL_SHOW_PROCESSED);
        assert!(toggle.toggle());
        assert_eq!(toggle.label(), LABEL_SHOW_RAW);
    }
}
