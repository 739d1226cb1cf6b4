// This is free and unencumbered software released into the public domain.

use edge_viewer::shared::{
    CAMERA_PERMISSION_REQUEST_CODE, CAMERA_PERMISSION_REQUIRED, CameraConfig, CameraError,
    CameraEvent, DisplayFrame, EdgeViewer, LABEL_SHOW_PROCESSED, LABEL_SHOW_RAW, NullSurface,
    PermissionGate, PermissionRequest, PermissionStatus, PreviewSurface, SessionPhase,
    StaticPermissionGate, ViewerConfig, ViewerUi,
    drivers::synthetic::{SyntheticCameraDriver, SyntheticFailure},
    open,
};
use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

#[derive(Default)]
struct RecordingUi {
    labels: Mutex<Vec<String>>,
    fps: Mutex<Vec<String>>,
    messages: Mutex<Vec<String>>,
    finished: Mutex<bool>,
}

impl ViewerUi for RecordingUi {
    fn set_toggle_label(&self, label: &str) {
        self.labels.lock().unwrap().push(label.to_string());
    }

    fn set_fps_text(&self, text: &str) {
        self.fps.lock().unwrap().push(text.to_string());
    }

    fn show_message(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }

    fn finish(&self) {
        *self.finished.lock().unwrap() = true;
    }
}

/// A gate the test flips by hand, answering requests later.
#[derive(Clone)]
struct ManualGate(Arc<Mutex<PermissionStatus>>);

impl PermissionGate for ManualGate {
    fn check(&self) -> PermissionStatus {
        *self.0.lock().unwrap()
    }

    fn request(&mut self, _request_code: i32) -> PermissionRequest {
        PermissionRequest::Pending
    }
}

struct Harness {
    viewer: EdgeViewer,
    ui: Arc<RecordingUi>,
    surface: Arc<NullSurface>,
}

fn harness(failure: SyntheticFailure, gate: Box<dyn PermissionGate>) -> Harness {
    let camera = CameraConfig::new(64, 48, 60.0).with_device("synthetic0");
    let driver = SyntheticCameraDriver::new(camera.clone()).with_failure(failure);
    let ui = Arc::new(RecordingUi::default());
    let surface = Arc::new(NullSurface::default());
    let viewer = EdgeViewer::new(
        ViewerConfig::new(camera),
        Box::new(driver),
        gate,
        surface.clone(),
        ui.clone(),
    );
    Harness { viewer, ui, surface }
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    cond()
}

fn synthetic_state(viewer: &EdgeViewer) -> (bool, bool) {
    viewer.session().with_driver(|d| {
        let d = d
            .as_any()
            .downcast_ref::<SyntheticCameraDriver>()
            .expect("synthetic driver");
        (d.is_device_open(), d.is_streaming())
    })
}

#[test]
fn frames_flow_until_pause() {
    let Harness {
        mut viewer,
        surface,
        ..
    } = harness(SyntheticFailure::None, Box::new(StaticPermissionGate::granted()));

    viewer.create();
    viewer.on_surface_available(64, 48);
    viewer.resume().unwrap();

    assert!(wait_until(Duration::from_secs(5), || surface.frames() >= 3));
    assert_eq!(viewer.session().phase(), SessionPhase::Streaming);
    assert_eq!(viewer.session().camera_id().as_deref(), Some("synthetic0"));
    assert_eq!(synthetic_state(&viewer), (true, true));

    viewer.pause().unwrap();
    assert_eq!(viewer.session().phase(), SessionPhase::Closed);
    assert!(!viewer.is_background_running());
    assert_eq!(synthetic_state(&viewer), (false, false));

    let after_pause = surface.frames();
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(surface.frames(), after_pause);
}

#[test]
fn only_one_session_is_opened() {
    let Harness { mut viewer, .. } =
        harness(SyntheticFailure::None, Box::new(StaticPermissionGate::granted()));

    viewer.create();
    viewer.on_surface_available(64, 48);
    viewer.resume().unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        viewer.session().phase() == SessionPhase::Streaming
    }));

    viewer.on_surface_available(64, 48);
    viewer.resume().unwrap();
    assert_eq!(viewer.session().phase(), SessionPhase::Streaming);

    let opened = viewer
        .events()
        .try_iter()
        .filter(|e| matches!(e, CameraEvent::Opened { .. }))
        .count();
    assert_eq!(opened, 1);
    viewer.pause().unwrap();
}

#[test]
fn resume_after_pause_streams_again() {
    let Harness {
        mut viewer,
        surface,
        ..
    } = harness(SyntheticFailure::None, Box::new(StaticPermissionGate::granted()));

    viewer.create();
    viewer.on_surface_available(64, 48);
    viewer.resume().unwrap();
    assert!(wait_until(Duration::from_secs(5), || surface.frames() >= 1));
    viewer.pause().unwrap();

    let before = surface.frames();
    viewer.resume().unwrap();
    assert!(viewer.is_background_running());
    assert!(wait_until(Duration::from_secs(5), || surface.frames() > before));
    viewer.pause().unwrap();
}

#[test]
fn fps_readout_is_published_once_per_second() {
    let Harness {
        mut viewer, ui, ..
    } = harness(SyntheticFailure::None, Box::new(StaticPermissionGate::granted()));

    viewer.create();
    viewer.on_surface_available(64, 48);
    viewer.resume().unwrap();

    assert!(wait_until(Duration::from_secs(5), || !ui.fps.lock().unwrap().is_empty()));
    viewer.pause().unwrap();

    let fps = ui.fps.lock().unwrap();
    assert!(fps.len() <= 5, "published too often: {fps:?}");
    let first = fps[0].strip_prefix("FPS: ").expect("FPS prefix");
    let n: u32 = first.parse().unwrap();
    assert!(n > 0);
}

#[test]
fn denied_permission_shows_message_and_finishes() {
    let Harness {
        mut viewer, ui, ..
    } = harness(SyntheticFailure::None, Box::new(StaticPermissionGate::denied()));

    viewer.create();
    assert!(viewer.is_finished());
    assert!(*ui.finished.lock().unwrap());
    assert_eq!(
        ui.messages.lock().unwrap().as_slice(),
        &[CAMERA_PERMISSION_REQUIRED.to_string()]
    );

    viewer.on_surface_available(64, 48);
    assert!(matches!(viewer.resume(), Err(CameraError::Closed)));
    assert_eq!(viewer.session().phase(), SessionPhase::Closed);
}

#[test]
fn deferred_grant_opens_the_camera() {
    let status = Arc::new(Mutex::new(PermissionStatus::Denied));
    let Harness {
        mut viewer,
        surface,
        ..
    } = harness(SyntheticFailure::None, Box::new(ManualGate(Arc::clone(&status))));

    viewer.create();
    viewer.on_surface_available(64, 48);
    viewer.resume().unwrap();
    assert!(!viewer.is_finished());
    assert_eq!(viewer.session().phase(), SessionPhase::Closed);

    // Results for other request codes are ignored.
    viewer.on_permission_result(CAMERA_PERMISSION_REQUEST_CODE + 1, &[PermissionStatus::Denied]);
    assert!(!viewer.is_finished());

    *status.lock().unwrap() = PermissionStatus::Granted;
    viewer.on_permission_result(CAMERA_PERMISSION_REQUEST_CODE, &[PermissionStatus::Granted]);
    assert!(wait_until(Duration::from_secs(5), || surface.frames() >= 1));
    viewer.pause().unwrap();
}

#[test]
fn empty_grant_results_count_as_denied() {
    let status = Arc::new(Mutex::new(PermissionStatus::Denied));
    let Harness {
        mut viewer, ui, ..
    } = harness(SyntheticFailure::None, Box::new(ManualGate(status)));

    viewer.create();
    viewer.on_permission_result(CAMERA_PERMISSION_REQUEST_CODE, &[]);
    assert!(viewer.is_finished());
    assert_eq!(ui.messages.lock().unwrap().len(), 1);
}

#[test]
fn toggle_updates_label_and_flag() {
    let Harness {
        mut viewer, ui, ..
    } = harness(SyntheticFailure::None, Box::new(StaticPermissionGate::granted()));

    viewer.create();
    assert!(viewer.is_processing_enabled());
    assert!(!viewer.toggle_processing());
    assert!(!viewer.is_processing_enabled());
    assert!(viewer.toggle_processing());

    assert_eq!(
        ui.labels.lock().unwrap().as_slice(),
        &[LABEL_SHOW_RAW, LABEL_SHOW_PROCESSED, LABEL_SHOW_RAW]
    );
}

#[test]
fn failed_configuration_leaves_the_device_open() {
    let Harness { mut viewer, .. } = harness(
        SyntheticFailure::ConfigureFailed,
        Box::new(StaticPermissionGate::granted()),
    );

    viewer.create();
    viewer.on_surface_available(64, 48);
    viewer.resume().unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        viewer.session().phase() == SessionPhase::Opened
    }));
    assert_eq!(synthetic_state(&viewer), (true, false));

    viewer.pause().unwrap();
    assert_eq!(synthetic_state(&viewer), (false, false));
}

#[test]
fn device_errors_close_the_camera() {
    let Harness { mut viewer, .. } = harness(
        SyntheticFailure::DeviceError(4),
        Box::new(StaticPermissionGate::granted()),
    );

    viewer.create();
    viewer.on_surface_available(64, 48);
    viewer.resume().unwrap();

    let mut saw_error = false;
    assert!(wait_until(Duration::from_secs(5), || {
        saw_error |= viewer
            .events()
            .try_iter()
            .any(|e| matches!(e, CameraEvent::Error { .. }));
        saw_error && viewer.session().phase() == SessionPhase::Closed
    }));
    viewer.pause().unwrap();
}

#[test]
fn disconnects_close_the_camera() {
    let Harness { mut viewer, .. } = harness(
        SyntheticFailure::Disconnect,
        Box::new(StaticPermissionGate::granted()),
    );

    viewer.create();
    viewer.on_surface_available(64, 48);
    viewer.resume().unwrap();

    let mut saw_closed = false;
    assert!(wait_until(Duration::from_secs(5), || {
        saw_closed |= viewer
            .events()
            .try_iter()
            .any(|e| matches!(e, CameraEvent::Closed { .. }));
        saw_closed
    }));
    assert_eq!(viewer.session().phase(), SessionPhase::Closed);
    assert_eq!(synthetic_state(&viewer), (false, false));
    viewer.pause().unwrap();
}

#[test]
fn rejected_open_is_logged_not_fatal() {
    let Harness { mut viewer, .. } = harness(
        SyntheticFailure::OpenRejected,
        Box::new(StaticPermissionGate::granted()),
    );

    viewer.create();
    viewer.on_surface_available(64, 48);
    viewer.resume().unwrap();
    assert_eq!(viewer.session().phase(), SessionPhase::Closed);
    assert!(!viewer.is_finished());
    viewer.pause().unwrap();
}

/// Records surface lifecycle calls and keeps itself alive on destroy.
#[derive(Default)]
struct RecordingSurface {
    sizes: Mutex<Vec<(u32, u32)>>,
    frames: Mutex<Vec<(u32, u32)>>,
}

impl PreviewSurface for RecordingSurface {
    fn on_available(&self, width: u32, height: u32) {
        self.sizes.lock().unwrap().push((width, height));
    }

    fn on_size_changed(&self, width: u32, height: u32) {
        self.sizes.lock().unwrap().push((width, height));
    }

    fn on_destroyed(&self) -> bool {
        false
    }

    fn on_updated(&self, frame: &DisplayFrame) -> Result<(), CameraError> {
        self.frames.lock().unwrap().push((frame.width, frame.height));
        Ok(())
    }
}

#[test]
fn surface_events_reach_the_preview_surface() {
    let camera = CameraConfig::new(64, 48, 60.0);
    let driver = SyntheticCameraDriver::new(camera.clone());
    let surface = Arc::new(RecordingSurface::default());
    let mut viewer = EdgeViewer::new(
        ViewerConfig::new(camera),
        Box::new(driver),
        Box::new(StaticPermissionGate::granted()),
        surface.clone(),
        Arc::new(RecordingUi::default()),
    );

    viewer.create();
    viewer.on_surface_available(640, 480);
    viewer.on_surface_size_changed(320, 240);
    viewer.resume().unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        !surface.frames.lock().unwrap().is_empty()
    }));

    assert!(!viewer.on_surface_destroyed());
    viewer.pause().unwrap();

    assert_eq!(surface.sizes.lock().unwrap().as_slice(), &[(640, 480), (320, 240)]);
    assert_eq!(surface.frames.lock().unwrap()[0], (64, 48));
}

#[test]
fn named_synthetic_camera_streams() {
    let mut camera = CameraConfig::new(64, 48, 60.0).with_device("synthetic:front");
    let driver = open(&mut camera).unwrap();
    let surface = Arc::new(NullSurface::default());
    let mut viewer = EdgeViewer::new(
        ViewerConfig::new(camera),
        driver,
        Box::new(StaticPermissionGate::granted()),
        surface.clone(),
        Arc::new(RecordingUi::default()),
    );

    viewer.create();
    viewer.on_surface_available(64, 48);
    viewer.resume().unwrap();
    assert!(wait_until(Duration::from_secs(5), || surface.frames() >= 1));
    assert_eq!(viewer.session().camera_id().as_deref(), Some("front"));
    viewer.pause().unwrap();
}
