// This is free and unencumbered software released into the public domain.

//! Camera session manager: device open, preview session, repeating request.
//!
//! Every driver callback is re-posted onto the background [`Handler`], so the
//! state machine below only ever advances on the camera thread (or on the
//! caller's thread for `open`/`close`), always under the same lock. Each
//! open bumps a generation counter; callbacks carry the generation they
//! were issued under and are ignored once it is stale.

use crate::shared::{
    AutoFocusMode, CameraBackend, CameraDriver, CameraError, CameraEvent, CaptureRequest,
    DeviceState, Handler, OutputTarget, RequestTemplate, SessionState,
};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Closed,
    /// `open_device` issued, waiting for the device callback.
    Opening,
    /// Device open, no capture session.
    Opened,
    /// `create_session` issued, waiting for the session callback.
    Configuring,
    /// Repeating preview request active.
    Streaming,
}

struct Inner {
    driver: Box<dyn CameraDriver>,
    phase: SessionPhase,
    camera_id: Option<String>,
    preview: OutputTarget,
    handler: Option<Handler>,
    generation: u64,
}

pub struct SessionManager {
    inner: Arc<Mutex<Inner>>,
    backend: CameraBackend,
}

impl core::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionManager")
            .field("backend", &self.backend)
            .field("phase", &self.phase())
            .finish()
    }
}

impl SessionManager {
    pub fn new(driver: Box<dyn CameraDriver>, preview: OutputTarget) -> Self {
        let backend = driver.backend();
        Self {
            inner: Arc::new(Mutex::new(Inner {
                driver,
                phase: SessionPhase::Closed,
                camera_id: None,
                preview,
                handler: None,
                generation: 0,
            })),
            backend,
        }
    }

    pub fn backend(&self) -> CameraBackend {
        self.backend
    }

    pub fn phase(&self) -> SessionPhase {
        lock(&self.inner).phase
    }

    pub fn camera_id(&self) -> Option<String> {
        lock(&self.inner).camera_id.clone()
    }

    pub fn camera_ids(&self) -> Result<Vec<String>, CameraError> {
        lock(&self.inner).driver.camera_ids()
    }

    pub fn with_driver<R>(&self, f: impl FnOnce(&dyn CameraDriver) -> R) -> R {
        f(lock(&self.inner).driver.as_ref())
    }

    /// Opens `camera_id` and, once the device reports in, configures the
    /// preview session. A second call while a device is open does nothing.
    pub fn open(&self, camera_id: &str, handler: Handler) -> Result<(), CameraError> {
        let mut inner = lock(&self.inner);
        if inner.phase != SessionPhase::Closed {
            tracing::debug!(target: "edge_viewer", phase = ?inner.phase, "camera already open");
            return Ok(());
        }

        inner.generation += 1;
        let generation = inner.generation;
        let weak = Arc::downgrade(&self.inner);
        let callback_handler = handler.clone();
        let on_state = Arc::new(move |state: DeviceState| {
            let weak = Weak::clone(&weak);
            let posted = callback_handler.post(move || {
                if let Some(inner) = weak.upgrade() {
                    on_device_state(&inner, generation, state);
                }
            });
            if posted.is_err() {
                tracing::debug!(
                    target: "edge_viewer",
                    ?state,
                    "device callback after camera thread stopped"
                );
            }
        });

        inner.phase = SessionPhase::Opening;
        inner.camera_id = Some(camera_id.to_string());
        inner.handler = Some(handler);

        tracing::info!(target: "edge_viewer", camera_id, backend = ?self.backend, "opening camera");
        if let Err(err) = inner.driver.open_device(camera_id, on_state) {
            inner.phase = SessionPhase::Closed;
            inner.camera_id = None;
            inner.handler = None;
            return Err(err);
        }
        Ok(())
    }

    /// Closes the capture session, then the device. Safe to call repeatedly.
    pub fn close(&self) {
        let mut inner = lock(&self.inner);
        close_locked(&mut inner);
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.close();
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|p| p.into_inner())
}

fn close_locked(inner: &mut Inner) {
    if inner.phase == SessionPhase::Closed {
        return;
    }
    let backend = inner.driver.backend();
    if matches!(
        inner.phase,
        SessionPhase::Configuring | SessionPhase::Streaming
    ) {
        if let Err(err) = inner.driver.close_session() {
            tracing::warn!(target: "edge_viewer", %err, "failed to close capture session");
        }
    }
    if let Err(err) = inner.driver.close_device() {
        tracing::warn!(target: "edge_viewer", %err, "failed to close camera device");
    }
    inner.phase = SessionPhase::Closed;
    inner.camera_id = None;
    inner.generation += 1;
    if let Some(handler) = inner.handler.take() {
        handler.report(CameraEvent::Closed { backend });
    }
    tracing::info!(target: "edge_viewer", ?backend, "camera closed");
}

fn on_device_state(shared: &Arc<Mutex<Inner>>, generation: u64, state: DeviceState) {
    let mut inner = lock(shared);
    if inner.generation != generation {
        // Issued for a device that has since been closed.
        tracing::debug!(target: "edge_viewer", ?state, "ignoring stale device callback");
        return;
    }
    let backend = inner.driver.backend();
    match state {
        DeviceState::Opened => {
            if inner.phase != SessionPhase::Opening {
                return;
            }
            inner.phase = SessionPhase::Opened;
            if let (Some(handler), Some(camera_id)) = (&inner.handler, &inner.camera_id) {
                handler.report(CameraEvent::Opened {
                    backend,
                    camera_id: camera_id.clone(),
                });
            }
            create_preview_session(shared, &mut inner);
        },
        DeviceState::Disconnected => {
            tracing::warn!(target: "edge_viewer", ?backend, "camera disconnected");
            close_locked(&mut inner);
        },
        DeviceState::Error(code) => {
            tracing::error!(target: "edge_viewer", ?backend, code, "camera error");
            if let Some(handler) = &inner.handler {
                handler.report(CameraEvent::Error {
                    backend,
                    error: CameraError::other(format!("camera error: {code}")),
                });
            }
            close_locked(&mut inner);
        },
    }
}

fn create_preview_session(shared: &Arc<Mutex<Inner>>, inner: &mut Inner) {
    let Some(handler) = inner.handler.clone() else {
        return;
    };

    let generation = inner.generation;
    let weak = Arc::downgrade(shared);
    let on_state = Arc::new(move |state: SessionState| {
        let weak = Weak::clone(&weak);
        let posted = handler.post(move || {
            if let Some(inner) = weak.upgrade() {
                on_session_state(&inner, generation, state);
            }
        });
        if posted.is_err() {
            tracing::debug!(
                target: "edge_viewer",
                ?state,
                "session callback after camera thread stopped"
            );
        }
    });

    inner.phase = SessionPhase::Configuring;
    let outputs = [inner.preview];
    if let Err(err) = inner.driver.create_session(&outputs, on_state) {
        tracing::error!(target: "edge_viewer", %err, "error creating camera preview session");
        inner.phase = SessionPhase::Opened;
    }
}

fn on_session_state(shared: &Arc<Mutex<Inner>>, generation: u64, state: SessionState) {
    let mut inner = lock(shared);
    if inner.generation != generation || inner.phase != SessionPhase::Configuring {
        // The device went away while the session was being configured.
        return;
    }
    match state {
        SessionState::Configured => {
            let Some(handler) = inner.handler.clone() else {
                return;
            };
            let mut request = CaptureRequest::new(RequestTemplate::Preview);
            request.add_target(inner.preview);
            request.set_af_mode(AutoFocusMode::ContinuousPicture);

            match inner.driver.set_repeating_request(&request, &handler) {
                Ok(()) => {
                    inner.phase = SessionPhase::Streaming;
                    handler.report(CameraEvent::Streaming {
                        backend: inner.driver.backend(),
                    });
                },
                Err(err) => {
                    tracing::error!(
                        target: "edge_viewer",
                        %err,
                        "error starting the repeating preview request"
                    );
                    inner.phase = SessionPhase::Opened;
                },
            }
        },
        SessionState::ConfigureFailed => {
            tracing::error!(target: "edge_viewer", "failed to configure camera preview session");
            inner.phase = SessionPhase::Opened;
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::{
        BackgroundExecutor, CAMERA_THREAD_NAME, CameraConfig, PixelFormat,
        drivers::synthetic::{SYNTHETIC_CAMERA_ID, SyntheticCameraDriver},
    };
    use std::{
        sync::mpsc::{Sender, channel, sync_channel},
        time::{Duration, Instant},
    };

    fn session() -> SessionManager {
        let driver = SyntheticCameraDriver::new(CameraConfig::new(64, 48, 60.0));
        let preview = OutputTarget {
            width: 64,
            height: 48,
            pixel_format: PixelFormat::I420,
        };
        SessionManager::new(Box::new(driver), preview)
    }

    fn executor() -> BackgroundExecutor {
        let (events_tx, _events_rx) = sync_channel(16);
        let mut exec = BackgroundExecutor::new(CAMERA_THREAD_NAME, 2, events_tx);
        exec.start().unwrap();
        exec
    }

    /// Blocks the camera thread until the returned sender fires.
    fn park(handler: &Handler) -> Sender<()> {
        let (release_tx, release_rx) = channel::<()>();
        handler
            .post(move || {
                let _ = release_rx.recv();
            })
            .unwrap();
        release_tx
    }

    /// Waits until everything queued so far has run on the camera thread.
    fn drain(handler: &Handler) {
        let (done_tx, done_rx) = channel::<()>();
        handler
            .post(move || {
                let _ = done_tx.send(());
            })
            .unwrap();
        done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }

    fn wait_for_phase(session: &SessionManager, phase: SessionPhase) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if session.phase() == phase {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn synthetic<R>(session: &SessionManager, f: impl FnOnce(&SyntheticCameraDriver) -> R) -> R {
        session.with_driver(|d| f(d.as_any().downcast_ref().unwrap()))
    }

    #[test]
    fn callbacks_from_a_closed_device_do_not_touch_the_reopened_one() {
        let mut exec = executor();
        let handler = exec.handler().unwrap();
        let session = session();

        let release = park(&handler);
        session.open(SYNTHETIC_CAMERA_ID, handler.clone()).unwrap();
        session.close();
        session.open(SYNTHETIC_CAMERA_ID, handler.clone()).unwrap();
        release.send(()).unwrap();

        assert!(wait_for_phase(&session, SessionPhase::Streaming));
        drain(&handler);
        assert_eq!(session.phase(), SessionPhase::Streaming);
        assert!(synthetic(&session, |d| d.is_device_open() && d.is_streaming()));

        session.close();
        exec.stop().unwrap();
    }

    #[test]
    fn configured_after_close_is_ignored() {
        let mut exec = executor();
        let handler = exec.handler().unwrap();
        let session = session();

        session.open(SYNTHETIC_CAMERA_ID, handler.clone()).unwrap();
        // The device callback runs first and queues `Configured` behind this.
        let release = park(&handler);
        assert!(wait_for_phase(&session, SessionPhase::Configuring));

        session.close();
        release.send(()).unwrap();
        drain(&handler);

        assert_eq!(session.phase(), SessionPhase::Closed);
        assert!(synthetic(&session, |d| !d.is_streaming() && !d.is_session_open()));
        assert_eq!(synthetic(&session, |d| d.frames_produced()), 0);

        exec.stop().unwrap();
    }

    #[test]
    fn close_is_idempotent() {
        let session = session();
        session.close();
        session.close();
        assert_eq!(session.phase(), SessionPhase::Closed);
        assert_eq!(session.camera_id(), None);
    }
}
