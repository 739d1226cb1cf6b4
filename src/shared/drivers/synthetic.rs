// This is free and unencumbered software released into the public domain.

//! Deterministic test-pattern camera: a bright square sweeping across a dark
//! background, produced as I420 at the configured frame rate.

use crate::shared::{
    CameraBackend, CameraConfig, CameraDriver, CameraError, CaptureRequest, DeviceCallback,
    DeviceState, Frame, Handler, OutputTarget, PixelFormat, SessionCallback, SessionState,
};
use alloc::borrow::Cow;
use bytes::Bytes;
use std::{
    any::Any,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

pub const SYNTHETIC_CAMERA_ID: &str = "synthetic0";

/// Failure to inject, for exercising the session manager's error paths.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyntheticFailure {
    #[default]
    None,
    OpenRejected,
    DeviceError(i32),
    Disconnect,
    ConfigureFailed,
}

pub struct SyntheticCameraDriver {
    config: CameraConfig,
    failure: SyntheticFailure,
    device_open: bool,
    session_open: bool,
    stop: Arc<AtomicBool>,
    producer: Option<JoinHandle<()>>,
    frames_produced: Arc<AtomicU64>,
}

impl core::fmt::Debug for SyntheticCameraDriver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SyntheticCameraDriver")
            .field("config", &self.config)
            .field("failure", &self.failure)
            .field("device_open", &self.device_open)
            .field("session_open", &self.session_open)
            .finish()
    }
}

impl dogma::Named for SyntheticCameraDriver {
    fn name(&self) -> Cow<'_, str> {
        "synthetic".into()
    }
}

impl SyntheticCameraDriver {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            failure: SyntheticFailure::None,
            device_open: false,
            session_open: false,
            stop: Arc::new(AtomicBool::new(false)),
            producer: None,
            frames_produced: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_failure(mut self, failure: SyntheticFailure) -> Self {
        self.failure = failure;
        self
    }

    pub fn is_device_open(&self) -> bool {
        self.device_open
    }

    pub fn is_session_open(&self) -> bool {
        self.session_open
    }

    pub fn is_streaming(&self) -> bool {
        self.producer.is_some()
    }

    /// The one camera this driver exposes: the configured device ID, or
    /// [`SYNTHETIC_CAMERA_ID`] when none was given.
    pub fn camera_id(&self) -> &str {
        self.config.device.as_deref().unwrap_or(SYNTHETIC_CAMERA_ID)
    }

    pub fn frames_produced(&self) -> u64 {
        self.frames_produced.load(Ordering::Relaxed)
    }

    fn stop_producer(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(j) = self.producer.take() {
            let _ = j.join();
        }
    }
}

impl CameraDriver for SyntheticCameraDriver {
    fn backend(&self) -> CameraBackend {
        CameraBackend::Synthetic
    }

    fn camera_ids(&self) -> Result<Vec<String>, CameraError> {
        Ok(vec![self.camera_id().to_string()])
    }

    fn open_device(
        &mut self,
        camera_id: &str,
        on_state: DeviceCallback,
    ) -> Result<(), CameraError> {
        if camera_id != self.camera_id() {
            return Err(CameraError::NoCamera);
        }
        match self.failure {
            SyntheticFailure::OpenRejected => {
                return Err(CameraError::other("synthetic camera rejected open"));
            },
            SyntheticFailure::DeviceError(code) => {
                on_state(DeviceState::Error(code));
                return Ok(());
            },
            SyntheticFailure::Disconnect => {
                self.device_open = true;
                on_state(DeviceState::Opened);
                on_state(DeviceState::Disconnected);
                return Ok(());
            },
            _ => {},
        }
        self.device_open = true;
        on_state(DeviceState::Opened);
        Ok(())
    }

    fn create_session(
        &mut self,
        outputs: &[OutputTarget],
        on_state: SessionCallback,
    ) -> Result<(), CameraError> {
        if !self.device_open {
            return Err(CameraError::NotConfigured);
        }
        if outputs.len() != 1 || outputs[0].pixel_format != PixelFormat::I420 {
            on_state(SessionState::ConfigureFailed);
            return Ok(());
        }
        if self.failure == SyntheticFailure::ConfigureFailed {
            on_state(SessionState::ConfigureFailed);
            return Ok(());
        }
        self.session_open = true;
        on_state(SessionState::Configured);
        Ok(())
    }

    fn set_repeating_request(
        &mut self,
        request: &CaptureRequest,
        handler: &Handler,
    ) -> Result<(), CameraError> {
        if !self.session_open {
            return Err(CameraError::NotConfigured);
        }
        let target = *request
            .targets
            .first()
            .ok_or_else(|| CameraError::invalid_config("capture request has no target"))?;
        self.stop_producer();
        self.stop.store(false, Ordering::Relaxed);

        let stop = Arc::clone(&self.stop);
        let produced = Arc::clone(&self.frames_produced);
        let handler = handler.clone();
        let interval = Duration::from_secs_f64(1.0 / self.config.fps.max(0.1));

        let join = std::thread::Builder::new()
            .name("synthetic-camera".into())
            .spawn(move || {
                let start = Instant::now();
                let mut index: u64 = 0;
                while !stop.load(Ordering::Relaxed) {
                    let data = render_pattern(target.width, target.height, index);
                    let ts = start.elapsed().as_nanos() as u64;
                    let frame = Frame::new_i420(data, target.width, target.height)
                        .with_timestamp_ns(ts);
                    handler.post_frame(CameraBackend::Synthetic, frame);
                    produced.fetch_add(1, Ordering::Relaxed);
                    index += 1;

                    let next = interval.saturating_mul(index as u32);
                    let elapsed = start.elapsed();
                    if next > elapsed {
                        std::thread::sleep(next - elapsed);
                    }
                }
            })
            .map_err(|e| CameraError::driver("spawning the synthetic camera", e))?;

        self.producer = Some(join);
        Ok(())
    }

    fn close_session(&mut self) -> Result<(), CameraError> {
        self.stop_producer();
        self.session_open = false;
        Ok(())
    }

    fn close_device(&mut self) -> Result<(), CameraError> {
        self.stop_producer();
        self.session_open = false;
        self.device_open = false;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Drop for SyntheticCameraDriver {
    fn drop(&mut self) {
        self.stop_producer();
    }
}

/// One I420 frame of the sweeping-square pattern.
pub fn render_pattern(width: u32, height: u32, index: u64) -> Bytes {
    let (w, h) = (width as usize, height as usize);
    let mut data = vec![128u8; PixelFormat::I420.buffer_len(width, height)];

    let side = (w.min(h) / 4).max(1);
    let travel = w.saturating_sub(side).max(1);
    let x0 = (index as usize * 4) % travel;
    let y0 = (h - side.min(h)) / 2;

    let (luma, _chroma) = data.split_at_mut(w * h);
    for (y, row) in luma.chunks_exact_mut(w).enumerate() {
        let inside_rows = y >= y0 && y < y0 + side;
        for (x, px) in row.iter_mut().enumerate() {
            *px = if inside_rows && x >= x0 && x < x0 + side {
                235
            } else {
                16
            };
        }
    }
    Bytes::from(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_has_the_i420_length() {
        let frame = render_pattern(64, 48, 3);
        assert_eq!(frame.len(), 64 * 48 * 3 / 2);
    }

    #[test]
    fn pattern_moves_between_frames() {
        assert_ne!(render_pattern(64, 48, 0), render_pattern(64, 48, 1));
    }

    #[test]
    fn unknown_camera_ids_are_rejected() {
        let mut driver = SyntheticCameraDriver::new(CameraConfig::new(64, 48, 30.0));
        let on_state: DeviceCallback = Arc::new(|_| {});
        assert!(matches!(
            driver.open_device("nope", on_state),
            Err(CameraError::NoCamera)
        ));
        assert!(!driver.is_device_open());
    }

    #[test]
    fn configured_device_names_the_camera() {
        let config = CameraConfig::new(64, 48, 30.0).with_device("front");
        let mut driver = SyntheticCameraDriver::new(config);
        assert_eq!(driver.camera_ids().unwrap(), vec!["front".to_string()]);

        let on_state: DeviceCallback = Arc::new(|_| {});
        driver.open_device("front", on_state.clone()).unwrap();
        assert!(driver.is_device_open());
        assert!(matches!(
            driver.open_device(SYNTHETIC_CAMERA_ID, on_state),
            Err(CameraError::NoCamera)
        ));
    }
}
