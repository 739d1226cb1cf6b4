// This is free and unencumbered software released into the public domain.

use crate::shared::{CameraError, Handler, PixelFormat};
use std::{any::Any, sync::Arc};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraBackend {
    Android,
    Ffmpeg,
    Synthetic,
}

#[derive(Debug)]
pub enum CameraEvent {
    Opened {
        backend: CameraBackend,
        camera_id: String,
    },
    Streaming {
        backend: CameraBackend,
    },
    Closed {
        backend: CameraBackend,
    },
    FrameDropped {
        backend: CameraBackend,
    },
    Warning {
        backend: CameraBackend,
        message: String,
    },
    Error {
        backend: CameraBackend,
        error: CameraError,
    },
}

/// Device lifecycle notifications, mirroring the platform's state callbacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceState {
    Opened,
    Disconnected,
    Error(i32),
}

/// Capture session configuration outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Configured,
    ConfigureFailed,
}

pub type DeviceCallback = Arc<dyn Fn(DeviceState) + Send + Sync + 'static>;
pub type SessionCallback = Arc<dyn Fn(SessionState) + Send + Sync + 'static>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestTemplate {
    Preview,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AutoFocusMode {
    Off,
    ContinuousPicture,
}

/// The surface a capture session streams into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputTarget {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
}

impl OutputTarget {
    pub fn preview(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixel_format: PixelFormat::I420,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureRequest {
    pub template: RequestTemplate,
    pub targets: Vec<OutputTarget>,
    pub af_mode: AutoFocusMode,
}

impl CaptureRequest {
    pub fn new(template: RequestTemplate) -> Self {
        Self {
            template,
            targets: Vec::new(),
            af_mode: AutoFocusMode::Off,
        }
    }

    pub fn add_target(&mut self, target: OutputTarget) {
        self.targets.push(target);
    }

    pub fn set_af_mode(&mut self, mode: AutoFocusMode) {
        self.af_mode = mode;
    }
}

/// A platform camera API: device open/close, session configuration and a
/// repeating request.
///
/// Asynchronous outcomes are reported through the callbacks, which may fire
/// on any thread. Frames are posted to the given [`Handler`].
pub trait CameraDriver: Send {
    fn backend(&self) -> CameraBackend;

    fn camera_ids(&self) -> Result<Vec<String>, CameraError>;

    fn open_device(&mut self, camera_id: &str, on_state: DeviceCallback)
    -> Result<(), CameraError>;

    fn create_session(
        &mut self,
        outputs: &[OutputTarget],
        on_state: SessionCallback,
    ) -> Result<(), CameraError>;

    fn set_repeating_request(
        &mut self,
        request: &CaptureRequest,
        handler: &Handler,
    ) -> Result<(), CameraError>;

    fn close_session(&mut self) -> Result<(), CameraError> {
        Ok(())
    }

    fn close_device(&mut self) -> Result<(), CameraError> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Picks the explicitly configured device, falling back to the first camera
/// the backend reports.
pub fn select_camera_id(
    driver: &dyn CameraDriver,
    configured: Option<&str>,
) -> Result<String, CameraError> {
    if let Some(id) = configured.map(str::trim).filter(|s| !s.is_empty()) {
        return Ok(id.to_string());
    }
    driver
        .camera_ids()?
        .into_iter()
        .next()
        .ok_or(CameraError::NoCamera)
}
