// This is free and unencumbered software released into the public domain.

//! Android backend on the NDK camera2 API, streaming `YUV_420_888` images
//! through an `AImageReader`.

use super::android::{
    CameraCaptureSession, CameraDevice, CameraManager, CameraOutputTarget,
    CaptureRequest as NdkCaptureRequest, CaptureSessionOutput, CaptureSessionOutputContainer,
    ImageReader, NativeWindow,
};
use crate::shared::{
    CameraBackend, CameraConfig, CameraDriver, CameraError, CaptureRequest, DeviceCallback,
    DeviceState, Handler, OutputTarget, PixelFormat, SessionCallback, SessionState,
};
use alloc::borrow::Cow;
use ndk_sys::android_get_device_api_level;
use std::any::Any;

/// Session-scoped NDK objects, dropped in field order: the session first,
/// the reader that backs its window last.
#[allow(dead_code)]
struct Preview {
    session: Option<CameraCaptureSession>,
    request: Option<NdkCaptureRequest>,
    target: CameraOutputTarget,
    container: CaptureSessionOutputContainer,
    output: CaptureSessionOutput,
    window: NativeWindow,
    reader: ImageReader,
}

pub struct Camera2CameraDriver {
    config: CameraConfig,
    // Declared before `manager` so they drop first.
    preview: Option<Preview>,
    device: Option<CameraDevice>,
    manager: CameraManager,
}

// The NDK camera objects are thread-safe; access is serialized by the
// session manager's lock.
unsafe impl Send for Camera2CameraDriver {}

impl core::fmt::Debug for Camera2CameraDriver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Camera2CameraDriver")
            .field("config", &self.config)
            .field("device_open", &self.device.is_some())
            .field("session_open", &self.preview.is_some())
            .finish()
    }
}

impl dogma::Named for Camera2CameraDriver {
    fn name(&self) -> Cow<'_, str> {
        "camera2".into()
    }
}

impl Camera2CameraDriver {
    pub fn new(config: CameraConfig) -> Result<Self, CameraError> {
        let api_level = unsafe { android_get_device_api_level() };
        tracing::debug!(target: "edge_viewer", api_level, "camera2 driver created");
        Ok(Self {
            config,
            preview: None,
            device: None,
            manager: CameraManager::new(),
        })
    }

    fn open_preview(
        &self,
        device: &CameraDevice,
        target: &OutputTarget,
    ) -> Result<Preview, CameraError> {
        let reader = ImageReader::new(target.width, target.height)?;
        let window = NativeWindow::from_image_reader(&reader)?;
        let output = CaptureSessionOutput::new(&window)?;
        let mut container = CaptureSessionOutputContainer::new()?;
        container.add(&output)?;
        let target = CameraOutputTarget::new(&window)?;
        let session = CameraCaptureSession::open(device, &container)?;
        Ok(Preview {
            session: Some(session),
            request: None,
            target,
            container,
            output,
            window,
            reader,
        })
    }
}

impl CameraDriver for Camera2CameraDriver {
    fn backend(&self) -> CameraBackend {
        CameraBackend::Android
    }

    fn camera_ids(&self) -> Result<Vec<String>, CameraError> {
        Ok(self.manager.camera_ids()?)
    }

    /// `ACameraManager_openCamera` completes synchronously; later
    /// disconnects and errors arrive through the device callbacks.
    fn open_device(
        &mut self,
        camera_id: &str,
        on_state: DeviceCallback,
    ) -> Result<(), CameraError> {
        if self.device.is_some() {
            return Ok(());
        }
        let device = self.manager.open_camera(camera_id, on_state)?;
        device.notify(DeviceState::Opened);
        self.device = Some(device);
        Ok(())
    }

    fn create_session(
        &mut self,
        outputs: &[OutputTarget],
        on_state: SessionCallback,
    ) -> Result<(), CameraError> {
        let device = self.device.as_ref().ok_or(CameraError::NotConfigured)?;
        let [target] = outputs else {
            on_state(SessionState::ConfigureFailed);
            return Ok(());
        };
        if target.pixel_format != PixelFormat::I420 {
            on_state(SessionState::ConfigureFailed);
            return Ok(());
        }
        match self.open_preview(device, target) {
            Ok(preview) => {
                self.preview = Some(preview);
                on_state(SessionState::Configured);
            },
            Err(err) => {
                tracing::error!(
                    target: "edge_viewer",
                    %err,
                    "camera2 session configuration failed"
                );
                on_state(SessionState::ConfigureFailed);
            },
        }
        Ok(())
    }

    fn set_repeating_request(
        &mut self,
        request: &CaptureRequest,
        handler: &Handler,
    ) -> Result<(), CameraError> {
        let device = self.device.as_ref().ok_or(CameraError::NotConfigured)?;
        let preview = self.preview.as_mut().ok_or(CameraError::NotConfigured)?;

        preview.reader.set_listener(handler.clone())?;

        let mut ndk_request = NdkCaptureRequest::new(device, request.template)?;
        ndk_request.add_target(&preview.target)?;
        ndk_request.set_af_mode(request.af_mode)?;

        let session = preview.session.as_mut().ok_or(CameraError::NotConfigured)?;
        session.set_repeating_request(&ndk_request)?;
        preview.request = Some(ndk_request);
        Ok(())
    }

    fn close_session(&mut self) -> Result<(), CameraError> {
        let Some(mut preview) = self.preview.take() else {
            return Ok(());
        };
        if let Some(session) = preview.session.as_mut() {
            if preview.request.is_some() {
                if let Err(err) = session.stop_repeating() {
                    tracing::debug!(target: "edge_viewer", %err, "stop repeating failed");
                }
            }
            session.close();
        }
        Ok(())
    }

    fn close_device(&mut self) -> Result<(), CameraError> {
        self.close_session()?;
        self.device = None;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Drop for Camera2CameraDriver {
    fn drop(&mut self) {
        let _ = self.close_device();
    }
}
