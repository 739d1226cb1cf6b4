// This is free and unencumbered software released into the public domain.

use super::{
    CameraDevice, CameraResult, CameraStatus, CaptureRequest, CaptureSessionOutputContainer,
};
use alloc::boxed::Box;
use core::{ffi::c_void, ptr::null_mut};
use ndk_sys::{
    ACameraCaptureSession, ACameraCaptureSession_close, ACameraCaptureSession_setRepeatingRequest,
    ACameraCaptureSession_stateCallbacks, ACameraCaptureSession_stopRepeating,
    ACameraDevice_createCaptureSession,
};

#[derive(Debug)]
pub struct CameraCaptureSession {
    handle: *mut ACameraCaptureSession,
    // Boxed: the NDK keeps this pointer until the session reports closed.
    state_callbacks: Box<ACameraCaptureSession_stateCallbacks>,
}

impl Drop for CameraCaptureSession {
    fn drop(&mut self) {
        self.close()
    }
}

impl CameraCaptureSession {
    pub fn open(
        device: &CameraDevice,
        outputs: &CaptureSessionOutputContainer,
    ) -> CameraResult<Self> {
        let mut session = Self {
            handle: null_mut(),
            state_callbacks: Box::new(ACameraCaptureSession_stateCallbacks {
                context: null_mut(),
                onClosed: Some(on_closed),
                onReady: Some(on_ready),
                onActive: Some(on_active),
            }),
        };
        CameraStatus::check(unsafe {
            ACameraDevice_createCaptureSession(
                device.handle,
                outputs.handle,
                session.state_callbacks.as_ref(),
                &mut session.handle,
            )
        })?;
        Ok(session)
    }

    /// See: <https://developer.android.com/ndk/reference/group/camera>
    pub fn set_repeating_request(&mut self, request: &CaptureRequest) -> CameraResult {
        let mut requests = request.handle;
        CameraStatus::check(unsafe {
            ACameraCaptureSession_setRepeatingRequest(
                self.handle,
                null_mut(),
                1,
                &mut requests,
                null_mut(),
            )
        })
    }

    pub fn stop_repeating(&mut self) -> CameraResult {
        CameraStatus::check(unsafe { ACameraCaptureSession_stopRepeating(self.handle) })
    }

    pub fn close(&mut self) {
        if !self.handle.is_null() {
            unsafe { ACameraCaptureSession_close(self.handle) };
            self.handle = null_mut();
        }
    }
}

unsafe extern "C" fn on_ready(_context: *mut c_void, session: *mut ACameraCaptureSession) {
    tracing::trace!(target: "edge_viewer", ?session, "capture session ready");
}

unsafe extern "C" fn on_active(_context: *mut c_void, session: *mut ACameraCaptureSession) {
    tracing::trace!(target: "edge_viewer", ?session, "capture session active");
}

unsafe extern "C" fn on_closed(_context: *mut c_void, session: *mut ACameraCaptureSession) {
    tracing::debug!(target: "edge_viewer", ?session, "capture session closed");
}
