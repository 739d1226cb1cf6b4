// This is free and unencumbered software released into the public domain.

use super::{CameraDevice, CameraOutputTarget, CameraResult, CameraStatus};
use crate::shared::{AutoFocusMode, RequestTemplate};
use core::ptr::null_mut;
use ndk_sys::{
    ACameraDevice_createCaptureRequest, ACameraDevice_request_template, ACaptureRequest,
    ACaptureRequest_addTarget, ACaptureRequest_free, ACaptureRequest_setEntry_u8,
};

/// `ACAMERA_CONTROL_AF_MODE`: `ACAMERA_CONTROL_START + 7`.
const ACAMERA_CONTROL_AF_MODE: u32 = (1 << 16) + 7;
const ACAMERA_CONTROL_AF_MODE_OFF: u8 = 0;
const ACAMERA_CONTROL_AF_MODE_CONTINUOUS_PICTURE: u8 = 4;

#[derive(Debug)]
pub struct CaptureRequest {
    pub(crate) handle: *mut ACaptureRequest,
}

impl Drop for CaptureRequest {
    fn drop(&mut self) {
        unsafe { ACaptureRequest_free(self.handle) };
        self.handle = null_mut();
    }
}

impl CaptureRequest {
    pub fn new(device: &CameraDevice, template: RequestTemplate) -> CameraResult<Self> {
        let template = match template {
            RequestTemplate::Preview => ACameraDevice_request_template::TEMPLATE_PREVIEW,
        };
        let mut handle = null_mut();
        CameraStatus::check(unsafe {
            ACameraDevice_createCaptureRequest(device.handle, template, &mut handle)
        })?;
        Ok(Self { handle })
    }

    pub fn add_target(&mut self, target: &CameraOutputTarget) -> CameraResult {
        CameraStatus::check(unsafe { ACaptureRequest_addTarget(self.handle, target.handle) })
    }

    pub fn set_af_mode(&mut self, mode: AutoFocusMode) -> CameraResult {
        let value = match mode {
            AutoFocusMode::Off => ACAMERA_CONTROL_AF_MODE_OFF,
            AutoFocusMode::ContinuousPicture => ACAMERA_CONTROL_AF_MODE_CONTINUOUS_PICTURE,
        };
        CameraStatus::check(unsafe {
            ACaptureRequest_setEntry_u8(self.handle, ACAMERA_CONTROL_AF_MODE, 1, &value)
        })
    }
}
