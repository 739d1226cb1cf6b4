// This is free and unencumbered software released into the public domain.

use super::{CameraDevice, CameraResult, CameraStatus};
use crate::shared::{CameraError, DeviceCallback};
use alloc::ffi::CString;
use core::{ffi::CStr, ptr::null_mut};
use ndk_sys::{
    ACameraManager, ACameraManager_create, ACameraManager_delete,
    ACameraManager_deleteCameraIdList, ACameraManager_getCameraIdList, ACameraManager_openCamera,
};
use scopeguard::defer;

#[derive(Debug)]
pub struct CameraManager {
    pub(crate) handle: *mut ACameraManager,
}

impl Drop for CameraManager {
    fn drop(&mut self) {
        unsafe { ACameraManager_delete(self.handle) };
        self.handle = null_mut();
    }
}

impl CameraManager {
    pub fn new() -> Self {
        Self {
            handle: unsafe { ACameraManager_create() },
        }
    }

    pub fn camera_ids(&self) -> CameraResult<Vec<String>> {
        let mut list_ptr = null_mut();
        CameraStatus::check(unsafe { ACameraManager_getCameraIdList(self.handle, &mut list_ptr) })?;
        defer! {
            unsafe { ACameraManager_deleteCameraIdList(list_ptr) };
        }

        let list = unsafe { &*list_ptr };
        if list.numCameras < 1 {
            return Ok(Vec::new());
        }
        let ids = unsafe { core::slice::from_raw_parts(list.cameraIds, list.numCameras as usize) };
        Ok(ids
            .iter()
            .map(|p| unsafe { CStr::from_ptr(*p) }.to_string_lossy().into_owned())
            .collect())
    }

    /// Opens `id`. Disconnect and error notifications go to `on_state` for
    /// as long as the returned device lives.
    pub fn open_camera(
        &self,
        id: &str,
        on_state: DeviceCallback,
    ) -> Result<CameraDevice, CameraError> {
        let id = CString::new(id)
            .map_err(|_| CameraError::invalid_config("camera ID contains NUL"))?;
        let mut device = CameraDevice::new(on_state);
        CameraStatus::check(unsafe {
            ACameraManager_openCamera(
                self.handle,
                id.as_ptr(),
                device.state_callbacks.as_mut(),
                &mut device.handle,
            )
        })?;
        Ok(device)
    }
}
