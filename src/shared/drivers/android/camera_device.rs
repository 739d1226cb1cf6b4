// This is free and unencumbered software released into the public domain.

use crate::shared::{DeviceCallback, DeviceState};
use alloc::boxed::Box;
use core::{
    ffi::{c_int, c_void},
    ptr::null_mut,
};
use ndk_sys::{ACameraDevice, ACameraDevice_StateCallbacks, ACameraDevice_close};

/// An open camera device. The callback table and its context are boxed so
/// their addresses stay put while the NDK holds them.
pub struct CameraDevice {
    pub(crate) handle: *mut ACameraDevice,
    pub(crate) state_callbacks: Box<ACameraDevice_StateCallbacks>,
    on_state: Box<DeviceCallback>,
}

impl core::fmt::Debug for CameraDevice {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CameraDevice").field("handle", &self.handle).finish()
    }
}

impl Drop for CameraDevice {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            unsafe { ACameraDevice_close(self.handle) };
            self.handle = null_mut();
        }
    }
}

impl CameraDevice {
    pub(crate) fn new(on_state: DeviceCallback) -> Self {
        let mut on_state = Box::new(on_state);
        let context = (on_state.as_mut() as *mut DeviceCallback).cast::<c_void>();
        Self {
            handle: null_mut(),
            state_callbacks: Box::new(ACameraDevice_StateCallbacks {
                context,
                onDisconnected: Some(on_disconnected),
                onError: Some(on_error),
            }),
            on_state,
        }
    }

    pub(crate) fn notify(&self, state: DeviceState) {
        (self.on_state)(state)
    }
}

unsafe extern "C" fn on_disconnected(context: *mut c_void, _device: *mut ACameraDevice) {
    let on_state = unsafe { &*context.cast::<DeviceCallback>() };
    on_state(DeviceState::Disconnected);
}

unsafe extern "C" fn on_error(context: *mut c_void, _device: *mut ACameraDevice, error: c_int) {
    let on_state = unsafe { &*context.cast::<DeviceCallback>() };
    on_state(DeviceState::Error(error));
}
