// This is free and unencumbered software released into the public domain.

use super::{ImageReader, MediaResult, MediaStatus};
use core::ptr::null_mut;
use ndk_sys::{ANativeWindow, ANativeWindow_acquire, ANativeWindow_release, AImageReader_getWindow};

/// A counted reference to a native window.
#[derive(Debug)]
pub struct NativeWindow {
    pub(crate) handle: *mut ANativeWindow,
}

impl Drop for NativeWindow {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            unsafe { ANativeWindow_release(self.handle) };
            self.handle = null_mut();
        }
    }
}

impl NativeWindow {
    /// The reader's input surface. The reader keeps its own reference, so
    /// this one is acquired separately.
    pub fn from_image_reader(reader: &ImageReader) -> MediaResult<Self> {
        let mut handle = null_mut();
        MediaStatus::check(unsafe { AImageReader_getWindow(reader.handle, &mut handle) })?;
        unsafe { ANativeWindow_acquire(handle) };
        Ok(Self { handle })
    }
}
