// This is free and unencumbered software released into the public domain.

use super::{Image, MediaResult, MediaStatus};
use crate::shared::{CameraBackend, CameraEvent, Handler};
use alloc::boxed::Box;
use core::{ffi::c_void, ptr::null_mut};
use ndk_sys::{
    AImageReader, AImageReader_ImageListener, AImageReader_acquireLatestImage,
    AImageReader_delete, AImageReader_new, AImageReader_setImageListener,
};

/// `AIMAGE_FORMAT_YUV_420_888`.
pub const AIMAGE_FORMAT_YUV_420_888: i32 = 0x23;

const MAX_IMAGES: i32 = 2;

/// Receives preview frames and forwards them to the camera thread.
pub struct ImageReader {
    pub(crate) handle: *mut AImageReader,
    listener: Option<(Box<AImageReader_ImageListener>, Box<Handler>)>,
}

impl core::fmt::Debug for ImageReader {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ImageReader")
            .field("handle", &self.handle)
            .field("listening", &self.listener.is_some())
            .finish()
    }
}

impl Drop for ImageReader {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            unsafe { AImageReader_delete(self.handle) };
            self.handle = null_mut();
        }
    }
}

impl ImageReader {
    pub fn new(width: u32, height: u32) -> MediaResult<Self> {
        let mut handle = null_mut();
        MediaStatus::check(unsafe {
            AImageReader_new(
                width as i32,
                height as i32,
                AIMAGE_FORMAT_YUV_420_888,
                MAX_IMAGES,
                &mut handle,
            )
        })?;
        Ok(Self {
            handle,
            listener: None,
        })
    }

    /// Posts every new image to `handler` as an I420 frame.
    pub fn set_listener(&mut self, handler: Handler) -> MediaResult {
        let mut handler = Box::new(handler);
        let mut listener = Box::new(AImageReader_ImageListener {
            context: (handler.as_mut() as *mut Handler).cast::<c_void>(),
            onImageAvailable: Some(on_image_available),
        });
        MediaStatus::check(unsafe {
            AImageReader_setImageListener(self.handle, listener.as_mut())
        })?;
        self.listener = Some((listener, handler));
        Ok(())
    }
}

unsafe extern "C" fn on_image_available(context: *mut c_void, reader: *mut AImageReader) {
    let handler = unsafe { &*context.cast::<Handler>() };
    let mut handle = null_mut();
    let status = unsafe { AImageReader_acquireLatestImage(reader, &mut handle) };
    if status != ndk_sys::media_status_t::AMEDIA_OK {
        return;
    }
    let image = Image { handle };
    match image.to_i420_frame() {
        Ok(frame) => {
            handler.post_frame(CameraBackend::Android, frame);
        },
        Err(error) => handler.report(CameraEvent::Warning {
            backend: CameraBackend::Android,
            message: error.to_string(),
        }),
    }
}
