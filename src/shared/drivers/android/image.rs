// This is free and unencumbered software released into the public domain.

use super::{MediaResult, MediaStatus};
use crate::shared::{CameraError, Frame, PlaneRef, pack_i420};
use core::ptr::null_mut;
use ndk_sys::{
    AImage, AImage_delete, AImage_getHeight, AImage_getPlaneData, AImage_getPlanePixelStride,
    AImage_getPlaneRowStride, AImage_getTimestamp, AImage_getWidth,
};

#[derive(Debug)]
pub struct Image {
    pub(crate) handle: *mut AImage,
}

impl Drop for Image {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            unsafe { AImage_delete(self.handle) };
            self.handle = null_mut();
        }
    }
}

impl Image {
    pub fn timestamp_ns(&self) -> MediaResult<i64> {
        let mut result = 0;
        MediaStatus::check(unsafe { AImage_getTimestamp(self.handle, &mut result) })?;
        Ok(result)
    }

    pub fn dimensions(&self) -> MediaResult<(u32, u32)> {
        let (mut width, mut height) = (0, 0);
        MediaStatus::check(unsafe { AImage_getWidth(self.handle, &mut width) })?;
        MediaStatus::check(unsafe { AImage_getHeight(self.handle, &mut height) })?;
        Ok((width as u32, height as u32))
    }

    /// Borrows plane `index`; valid until the image is deleted.
    pub fn plane(&self, index: i32) -> MediaResult<PlaneRef<'_>> {
        let (mut data, mut len) = (null_mut(), 0);
        let (mut row_stride, mut pixel_stride) = (0, 0);
        unsafe {
            MediaStatus::check(AImage_getPlaneData(self.handle, index, &mut data, &mut len))?;
            MediaStatus::check(AImage_getPlaneRowStride(self.handle, index, &mut row_stride))?;
            MediaStatus::check(AImage_getPlanePixelStride(self.handle, index, &mut pixel_stride))?;
        }
        let data = if data.is_null() || len <= 0 {
            &[][..]
        } else {
            unsafe { core::slice::from_raw_parts(data, len as usize) }
        };
        Ok(PlaneRef {
            data,
            row_stride: row_stride.max(0) as usize,
            pixel_stride: pixel_stride.max(1) as usize,
        })
    }

    /// Copies a `YUV_420_888` image into a packed I420 frame.
    pub fn to_i420_frame(&self) -> Result<Frame, CameraError> {
        let (width, height) = self.dimensions()?;
        let data = pack_i420(self.plane(0)?, self.plane(1)?, self.plane(2)?, width, height)?;
        let timestamp = self.timestamp_ns()?.max(0) as u64;
        Ok(Frame::new_i420(data, width, height).with_timestamp_ns(timestamp))
    }
}
