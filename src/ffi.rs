// This is free and unencumbered software released into the public domain.

//! C ABI over the frame processing boundary.
//!
//! Output buffers are allocated on the Rust side and must be released with
//! [`edge_viewer_free_buffer`], passing back the exact length returned.

use crate::shared::{ProcessingError, process_frame, with_shared_detector};
use core::ptr;

/// Status codes returned across the C ABI.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EdgeViewerStatus {
    /// No error.
    Ok = 0,
    /// A required pointer was NULL.
    NullPointer = 1,
    /// The input frame has the wrong size or shape.
    InvalidInput = 2,
    /// The processed frame could not be encoded.
    EncodeFailed = 3,
    /// A panic was caught at the boundary.
    Panic = 4,
}

impl From<&ProcessingError> for EdgeViewerStatus {
    fn from(err: &ProcessingError) -> Self {
        match err {
            ProcessingError::InvalidInput(_) => EdgeViewerStatus::InvalidInput,
            ProcessingError::Encode(_) => EdgeViewerStatus::EncodeFailed,
        }
    }
}

/// Converts an I420 frame to RGB, optionally runs edge detection, and
/// returns a JPEG.
///
/// On success `*out_ptr` and `*out_len` receive the encoded frame; on error
/// they are set to NULL and 0.
///
/// # Safety
///
/// `input` must point to `input_len` readable bytes. `out_ptr` and
/// `out_len` must be valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn edge_viewer_process_frame(
    input: *const u8,
    input_len: usize,
    width: u32,
    height: u32,
    enabled: bool,
    out_ptr: *mut *mut u8,
    out_len: *mut usize,
) -> EdgeViewerStatus {
    if input.is_null() || out_ptr.is_null() || out_len.is_null() {
        return EdgeViewerStatus::NullPointer;
    }
    unsafe {
        *out_ptr = ptr::null_mut();
        *out_len = 0;
    }

    let input = unsafe { core::slice::from_raw_parts(input, input_len) };
    let result = std::panic::catch_unwind(|| process_frame(input, width, height, enabled));

    match result {
        Ok(Ok(jpeg)) => {
            let jpeg = jpeg.into_boxed_slice();
            let len = jpeg.len();
            unsafe {
                *out_ptr = Box::into_raw(jpeg).cast::<u8>();
                *out_len = len;
            }
            EdgeViewerStatus::Ok
        },
        Ok(Err(err)) => {
            tracing::warn!(target: "edge_viewer", %err, "frame processing failed");
            EdgeViewerStatus::from(&err)
        },
        Err(_) => EdgeViewerStatus::Panic,
    }
}

/// Releases a buffer returned by [`edge_viewer_process_frame`].
///
/// # Safety
///
/// `ptr` and `len` must be exactly what `edge_viewer_process_frame` wrote,
/// and the buffer must not have been freed already. NULL is ignored.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn edge_viewer_free_buffer(ptr: *mut u8, len: usize) {
    if ptr.is_null() {
        return;
    }
    unsafe {
        drop(Box::from_raw(ptr::slice_from_raw_parts_mut(ptr, len)));
    }
}

/// Sets the Canny hysteresis thresholds used by subsequent frames.
#[unsafe(no_mangle)]
pub extern "C" fn edge_viewer_set_canny_thresholds(low: f32, high: f32) {
    with_shared_detector(|d| d.set_canny_thresholds(low, high));
}

/// Sets the Gaussian pre-blur kernel size; even sizes are rounded up.
#[unsafe(no_mangle)]
pub extern "C" fn edge_viewer_set_gaussian_blur_kernel(size: u32) {
    with_shared_detector(|d| d.set_gaussian_blur_kernel(size));
}
