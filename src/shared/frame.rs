// This is free and unencumbered software released into the public domain.

use crate::shared::ProcessingError;
use bytes::Bytes;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// Planar YUV 4:2:0: a full-resolution Y plane followed by
    /// quarter-resolution U and V planes.
    I420,
}

impl PixelFormat {
    /// Number of bytes a tightly packed `width` x `height` image occupies,
    /// or `None` if that does not fit in `usize`.
    pub fn checked_buffer_len(self, width: u32, height: u32) -> Option<usize> {
        let (w, h) = (width as usize, height as usize);
        match self {
            PixelFormat::I420 => {
                let luma = w.checked_mul(h)?;
                let chroma = w.div_ceil(2).checked_mul(h.div_ceil(2))?.checked_mul(2)?;
                luma.checked_add(chroma)
            },
        }
    }

    /// Like [`Self::checked_buffer_len`], saturating at `usize::MAX`.
    pub fn buffer_len(self, width: u32, height: u32) -> usize {
        self.checked_buffer_len(width, height).unwrap_or(usize::MAX)
    }
}

#[derive(Clone, Debug)]
pub struct Frame {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub timestamp_ns: u64,
}

impl Frame {
    pub fn new_i420(data: impl Into<Bytes>, width: u32, height: u32) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            pixel_format: PixelFormat::I420,
            timestamp_ns: 0,
        }
    }

    pub fn with_timestamp_ns(mut self, timestamp_ns: u64) -> Self {
        self.timestamp_ns = timestamp_ns;
        self
    }

    pub fn is_complete(&self) -> bool {
        self.data.len() >= self.pixel_format.buffer_len(self.width, self.height)
    }
}

/// A frame ready for display: the JPEG produced by the processing boundary.
#[derive(Clone, Debug)]
pub struct DisplayFrame {
    pub jpeg: Bytes,
    pub width: u32,
    pub height: u32,
    pub processed: bool,
    pub timestamp_ns: u64,
}

/// One plane of a strided YUV 4:2:0 image, as camera HALs hand them out.
#[derive(Clone, Copy, Debug)]
pub struct PlaneRef<'a> {
    pub data: &'a [u8],
    pub row_stride: usize,
    pub pixel_stride: usize,
}

impl PlaneRef<'_> {
    fn copy_into(
        &self,
        out: &mut Vec<u8>,
        width: usize,
        height: usize,
    ) -> Result<(), ProcessingError> {
        for row in 0..height {
            let start = row * self.row_stride;
            if self.pixel_stride == 1 {
                let line = self
                    .data
                    .get(start..start + width)
                    .ok_or_else(|| ProcessingError::invalid_input("plane shorter than its rows"))?;
                out.extend_from_slice(line);
                continue;
            }
            for col in 0..width {
                let byte = self
                    .data
                    .get(start + col * self.pixel_stride)
                    .ok_or_else(|| ProcessingError::invalid_input("plane shorter than its rows"))?;
                out.push(*byte);
            }
        }
        Ok(())
    }
}

/// Packs strided Y, U and V planes (any pixel stride, including the
/// interleaved NV12/NV21 layouts) into a tight I420 buffer.
pub fn pack_i420(
    y: PlaneRef<'_>,
    u: PlaneRef<'_>,
    v: PlaneRef<'_>,
    width: u32,
    height: u32,
) -> Result<Bytes, ProcessingError> {
    let (w, h) = (width as usize, height as usize);
    let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
    let len = PixelFormat::I420
        .checked_buffer_len(width, height)
        .ok_or_else(|| ProcessingError::invalid_input("frame dimensions overflow"))?;
    let mut out = Vec::with_capacity(len);
    y.copy_into(&mut out, w, h)?;
    u.copy_into(&mut out, cw, ch)?;
    v.copy_into(&mut out, cw, ch)?;
    Ok(Bytes::from(out))
}
