// This is free and unencumbered software released into the public domain.

//! The frame processing boundary.
//!
//! [`process_frame`] takes a borrowed I420 buffer and returns an owned JPEG:
//! either the RGB conversion of the input, or its Canny edge map when
//! processing is enabled.

use crate::shared::{EdgeConfig, PixelFormat, ProcessingError, normalize_kernel_size};
use image::{DynamicImage, GrayImage, RgbImage, codecs::jpeg::JpegEncoder};
use std::sync::Mutex;

pub const JPEG_QUALITY: u8 = 90;

/// Gaussian blur followed by Canny, producing a white-on-black RGB edge map.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeDetector {
    low_threshold: f32,
    high_threshold: f32,
    blur_kernel: u32,
}

impl Default for EdgeDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl From<EdgeConfig> for EdgeDetector {
    fn from(config: EdgeConfig) -> Self {
        let mut detector = Self::new();
        detector.set_canny_thresholds(config.low_threshold, config.high_threshold);
        detector.set_gaussian_blur_kernel(config.blur_kernel);
        detector
    }
}

impl EdgeDetector {
    pub const fn new() -> Self {
        Self {
            low_threshold: 50.0,
            high_threshold: 150.0,
            blur_kernel: 5,
        }
    }

    pub fn thresholds(&self) -> (f32, f32) {
        (self.low_threshold, self.high_threshold)
    }

    pub fn blur_kernel(&self) -> u32 {
        self.blur_kernel
    }

    pub fn set_canny_thresholds(&mut self, low: f32, high: f32) {
        self.low_threshold = low;
        self.high_threshold = high;
        tracing::info!(target: "edge_viewer", low, high, "canny thresholds set");
    }

    pub fn set_gaussian_blur_kernel(&mut self, kernel: u32) {
        self.blur_kernel = normalize_kernel_size(kernel);
        tracing::info!(
            target: "edge_viewer",
            kernel = self.blur_kernel,
            "gaussian blur kernel set"
        );
    }

    /// Sigma OpenCV derives for a kernel of this size when none is given.
    pub fn blur_sigma(&self) -> f32 {
        0.3 * ((self.blur_kernel as f32 - 1.0) * 0.5 - 1.0) + 0.8
    }

    /// Normalized 1-D Gaussian weights, one per tap of the blur kernel.
    pub fn blur_weights(&self) -> Vec<f32> {
        let sigma = self.blur_sigma();
        let center = (self.blur_kernel / 2) as f32;
        let mut weights: Vec<f32> = (0..self.blur_kernel)
            .map(|i| {
                let d = i as f32 - center;
                (-(d * d) / (2.0 * sigma * sigma)).exp()
            })
            .collect();
        let sum: f32 = weights.iter().sum();
        weights.iter_mut().for_each(|w| *w /= sum);
        weights
    }

    /// Runs the detector on a 1, 3 or 4 channel image.
    ///
    /// An empty input yields an empty output. If the thresholds are unusable
    /// the input is passed through unchanged.
    pub fn process(&self, input: &DynamicImage) -> RgbImage {
        if input.width() == 0 || input.height() == 0 {
            tracing::error!(target: "edge_viewer", "input frame is empty");
            return RgbImage::new(0, 0);
        }
        if !(self.low_threshold.is_finite()
            && self.high_threshold.is_finite()
            && self.low_threshold >= 0.0
            && self.low_threshold <= self.high_threshold)
        {
            tracing::error!(
                target: "edge_viewer",
                low = self.low_threshold,
                high = self.high_threshold,
                "invalid canny thresholds, passing frame through"
            );
            return input.to_rgb8();
        }

        let gray = to_grayscale(input);
        let blurred = imageproc::filter::separable_filter_equal(&gray, &self.blur_weights());
        let edges = imageproc::edges::canny(&blurred, self.low_threshold, self.high_threshold);
        DynamicImage::ImageLuma8(edges).to_rgb8()
    }

    /// Decodes an I420 buffer, optionally detects edges, and encodes a JPEG.
    pub fn process_i420(
        &self,
        input: &[u8],
        width: u32,
        height: u32,
        enabled: bool,
    ) -> Result<Vec<u8>, ProcessingError> {
        let rgb = i420_to_rgb(input, width, height)?;
        let output = if enabled {
            self.process(&DynamicImage::ImageRgb8(rgb))
        } else {
            rgb
        };
        encode_jpeg(output)
    }
}

fn to_grayscale(input: &DynamicImage) -> GrayImage {
    match input {
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        other => other.to_luma8(),
    }
}

static DETECTOR: Mutex<EdgeDetector> = Mutex::new(EdgeDetector::new());

/// Process-wide detector used by [`process_frame`] and the C ABI.
pub fn with_shared_detector<R>(f: impl FnOnce(&mut EdgeDetector) -> R) -> R {
    let mut guard = DETECTOR.lock().unwrap_or_else(|p| p.into_inner());
    f(&mut guard)
}

/// Processes one I420 frame with the process-wide detector.
pub fn process_frame(
    input: &[u8],
    width: u32,
    height: u32,
    enabled: bool,
) -> Result<Vec<u8>, ProcessingError> {
    let detector = with_shared_detector(|d| d.clone());
    detector.process_i420(input, width, height, enabled)
}

/// Converts planar YUV 4:2:0 to RGB using the BT.601 limited-range matrix.
pub fn i420_to_rgb(input: &[u8], width: u32, height: u32) -> Result<RgbImage, ProcessingError> {
    if width == 0 || height == 0 {
        return Err(ProcessingError::invalid_input("frame has zero size"));
    }
    if width % 2 != 0 || height % 2 != 0 {
        return Err(ProcessingError::invalid_input(format!(
            "I420 frame {width}x{height} must have even dimensions"
        )));
    }
    let Some(expected) = PixelFormat::I420.checked_buffer_len(width, height) else {
        return Err(ProcessingError::invalid_input(format!(
            "I420 frame {width}x{height} is too large"
        )));
    };
    if input.len() != expected {
        return Err(ProcessingError::invalid_input(format!(
            "expected {expected} bytes for a {width}x{height} I420 frame, got {}",
            input.len()
        )));
    }

    let (w, h) = (width as usize, height as usize);
    let (y_plane, chroma) = input.split_at(w * h);
    let (u_plane, v_plane) = chroma.split_at(w * h / 4);
    let cw = w / 2;

    let rgb_len = (w * h)
        .checked_mul(3)
        .ok_or_else(|| ProcessingError::invalid_input("RGB frame is too large"))?;
    let mut rgb = vec![0u8; rgb_len];
    for (row, out_row) in rgb.chunks_exact_mut(w * 3).enumerate() {
        let y_row = &y_plane[row * w..(row + 1) * w];
        let c_row = (row / 2) * cw;
        for (col, px) in out_row.chunks_exact_mut(3).enumerate() {
            let y = (y_row[col] as i32 - 16).max(0) * 1192;
            let u = u_plane[c_row + col / 2] as i32 - 128;
            let v = v_plane[c_row + col / 2] as i32 - 128;

            px[0] = clamp_u8((y + 1634 * v) >> 10);
            px[1] = clamp_u8((y - 833 * v - 401 * u) >> 10);
            px[2] = clamp_u8((y + 2066 * u) >> 10);
        }
    }

    RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| ProcessingError::invalid_input("RGB buffer size mismatch"))
}

#[inline]
fn clamp_u8(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

pub fn encode_jpeg(image: RgbImage) -> Result<Vec<u8>, ProcessingError> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY).encode_image(&image)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, ImageFormat, Rgb};

    fn i420(width: u32, height: u32, luma: impl Fn(u32, u32) -> u8) -> Vec<u8> {
        let mut data = vec![128u8; PixelFormat::I420.buffer_len(width, height)];
        for y in 0..height {
            for x in 0..width {
                data[(y * width + x) as usize] = luma(x, y);
            }
        }
        data
    }

    #[test]
    fn neutral_chroma_decodes_to_gray() {
        let rgb = i420_to_rgb(&i420(4, 4, |_, _| 16), 4, 4).unwrap();
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([0, 0, 0]));

        let rgb = i420_to_rgb(&i420(4, 4, |_, _| 235), 4, 4).unwrap();
        let Rgb([r, g, b]) = *rgb.get_pixel(3, 3);
        assert!(r >= 254 && g >= 254 && b >= 254);
        assert_eq!((r, g), (g, b));
    }

    #[test]
    fn malformed_buffers_are_rejected() {
        assert!(matches!(
            i420_to_rgb(&[0u8; 10], 4, 4),
            Err(ProcessingError::InvalidInput(_))
        ));
        assert!(i420_to_rgb(&[0u8; 0], 0, 0).is_err());
        assert!(i420_to_rgb(&vec![0u8; 3 * 3 + 8], 3, 3).is_err());
        assert!(matches!(
            i420_to_rgb(&[0u8; 24], u32::MAX - 1, u32::MAX - 1),
            Err(ProcessingError::InvalidInput(_))
        ));
    }

    #[test]
    fn uniform_frames_have_no_edges() {
        let detector = EdgeDetector::new();
        let rgb = i420_to_rgb(&i420(64, 64, |_, _| 128), 64, 64).unwrap();
        let edges = detector.process(&DynamicImage::ImageRgb8(rgb));
        assert_eq!(edges.dimensions(), (64, 64));
        assert!(edges.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn a_vertical_step_produces_a_vertical_edge() {
        let detector = EdgeDetector::new();
        let rgb = i420_to_rgb(&i420(64, 64, |x, _| if x < 32 { 16 } else { 235 }), 64, 64)
            .unwrap();
        let edges = detector.process(&DynamicImage::ImageRgb8(rgb));

        let near_step = |x: u32| (28..=36).contains(&x);
        let mut hits = 0;
        for (x, _y, p) in edges.enumerate_pixels() {
            if p.0 == [255, 255, 255] {
                assert!(near_step(x), "unexpected edge at column {x}");
                hits += 1;
            }
        }
        assert!(hits >= 32, "expected an edge along the step, got {hits} pixels");
    }

    #[test]
    fn grayscale_and_rgba_inputs_are_accepted() {
        let detector = EdgeDetector::new();
        let gray = GrayImage::from_fn(16, 16, |x, _| image::Luma([if x < 8 { 0 } else { 255 }]));
        let from_gray = detector.process(&DynamicImage::ImageLuma8(gray.clone()));
        let from_rgba = detector.process(&DynamicImage::ImageLuma8(gray).to_rgba8().into());
        assert_eq!(from_gray.dimensions(), (16, 16));
        assert_eq!(from_gray, from_rgba);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let detector = EdgeDetector::new();
        let out = detector.process(&DynamicImage::new_rgb8(0, 0));
        assert_eq!(out.dimensions(), (0, 0));
    }

    #[test]
    fn inverted_thresholds_pass_the_frame_through() {
        let mut detector = EdgeDetector::new();
        detector.set_canny_thresholds(200.0, 10.0);
        let input = RgbImage::from_pixel(8, 8, Rgb([10, 20, 30]));
        let out = detector.process(&DynamicImage::ImageRgb8(input.clone()));
        assert_eq!(out, input);
    }

    #[test]
    fn raw_output_decodes_to_the_input_size() {
        let jpeg = EdgeDetector::new()
            .process_i420(&i420(32, 16, |x, _| x as u8 * 4), 32, 16, false)
            .unwrap();
        let decoded = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg).unwrap();
        assert_eq!(decoded.dimensions(), (32, 16));
    }

    #[test]
    fn kernel_setter_normalizes_and_sigma_follows() {
        let mut detector = EdgeDetector::new();
        assert!((detector.blur_sigma() - 1.1).abs() < 1e-6);
        detector.set_gaussian_blur_kernel(2);
        assert_eq!(detector.blur_kernel(), 3);
        assert!((detector.blur_sigma() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn blur_uses_one_weight_per_kernel_tap() {
        let mut detector = EdgeDetector::new();
        let weights = detector.blur_weights();
        assert_eq!(weights.len(), 5);
        assert!((weights.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert_eq!(weights[0], weights[4]);
        assert!(weights[2] > weights[1] && weights[1] > weights[0]);

        detector.set_gaussian_blur_kernel(8);
        assert_eq!(detector.blur_weights().len(), 9);
    }

    #[test]
    fn detector_follows_the_edge_config() {
        let config = EdgeConfig::default().with_thresholds(10.0, 20.0).with_blur_kernel(6);
        let detector = EdgeDetector::from(config);
        assert_eq!(detector.thresholds(), (10.0, 20.0));
        assert_eq!(detector.blur_kernel(), 7);
    }
}
