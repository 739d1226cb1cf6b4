// This is free and unencumbered software released into the public domain.

/// Preview buffer size requested from the camera unless overridden.
pub const DEFAULT_PREVIEW_WIDTH: u32 = 1920;
pub const DEFAULT_PREVIEW_HEIGHT: u32 = 1080;

#[derive(Clone, Debug)]
pub struct CameraConfig {
    pub device: Option<String>,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub buffer_frames: usize,
    pub diagnostics: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: None,
            width: DEFAULT_PREVIEW_WIDTH,
            height: DEFAULT_PREVIEW_HEIGHT,
            fps: 30.0,
            buffer_frames: 2,
            diagnostics: false,
        }
    }
}

impl CameraConfig {
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self {
            width,
            height,
            fps,
            ..Default::default()
        }
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    pub fn with_buffer_frames(mut self, n: usize) -> Self {
        self.buffer_frames = n.max(1);
        self
    }

    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }

    /// I420 needs even dimensions so every chroma sample covers a full 2x2 block.
    pub fn validate(&self) -> Result<(), crate::shared::CameraError> {
        use crate::shared::CameraError;
        if self.width == 0 || self.height == 0 {
            return Err(CameraError::invalid_config("preview size must be non-zero"));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(CameraError::invalid_config(format!(
                "preview size {}x{} must have even dimensions",
                self.width, self.height
            )));
        }
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(CameraError::invalid_config("fps must be positive"));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeConfig {
    pub low_threshold: f32,
    pub high_threshold: f32,
    pub blur_kernel: u32,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            low_threshold: 50.0,
            high_threshold: 150.0,
            blur_kernel: 5,
        }
    }
}

impl EdgeConfig {
    pub fn with_thresholds(mut self, low: f32, high: f32) -> Self {
        self.low_threshold = low;
        self.high_threshold = high;
        self
    }

    pub fn with_blur_kernel(mut self, kernel: u32) -> Self {
        self.blur_kernel = normalize_kernel_size(kernel);
        self
    }
}

/// Gaussian kernels are odd and at least 3 wide.
pub fn normalize_kernel_size(kernel: u32) -> u32 {
    let kernel = if kernel % 2 == 0 { kernel + 1 } else { kernel };
    kernel.max(3)
}

#[derive(Clone, Debug)]
pub struct ViewerConfig {
    pub camera: CameraConfig,
    pub edge: EdgeConfig,
    pub processing_enabled: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            edge: EdgeConfig::default(),
            processing_enabled: true,
        }
    }
}

impl ViewerConfig {
    pub fn new(camera: CameraConfig) -> Self {
        Self {
            camera,
            ..Default::default()
        }
    }

    pub fn with_edge(mut self, edge: EdgeConfig) -> Self {
        self.edge = edge;
        self
    }

    pub fn with_processing(mut self, enabled: bool) -> Self {
        self.processing_enabled = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_sizes_are_forced_odd_and_at_least_three() {
        assert_eq!(normalize_kernel_size(0), 3);
        assert_eq!(normalize_kernel_size(1), 3);
        assert_eq!(normalize_kernel_size(4), 5);
        assert_eq!(normalize_kernel_size(7), 7);
        assert_eq!(EdgeConfig::default().with_blur_kernel(8).blur_kernel, 9);
    }

    #[test]
    fn defaults_match_the_preview_pipeline() {
        let config = ViewerConfig::default();
        assert!(config.processing_enabled);
        assert_eq!((config.camera.width, config.camera.height), (1920, 1080));
        assert_eq!(config.edge, EdgeConfig::default());
        assert_eq!(config.edge.blur_kernel, 5);
    }

    #[test]
    fn odd_preview_sizes_are_rejected() {
        assert!(CameraConfig::new(640, 480, 30.0).validate().is_ok());
        assert!(CameraConfig::new(641, 480, 30.0).validate().is_err());
        assert!(CameraConfig::new(640, 480, 0.0).validate().is_err());
        assert!(CameraConfig::new(0, 480, 30.0).validate().is_err());
    }
}
