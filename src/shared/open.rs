// This is free and unencumbered software released into the public domain.

use super::{CameraConfig, CameraDriver, CameraError, drivers::synthetic::SyntheticCameraDriver};

/// Which backend a device string selects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceSpec {
    /// The built-in test pattern.
    Synthetic(String),
    /// An NDK camera2 camera ID.
    Android(String),
    /// Whatever the platform default backend understands.
    Platform(String),
}

impl DeviceSpec {
    pub fn parse(device: &str) -> Self {
        let device = device.trim();
        if device == "synthetic" {
            return Self::Synthetic(String::new());
        }
        if let Some(id) = device.strip_prefix("synthetic:") {
            return Self::Synthetic(id.trim().to_string());
        }
        if let Some(id) = device
            .strip_prefix("camera2:")
            .or_else(|| device.strip_prefix("android:"))
        {
            return Self::Android(id.trim().to_string());
        }
        Self::Platform(device.to_string())
    }

    pub fn camera_id(&self) -> &str {
        match self {
            Self::Synthetic(id) | Self::Android(id) | Self::Platform(id) => id,
        }
    }
}

/// Opens the driver named by `config.device`, rewriting the device string to
/// the bare camera ID the driver expects. An empty ID means the first camera.
pub fn open(config: &mut CameraConfig) -> Result<Box<dyn CameraDriver>, CameraError> {
    config.validate()?;
    let spec = DeviceSpec::parse(config.device.as_deref().unwrap_or_default());
    config.device = Some(spec.camera_id().to_string()).filter(|id| !id.is_empty());

    match spec {
        DeviceSpec::Synthetic(_) => Ok(Box::new(SyntheticCameraDriver::new(config.clone()))),
        DeviceSpec::Android(_) => open_android(config),
        DeviceSpec::Platform(_) => open_platform(config),
    }
}

fn open_android(_config: &CameraConfig) -> Result<Box<dyn CameraDriver>, CameraError> {
    cfg_if::cfg_if! {
        if #[cfg(all(target_os = "android", feature = "android"))] {
            Ok(Box::new(super::drivers::camera2::Camera2CameraDriver::new(_config.clone())?))
        } else {
            Err(CameraError::unsupported("camera2 is only available on Android"))
        }
    }
}

fn open_platform(config: &CameraConfig) -> Result<Box<dyn CameraDriver>, CameraError> {
    if cfg!(all(target_os = "android", feature = "android")) {
        return open_android(config);
    }
    cfg_if::cfg_if! {
        if #[cfg(feature = "ffmpeg")] {
            Ok(Box::new(super::drivers::ffmpeg::FfmpegCameraDriver::new(config.clone())))
        } else {
            let _ = config;
            Err(CameraError::NoDriver)
        }
    }
}
