// This is free and unencumbered software released into the public domain.

use std::error::Error as StdError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("no suitable camera backend available")]
    NoDriver,

    #[error("no camera device available")]
    NoCamera,

    #[error("camera permission was not granted")]
    PermissionDenied,

    #[error("driver is not configured")]
    NotConfigured,

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("stream closed")]
    Closed,

    #[error("frame processing failed")]
    Processing(#[from] ProcessingError),

    #[error("driver error while {context}")]
    DriverError {
        context: &'static str,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("{0}")]
    Other(String),
}

impl CameraError {
    #[inline]
    pub fn driver(context: &'static str, source: impl StdError + Send + Sync + 'static) -> Self {
        Self::DriverError {
            context,
            source: Box::new(source),
        }
    }

    #[inline]
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    #[inline]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    #[inline]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Errors raised at the frame processing boundary.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("invalid input frame: {0}")]
    InvalidInput(String),

    #[error("failed to encode output frame")]
    Encode(#[from] image::ImageError),
}

impl ProcessingError {
    #[inline]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_error_keeps_its_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "ffmpeg");
        let err = CameraError::driver("spawning ffmpeg", io);
        assert_eq!(err.to_string(), "driver error while spawning ffmpeg");
        assert_eq!(err.source().map(|s| s.to_string()), Some("ffmpeg".into()));
    }

    #[test]
    fn processing_errors_convert_into_camera_errors() {
        let err: CameraError = ProcessingError::invalid_input("odd width").into();
        assert!(matches!(err, CameraError::Processing(_)));
        assert_eq!(
            err.source().map(|s| s.to_string()),
            Some("invalid input frame: odd width".into())
        );
    }
}
