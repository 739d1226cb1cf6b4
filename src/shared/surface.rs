// This is free and unencumbered software released into the public domain.

//! Display targets for processed preview frames.

use crate::shared::{CameraError, DisplayFrame};
use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

pub trait PreviewSurface: Send + Sync {
    fn on_available(&self, _width: u32, _height: u32) {}

    fn on_size_changed(&self, _width: u32, _height: u32) {}

    /// Returns whether the surface may be released.
    fn on_destroyed(&self) -> bool {
        true
    }

    fn on_updated(&self, frame: &DisplayFrame) -> Result<(), CameraError>;
}

/// Streams every frame as concatenated JPEGs (MJPEG), e.g. to stdout for
/// `ffplay -f mjpeg -`.
pub struct MjpegStreamSurface<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> MjpegStreamSurface<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(|p| p.into_inner())
    }
}

impl<W: Write + Send> PreviewSurface for MjpegStreamSurface<W> {
    fn on_updated(&self, frame: &DisplayFrame) -> Result<(), CameraError> {
        let mut out = self.writer.lock().unwrap_or_else(|p| p.into_inner());
        out.write_all(&frame.jpeg)
            .and_then(|()| out.flush())
            .map_err(|e| match e.kind() {
                io::ErrorKind::BrokenPipe => CameraError::Closed,
                _ => CameraError::driver("writing MJPEG frame", e),
            })
    }
}

/// Keeps the latest frame in a single file, replaced atomically.
#[derive(Debug)]
pub struct SnapshotSurface {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl SnapshotSurface {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        Self {
            path,
            tmp_path: tmp.into(),
        }
    }
}

impl PreviewSurface for SnapshotSurface {
    fn on_updated(&self, frame: &DisplayFrame) -> Result<(), CameraError> {
        fs::write(&self.tmp_path, &frame.jpeg)
            .and_then(|()| fs::rename(&self.tmp_path, &self.path))
            .map_err(|e| CameraError::driver("writing snapshot", e))
    }
}

/// Discards frames, counting them.
#[derive(Debug, Default)]
pub struct NullSurface {
    frames: AtomicU64,
}

impl NullSurface {
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }
}

impl PreviewSurface for NullSurface {
    fn on_updated(&self, _frame: &DisplayFrame) -> Result<(), CameraError> {
        self.frames.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn frame(jpeg: &'static [u8]) -> DisplayFrame {
        DisplayFrame {
            jpeg: Bytes::from_static(jpeg),
            width: 2,
            height: 2,
            processed: true,
            timestamp_ns: 0,
        }
    }

    #[test]
    fn mjpeg_frames_are_concatenated() {
        let surface = MjpegStreamSurface::new(Vec::new());
        surface.on_updated(&frame(b"one")).unwrap();
        surface.on_updated(&frame(b"two")).unwrap();
        assert_eq!(surface.into_inner(), b"onetwo");
    }

    #[test]
    fn snapshot_keeps_only_the_latest_frame() {
        let name = format!("edge-viewer-snapshot-{}.jpg", std::process::id());
        let path = std::env::temp_dir().join(name);
        let surface = SnapshotSurface::new(&path);
        surface.on_updated(&frame(b"first")).unwrap();
        surface.on_updated(&frame(b"second")).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn null_surface_counts() {
        let surface = NullSurface::default();
        surface.on_updated(&frame(b"x")).unwrap();
        assert_eq!(surface.frames(), 1);
        assert!(surface.on_destroyed());
    }
}
