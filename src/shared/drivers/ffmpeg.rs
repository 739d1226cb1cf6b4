// This is free and unencumbered software released into the public domain.

//! Desktop backend: an `ffmpeg` child process reading the platform capture
//! device and writing `yuv420p` rawvideo frames to a pipe.

use crate::shared::{
    CameraBackend, CameraConfig, CameraDriver, CameraError, CameraEvent, CaptureRequest,
    DeviceCallback, DeviceState, Frame, Handler, OutputTarget, PixelFormat, SessionCallback,
    SessionState, default_device_fallback, list_video_devices,
};
use alloc::borrow::Cow;
use bytes::Bytes;
use std::{
    any::Any,
    env,
    io::Read,
    process::{Child, Command, Stdio},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::JoinHandle,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

pub const FFMPEG_STDERR_ENV: &str = "EDGE_VIEWER_FFMPEG_STDERR";

pub struct FfmpegCameraDriver {
    config: CameraConfig,
    device: Option<String>,
    output: Option<OutputTarget>,
    child: Option<Child>,
    stop: Arc<AtomicBool>,
    reader_join: Option<JoinHandle<()>>,
}

impl core::fmt::Debug for FfmpegCameraDriver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FfmpegCameraDriver")
            .field("config", &self.config)
            .field("device", &self.device)
            .field("child", &self.child.as_ref().map(|_| "<child>"))
            .finish()
    }
}

impl dogma::Named for FfmpegCameraDriver {
    fn name(&self) -> Cow<'_, str> {
        "ffmpeg".into()
    }
}

impl FfmpegCameraDriver {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            device: None,
            output: None,
            child: None,
            stop: Arc::new(AtomicBool::new(false)),
            reader_join: None,
        }
    }

    #[inline]
    fn now_ns_best_effort() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }

    fn stop_child(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(mut child) = self.child.take() {
            #[cfg(unix)]
            {
                unsafe {
                    let _ = libc::kill(child.id() as i32, libc::SIGTERM);
                }
                let start = std::time::Instant::now();
                while start.elapsed() < Duration::from_millis(900) {
                    if let Ok(Some(_)) = child.try_wait() {
                        break;
                    }
                    std::thread::sleep(Duration::from_millis(20));
                }
            }
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(j) = self.reader_join.take() {
            let _ = j.join();
        }
    }
}

impl CameraDriver for FfmpegCameraDriver {
    fn backend(&self) -> CameraBackend {
        CameraBackend::Ffmpeg
    }

    fn camera_ids(&self) -> Result<Vec<String>, CameraError> {
        let mut ids: Vec<String> = list_video_devices()?.into_iter().map(|d| d.id).collect();
        if ids.is_empty() {
            ids.extend(Some(default_device_fallback()).filter(|id| !id.is_empty()));
        }
        Ok(ids)
    }

    /// ffmpeg has no separate open step; the device is validated when the
    /// repeating request spawns the process.
    fn open_device(
        &mut self,
        camera_id: &str,
        on_state: DeviceCallback,
    ) -> Result<(), CameraError> {
        if camera_id.trim().is_empty() {
            return Err(CameraError::NoCamera);
        }
        self.device = Some(camera_id.trim().to_string());
        on_state(DeviceState::Opened);
        Ok(())
    }

    fn create_session(
        &mut self,
        outputs: &[OutputTarget],
        on_state: SessionCallback,
    ) -> Result<(), CameraError> {
        if self.device.is_none() {
            return Err(CameraError::NotConfigured);
        }
        match outputs {
            [target] if target.pixel_format == PixelFormat::I420 => {
                self.output = Some(*target);
                on_state(SessionState::Configured);
            },
            _ => on_state(SessionState::ConfigureFailed),
        }
        Ok(())
    }

    fn set_repeating_request(
        &mut self,
        request: &CaptureRequest,
        handler: &Handler,
    ) -> Result<(), CameraError> {
        if self.child.is_some() {
            return Ok(());
        }
        let device = self.device.clone().ok_or(CameraError::NotConfigured)?;
        let target = request
            .targets
            .first()
            .copied()
            .or(self.output)
            .ok_or(CameraError::NotConfigured)?;

        self.stop.store(false, Ordering::Relaxed);
        let mut child = spawn_reader(&device, &target, self.config.fps, self.config.diagnostics)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CameraError::other("ffmpeg stdout not piped"))?;

        let (width, height) = (target.width, target.height);
        let frame_size = PixelFormat::I420.buffer_len(width, height);
        let stop = Arc::clone(&self.stop);
        let handler = handler.clone();

        let join = std::thread::Builder::new()
            .name("ffmpeg-reader".into())
            .spawn(move || {
                let mut reader = std::io::BufReader::new(stdout);

                while !stop.load(Ordering::Relaxed) {
                    let mut buf = vec![0u8; frame_size];
                    match reader.read_exact(&mut buf) {
                        Ok(()) => {
                            let frame = Frame::new_i420(Bytes::from(buf), width, height)
                                .with_timestamp_ns(FfmpegCameraDriver::now_ns_best_effort());
                            handler.post_frame(CameraBackend::Ffmpeg, frame);
                        },
                        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                        Err(e) => {
                            handler.report(CameraEvent::Error {
                                backend: CameraBackend::Ffmpeg,
                                error: CameraError::driver("reading ffmpeg output", e),
                            });
                            break;
                        },
                    }
                }
            })
            .map_err(|e| CameraError::driver("spawning the ffmpeg reader", e))?;

        self.reader_join = Some(join);
        self.child = Some(child);
        Ok(())
    }

    fn close_session(&mut self) -> Result<(), CameraError> {
        self.stop_child();
        self.output = None;
        Ok(())
    }

    fn close_device(&mut self) -> Result<(), CameraError> {
        self.stop_child();
        self.output = None;
        self.device = None;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Drop for FfmpegCameraDriver {
    fn drop(&mut self) {
        self.stop_child();
    }
}

fn spawn_reader(
    device: &str,
    target: &OutputTarget,
    fps: f64,
    diagnostics: bool,
) -> Result<Child, CameraError> {
    let ffargs = ffmpeg_args(device, target, fps);

    let stderr = if diagnostics || env::var_os(FFMPEG_STDERR_ENV).is_some() {
        Stdio::inherit()
    } else {
        Stdio::null()
    };

    tracing::debug!(target: "edge_viewer", args = ?ffargs, "spawning ffmpeg");
    Command::new("ffmpeg")
        .args(&ffargs)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(stderr)
        .spawn()
        .map_err(|e| CameraError::driver("spawning ffmpeg", e))
}

pub(crate) fn ffmpeg_args(device: &str, target: &OutputTarget, fps: f64) -> Vec<String> {
    let input_rate = fps.round().clamp(1.0, 240.0) as u32;
    let size = format!("{}x{}", target.width, target.height);

    let mut ffargs: Vec<String> = vec![
        "-hide_banner".into(),
        "-nostdin".into(),
        "-nostats".into(),
        "-loglevel".into(),
        "error".into(),
        "-f".into(),
        ffmpeg_format().into(),
        "-video_size".into(),
        size,
        "-framerate".into(),
        input_rate.to_string(),
    ];

    #[cfg(target_os = "macos")]
    ffargs.extend(["-pixel_format".into(), "0rgb".into()]);

    // Scale as well, in case the device picked a nearby mode.
    ffargs.extend([
        "-i".into(),
        input_device(device),
        "-vf".into(),
        format!("scale={}:{}", target.width, target.height),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-f".into(),
        "rawvideo".into(),
        "pipe:1".into(),
    ]);
    ffargs
}

fn ffmpeg_format() -> &'static str {
    cfg_if::cfg_if! {
        if #[cfg(target_os = "macos")] {
            "avfoundation"
        } else if #[cfg(target_os = "windows")] {
            "dshow"
        } else {
            "v4l2"
        }
    }
}

fn input_device(device: &str) -> String {
    if let Some(d) = device.strip_prefix("avf:") {
        return d.to_string();
    }
    if let Some(d) = device.strip_prefix("dshow:") {
        return d.to_string();
    }
    let d = device.strip_prefix("file:").unwrap_or(device);
    if !d.is_empty() && d.chars().all(|c| c.is_ascii_digit()) {
        format!("/dev/video{d}")
    } else {
        d.to_string()
    }
}
