// This is free and unencumbered software released into the public domain.

#[cfg(not(feature = "std"))]
compile_error!("edge-viewer requires the 'std' feature");

use asimov_module::SysexitsError::{self, *};
use clap::Parser;
use clientele::StandardOptions;
use edge_viewer::{
    cli::{
        OutputSpec, handle_error, info_user, parse_dimensions, parse_frequency, parse_output,
        warn_user,
    },
    shared::{
        CameraConfig, CameraError, CameraEvent, DeviceAccessGate, DisplayFrame, EdgeConfig,
        EdgeViewer, MjpegStreamSurface, NullSurface, PreviewSurface, SnapshotSurface,
        ViewerConfig, ViewerUi,
    },
};
use std::{
    error::Error as StdError,
    io::{self, BufRead, IsTerminal},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{Receiver, RecvTimeoutError, channel},
    },
    time::Duration,
};

#[derive(Debug, Parser)]
struct Options {
    #[clap(flatten)]
    flags: StandardOptions,

    /// Camera device: a platform device (e.g. file:/dev/video0),
    /// camera2:<id> on Android, or synthetic.
    #[arg(long)]
    device: Option<String>,

    #[arg(short, long = "size", value_parser = parse_dimensions, default_value = "1920x1080")]
    size: (u32, u32),

    #[arg(short, long, value_parser = parse_frequency, default_value = "30")]
    frequency: f64,

    /// mjpeg (stdout), snapshot=PATH or null.
    #[arg(short, long, value_parser = parse_output, default_value = "mjpeg")]
    output: OutputSpec,

    /// Start with edge detection off.
    #[arg(long)]
    raw: bool,

    #[arg(long, default_value_t = 50.0)]
    low: f32,

    #[arg(long, default_value_t = 150.0)]
    high: f32,

    /// Gaussian pre-blur kernel size.
    #[arg(long, default_value_t = 5)]
    kernel: u32,
}

pub fn main() -> Result<SysexitsError, Box<dyn StdError>> {
    asimov_module::dotenv().ok();
    let args = asimov_module::args_os()?;
    let options = Options::parse_from(args);

    if options.flags.version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(EX_OK);
    }

    if options.flags.license {
        print!("{}", include_str!("../../UNLICENSE"));
        return Ok(EX_OK);
    }

    #[cfg(feature = "tracing")]
    asimov_module::init_tracing_subscriber(&options.flags).expect("failed to initialize logging");

    let exit_code = match run_viewer(&options) {
        Ok(()) => EX_OK,
        Err(err) => handle_error(&err, &options.flags),
    };

    Ok(exit_code)
}

enum Command {
    Toggle,
    Quit,
}

fn run_viewer(opts: &Options) -> Result<(), CameraError> {
    let quit = Arc::new(AtomicBool::new(false));
    {
        let quit = Arc::clone(&quit);
        ctrlc::set_handler(move || quit.store(true, Ordering::SeqCst))
            .map_err(|e| CameraError::other(format!("{e}")))?;
    }

    let (width, height) = opts.size;
    let mut camera = CameraConfig::new(width, height, opts.frequency)
        .with_diagnostics(opts.flags.debug || opts.flags.verbose >= 3);
    if let Some(device) = opts.device.as_deref() {
        camera = camera.with_device(device);
    }
    let driver = edge_viewer::shared::open(&mut camera)?;
    info_user(
        &opts.flags,
        &format!(
            "using {:?} backend, device {}",
            driver.backend(),
            camera.device.as_deref().unwrap_or("(first available)")
        ),
    );

    let config = ViewerConfig::new(camera)
        .with_edge(
            EdgeConfig::default()
                .with_thresholds(opts.low, opts.high)
                .with_blur_kernel(opts.kernel),
        )
        .with_processing(!opts.raw);

    let surface = open_surface(opts, Arc::clone(&quit));
    let ui = Arc::new(TerminalUi {
        verbose: opts.flags.debug || opts.flags.verbose >= 1,
        quit: Arc::clone(&quit),
        denied: AtomicBool::new(false),
    });
    let gate = Box::new(DeviceAccessGate::new(config.camera.device.as_deref()));

    let viewer = EdgeViewer::new(config, driver, gate, surface, ui.clone());
    let mut viewer = scopeguard::guard(viewer, |mut viewer| {
        viewer.on_surface_destroyed();
        if let Err(err) = viewer.pause() {
            eprintln!("WARN: failed to stop the camera: {err}");
        }
    });

    viewer.create();
    if viewer.is_finished() {
        return Err(if ui.denied.load(Ordering::SeqCst) {
            CameraError::PermissionDenied
        } else {
            CameraError::Closed
        });
    }
    viewer.on_surface_available(width, height);
    viewer.resume()?;

    let commands = spawn_stdin_reader();
    while !quit.load(Ordering::SeqCst) {
        match commands.recv_timeout(Duration::from_millis(100)) {
            Ok(Command::Toggle) => {
                viewer.toggle_processing();
            },
            Ok(Command::Quit) => break,
            Err(RecvTimeoutError::Timeout) => {},
            Err(RecvTimeoutError::Disconnected) => std::thread::sleep(Duration::from_millis(100)),
        }
        while let Ok(event) = viewer.events().try_recv() {
            report_event(&opts.flags, event);
        }
    }

    info_user(&opts.flags, "stopping");
    Ok(())
}

fn open_surface(opts: &Options, quit: Arc<AtomicBool>) -> Arc<dyn PreviewSurface> {
    let inner: Box<dyn PreviewSurface> = match &opts.output {
        OutputSpec::Mjpeg => {
            if io::stdout().is_terminal() {
                warn_user(
                    &opts.flags,
                    "writing MJPEG to a terminal; pipe into `ffplay -f mjpeg -`",
                );
            }
            Box::new(MjpegStreamSurface::new(io::stdout()))
        },
        OutputSpec::Snapshot(path) => Box::new(SnapshotSurface::new(path)),
        OutputSpec::Null => Box::new(NullSurface::default()),
    };
    Arc::new(QuitOnClosed { inner, quit })
}

/// Stops the viewer once the downstream reader goes away.
struct QuitOnClosed {
    inner: Box<dyn PreviewSurface>,
    quit: Arc<AtomicBool>,
}

impl PreviewSurface for QuitOnClosed {
    fn on_available(&self, width: u32, height: u32) {
        self.inner.on_available(width, height);
    }

    fn on_size_changed(&self, width: u32, height: u32) {
        self.inner.on_size_changed(width, height);
    }

    fn on_destroyed(&self) -> bool {
        self.inner.on_destroyed()
    }

    fn on_updated(&self, frame: &DisplayFrame) -> Result<(), CameraError> {
        let result = self.inner.on_updated(frame);
        if matches!(result, Err(CameraError::Closed)) {
            self.quit.store(true, Ordering::SeqCst);
        }
        result
    }
}

/// `t` toggles processing, `q` quits. EOF leaves the viewer running.
fn spawn_stdin_reader() -> Receiver<Command> {
    let (tx, rx) = channel();
    let spawned = std::thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                let command = match line.trim() {
                    "t" | "toggle" => Command::Toggle,
                    "q" | "quit" => Command::Quit,
                    _ => continue,
                };
                if tx.send(command).is_err() {
                    break;
                }
            }
        });
    if spawned.is_err() {
        eprintln!("WARN: stdin commands are unavailable");
    }
    rx
}

fn report_event(flags: &StandardOptions, event: CameraEvent) {
    match event {
        CameraEvent::Opened { backend, camera_id } => {
            info_user(flags, &format!("{backend:?} camera {camera_id} opened"));
        },
        CameraEvent::Streaming { backend } => {
            info_user(flags, &format!("{backend:?} preview streaming"));
        },
        CameraEvent::Closed { backend } => {
            info_user(flags, &format!("{backend:?} camera closed"));
        },
        CameraEvent::FrameDropped { .. } => {
            if flags.debug {
                eprintln!("DEBUG: frame dropped");
            }
        },
        CameraEvent::Warning { message, .. } => warn_user(flags, &message),
        CameraEvent::Error { error, .. } => warn_user(flags, &format!("camera error: {error}")),
    }
}

struct TerminalUi {
    verbose: bool,
    quit: Arc<AtomicBool>,
    denied: AtomicBool,
}

impl ViewerUi for TerminalUi {
    fn set_toggle_label(&self, label: &str) {
        if self.verbose {
            eprintln!("INFO: press t + Enter to {}", label.to_lowercase());
        }
    }

    fn set_fps_text(&self, text: &str) {
        eprintln!("{text}");
    }

    fn show_message(&self, message: &str) {
        self.denied.store(true, Ordering::SeqCst);
        eprintln!("ERROR: {message}");
    }

    fn finish(&self) {
        self.quit.store(true, Ordering::SeqCst);
    }
}
