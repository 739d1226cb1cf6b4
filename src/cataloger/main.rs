// This is free and unencumbered software released into the public domain.

#[cfg(not(feature = "std"))]
compile_error!("edge-viewer-cataloger requires the 'std' feature");

use asimov_module::SysexitsError::{self, *};
use clap::Parser;
use clientele::StandardOptions;
use edge_viewer::{
    cli::{handle_error, info_user, warn_user},
    shared::{CameraError, DeviceInfo, drivers::synthetic::SYNTHETIC_CAMERA_ID, list_video_devices},
};
use serde_json::json;
use std::error::Error as StdError;

#[derive(Debug, Parser)]
struct Options {
    #[clap(flatten)]
    flags: StandardOptions,

    #[arg(
        value_name = "FORMAT",
        short = 'o',
        long = "output",
        value_enum,
        default_value = "text"
    )]
    output: OutputFormat,

    /// Also list the built-in test-pattern camera.
    #[arg(long)]
    synthetic: bool,
}

#[derive(Debug, Clone, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Jsonl,
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

    let exit_code = match run_cataloger(&options) {
        Ok(()) => EX_OK,
        Err(err) => handle_error(&err, &options.flags),
    };

    Ok(exit_code)
}

fn run_cataloger(options: &Options) -> Result<(), CameraError> {
    info_user(&options.flags, "enumerating camera devices");

    // Already USB-first, which is also the viewer's preference order.
    let mut devices = list_video_devices()?;
    if options.synthetic {
        devices.push(DeviceInfo {
            id: format!("synthetic:{SYNTHETIC_CAMERA_ID}"),
            name: "Synthetic test pattern".into(),
            is_usb: false,
        });
    }
    if devices.is_empty() {
        warn_user(&options.flags, "no camera devices found");
        return Ok(());
    }

    for d in devices {
        match options.output {
            OutputFormat::Text => {
                let tag = if d.is_usb { " [usb]" } else { "" };
                println!("{}\t{}{tag}", d.id, d.name);
            },
            OutputFormat::Jsonl => {
                println!("{}", json!({ "id": d.id, "name": d.name, "usb": d.is_usb }));
            },
        }
    }

    Ok(())
}
