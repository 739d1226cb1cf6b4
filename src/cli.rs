// This is free and unencumbered software released into the public domain.

//! CLI helpers: argument parsers, user-facing diagnostics and exit codes.
//!
//! The parsers compile without the `cli` feature so the library can be
//! built for hosts that only use the C ABI.

use std::path::PathBuf;

#[cfg(feature = "cli")]
use crate::shared::CameraError;

#[cfg(feature = "cli")]
use asimov_module::SysexitsError::{self, *};

#[cfg(feature = "cli")]
use clientele::StandardOptions;

/// Where the viewer sends processed frames.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputSpec {
    /// Concatenated JPEGs on stdout.
    Mjpeg,
    /// The latest frame in a file.
    Snapshot(PathBuf),
    /// Discard frames.
    Null,
}

pub fn parse_output(s: &str) -> Result<OutputSpec, String> {
    match s.trim() {
        "mjpeg" | "-" => Ok(OutputSpec::Mjpeg),
        "null" | "none" => Ok(OutputSpec::Null),
        other => match other.strip_prefix("snapshot=") {
            Some(path) if !path.is_empty() => Ok(OutputSpec::Snapshot(PathBuf::from(path))),
            _ => Err(format!(
                "invalid output `{other}`: expected mjpeg, null or snapshot=PATH"
            )),
        },
    }
}

pub fn parse_dimensions(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("invalid size `{s}`: expected WIDTHxHEIGHT"))?;
    let w: u32 = w.trim().parse().map_err(|_| format!("invalid width in `{s}`"))?;
    let h: u32 = h.trim().parse().map_err(|_| format!("invalid height in `{s}`"))?;
    if w == 0 || h == 0 {
        return Err(format!("invalid size `{s}`: dimensions must be non-zero"));
    }
    Ok((w, h))
}

pub fn parse_frequency(s: &str) -> Result<f64, String> {
    let s = s.trim();
    let s = s
        .strip_suffix("fps")
        .or_else(|| s.strip_suffix("Hz"))
        .unwrap_or(s)
        .trim();
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(format!("invalid frequency `{s}`: expected a positive number")),
    }
}

#[cfg(feature = "cli")]
pub fn handle_error(err: &CameraError, flags: &StandardOptions) -> SysexitsError {
    #[cfg(feature = "tracing")]
    {
        asimov_module::tracing::error!(target: "edge_viewer", %err, "command failed");
        if flags.debug || flags.verbose >= 2 {
            asimov_module::tracing::debug!(target: "edge_viewer", ?err, "detailed error");
        }
    }

    report_error(err, flags);
    exit_code(err)
}

#[cfg(feature = "cli")]
pub fn info_user(flags: &StandardOptions, msg: &str) {
    if flags.debug || flags.verbose >= 1 {
        eprintln!("INFO: {msg}");
    }

    #[cfg(feature = "tracing")]
    asimov_module::tracing::info!(target: "edge_viewer", "{msg}");
}

#[cfg(feature = "cli")]
pub fn warn_user(flags: &StandardOptions, msg: &str) {
    if flags.debug || flags.verbose >= 1 {
        eprintln!("WARN: {msg}");
    }

    #[cfg(feature = "tracing")]
    asimov_module::tracing::warn!(target: "edge_viewer", "{msg}");
}

#[cfg(feature = "cli")]
fn report_error(err: &CameraError, flags: &StandardOptions) {
    use std::error::Error as _;
    use std::io::Write;

    let mut stderr = std::io::stderr();
    let _ = writeln!(stderr, "ERROR: {err}");

    if flags.debug || flags.verbose >= 2 {
        let mut source = err.source();
        while let Some(cause) = source {
            let _ = writeln!(stderr, "  Caused by: {cause}");
            source = cause.source();
        }
    }
}

#[cfg(feature = "cli")]
pub fn exit_code(err: &CameraError) -> SysexitsError {
    match err {
        CameraError::NoDriver => EX_UNAVAILABLE,
        CameraError::NoCamera => EX_UNAVAILABLE,
        CameraError::PermissionDenied => EX_NOPERM,
        CameraError::NotConfigured => EX_CONFIG,
        CameraError::InvalidConfig(_) => EX_USAGE,
        CameraError::Unsupported(_) => EX_UNAVAILABLE,
        CameraError::Closed => EX_IOERR,
        CameraError::Processing(_) => EX_DATAERR,
        CameraError::DriverError { .. } => EX_SOFTWARE,
        CameraError::Other(_) => EX_SOFTWARE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_specs() {
        assert_eq!(parse_output("mjpeg"), Ok(OutputSpec::Mjpeg));
        assert_eq!(parse_output("null"), Ok(OutputSpec::Null));
        assert_eq!(
            parse_output("snapshot=/tmp/x.jpg"),
            Ok(OutputSpec::Snapshot(PathBuf::from("/tmp/x.jpg")))
        );
        assert!(parse_output("snapshot=").is_err());
        assert!(parse_output("window").is_err());
    }

    #[test]
    fn dimensions_and_frequencies() {
        assert_eq!(parse_dimensions("1920x1080"), Ok((1920, 1080)));
        assert_eq!(parse_dimensions(" 640X480 "), Ok((640, 480)));
        assert!(parse_dimensions("640").is_err());
        assert!(parse_dimensions("0x480").is_err());

        assert_eq!(parse_frequency("30"), Ok(30.0));
        assert_eq!(parse_frequency("15fps"), Ok(15.0));
        assert_eq!(parse_frequency("2.5 Hz"), Ok(2.5));
        assert!(parse_frequency("-1").is_err());
        assert!(parse_frequency("fast").is_err());
    }

    #[cfg(feature = "cli")]
    #[test]
    fn permission_errors_exit_with_noperm() {
        assert!(matches!(exit_code(&CameraError::PermissionDenied), EX_NOPERM));
        assert!(matches!(exit_code(&CameraError::invalid_config("x")), EX_USAGE));
    }
}
