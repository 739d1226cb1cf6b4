// This is free and unencumbered software released into the public domain.

//! Enumeration of the capture devices the ffmpeg backend can read from.

use crate::shared::CameraError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub is_usb: bool,
}

/// Lists video devices, USB devices first.
pub fn list_video_devices() -> Result<Vec<DeviceInfo>, CameraError> {
    let mut devices = platform_devices()?;
    devices.sort_by_key(|d| !d.is_usb);
    Ok(devices)
}

pub fn default_device_fallback() -> String {
    cfg_if::cfg_if! {
        if #[cfg(target_os = "macos")] {
            "avf:0".to_string()
        } else if #[cfg(target_os = "windows")] {
            "dshow:video=default".to_string()
        } else if #[cfg(target_os = "linux")] {
            "file:/dev/video0".to_string()
        } else {
            String::new()
        }
    }
}

#[cfg(target_os = "linux")]
fn platform_devices() -> Result<Vec<DeviceInfo>, CameraError> {
    use std::{fs, path::Path};

    let base = Path::new("/sys/class/video4linux");
    let rd = match fs::read_dir(base) {
        Ok(v) => v,
        Err(_) => return Ok(Vec::new()),
    };

    let mut indices: Vec<u32> = rd
        .flatten()
        .filter_map(|e| {
            let name = e.file_name().to_str()?.to_string();
            name.strip_prefix("video")?.parse().ok()
        })
        .collect();
    indices.sort_unstable();

    let mut out = Vec::new();
    for idx in indices {
        let devnode = format!("/dev/video{idx}");
        if !Path::new(&devnode).exists() {
            continue;
        }
        let entry = base.join(format!("video{idx}"));
        let name = fs::read_to_string(entry.join("name"))
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| devnode.clone());
        out.push(DeviceInfo {
            id: format!("file:{devnode}"),
            name,
            is_usb: sysfs_entry_is_usb(&entry),
        });
    }
    Ok(out)
}

#[cfg(target_os = "linux")]
fn sysfs_entry_is_usb(entry: &std::path::Path) -> bool {
    let device_link = entry.join("device");
    let Ok(mut p) = std::fs::read_link(&device_link) else {
        return false;
    };
    if !p.is_absolute() {
        p = entry.join(p);
    }
    if let Ok(canon) = p.canonicalize() {
        p = canon;
    }
    p.to_string_lossy().contains("/usb")
}

#[cfg(any(target_os = "macos", target_os = "windows"))]
fn platform_devices() -> Result<Vec<DeviceInfo>, CameraError> {
    use std::process::Command;

    #[cfg(target_os = "macos")]
    let args = ["-hide_banner", "-f", "avfoundation", "-list_devices", "true", "-i", ""];
    #[cfg(target_os = "windows")]
    let args = ["-hide_banner", "-f", "dshow", "-list_devices", "true", "-i", "dummy"];

    let out = Command::new("ffmpeg")
        .args(args)
        .output()
        .map_err(|e| CameraError::driver("running ffmpeg -list_devices", e))?;
    let stderr = String::from_utf8_lossy(&out.stderr);

    #[cfg(target_os = "macos")]
    return Ok(parse_avfoundation_listing(&stderr));
    #[cfg(target_os = "windows")]
    return Ok(parse_dshow_listing(&stderr));
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn platform_devices() -> Result<Vec<DeviceInfo>, CameraError> {
    Ok(Vec::new())
}

/// Parses `ffmpeg -f avfoundation -list_devices true` output.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
pub(crate) fn parse_avfoundation_listing(s: &str) -> Vec<DeviceInfo> {
    let mut devices = Vec::new();
    let mut in_video = false;

    for line in s.lines() {
        if line.contains("AVFoundation video devices:") {
            in_video = true;
            continue;
        }
        if line.contains("AVFoundation audio devices:") {
            break;
        }
        if !in_video {
            continue;
        }

        // "[AVFoundation indev @ 0x...] [0] FaceTime HD Camera"
        let Some(pos) = line.find("] [") else { continue };
        let tail = &line[pos + 2..];
        let Some(end) = tail.find(']') else { continue };
        let Ok(index) = tail[1..end].trim().parse::<u32>() else {
            continue;
        };
        let name = tail[end + 1..].trim();
        if name.is_empty() {
            continue;
        }
        let lower = name.to_lowercase();
        devices.push(DeviceInfo {
            id: format!("avf:{index}"),
            name: name.to_string(),
            is_usb: lower.contains("usb") || lower.contains("webcam"),
        });
    }
    devices
}

/// Parses `ffmpeg -f dshow -list_devices true` output.
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
pub(crate) fn parse_dshow_listing(s: &str) -> Vec<DeviceInfo> {
    let mut out = Vec::new();
    let mut in_video = false;

    for line in s.lines() {
        if line.contains("DirectShow video devices") {
            in_video = true;
            continue;
        }
        if in_video && line.contains("DirectShow audio devices") {
            break;
        }
        if !in_video || line.contains("Alternative name") {
            continue;
        }

        // Device names are the first double-quoted string on the line.
        let Some(start) = line.find('"') else { continue };
        let rest = &line[start + 1..];
        let Some(end) = rest.find('"') else { continue };
        let name = &rest[..end];
        if name.is_empty() {
            continue;
        }
        let lower = name.to_lowercase();
        out.push(DeviceInfo {
            id: format!("dshow:video={name}"),
            name: name.to_string(),
            is_usb: lower.contains("usb") || lower.contains("webcam"),
        });
    }
    out
}
