// This is free and unencumbered software released into the public domain.

//! Camera permission gate.

use std::path::{Path, PathBuf};

pub const CAMERA_PERMISSION_REQUEST_CODE: i32 = 200;

pub const CAMERA_PERMISSION_REQUIRED: &str = "Camera permission is required";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// Outcome of asking for permission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PermissionRequest {
    /// The answer arrives later through `EdgeViewer::on_permission_result`.
    Pending,
    /// The gate answered synchronously.
    Answered(Vec<PermissionStatus>),
}

pub trait PermissionGate: Send {
    fn check(&self) -> PermissionStatus;
    fn request(&mut self, request_code: i32) -> PermissionRequest;
}

/// True when the first grant of a non-empty result is `Granted`.
pub fn is_granted(grants: &[PermissionStatus]) -> bool {
    grants.first() == Some(&PermissionStatus::Granted)
}

/// A gate whose answer the host already knows.
#[derive(Clone, Debug)]
pub struct StaticPermissionGate {
    status: PermissionStatus,
    deferred: bool,
    requests: Vec<i32>,
}

impl StaticPermissionGate {
    pub fn granted() -> Self {
        Self::new(PermissionStatus::Granted)
    }

    pub fn denied() -> Self {
        Self::new(PermissionStatus::Denied)
    }

    pub fn new(status: PermissionStatus) -> Self {
        Self {
            status,
            deferred: false,
            requests: Vec::new(),
        }
    }

    /// Answer requests asynchronously, the way a system dialog does.
    pub fn deferred(mut self) -> Self {
        self.deferred = true;
        self
    }

    pub fn set(&mut self, status: PermissionStatus) {
        self.status = status;
    }

    pub fn requests(&self) -> &[i32] {
        &self.requests
    }
}

impl PermissionGate for StaticPermissionGate {
    fn check(&self) -> PermissionStatus {
        self.status
    }

    fn request(&mut self, request_code: i32) -> PermissionRequest {
        self.requests.push(request_code);
        if self.deferred {
            PermissionRequest::Pending
        } else {
            PermissionRequest::Answered(vec![self.status])
        }
    }
}

/// Grants access when the capture device node is readable and writable by
/// this process. Devices that are not filesystem nodes are always granted.
#[derive(Clone, Debug)]
pub struct DeviceAccessGate {
    path: Option<PathBuf>,
}

impl DeviceAccessGate {
    pub fn new(device: Option<&str>) -> Self {
        let path = device
            .map(|d| d.strip_prefix("file:").unwrap_or(d))
            .filter(|d| d.starts_with('/'))
            .map(PathBuf::from);
        Self { path }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl PermissionGate for DeviceAccessGate {
    fn check(&self) -> PermissionStatus {
        match &self.path {
            None => PermissionStatus::Granted,
            Some(path) if can_access(path) => PermissionStatus::Granted,
            Some(_) => PermissionStatus::Denied,
        }
    }

    fn request(&mut self, _request_code: i32) -> PermissionRequest {
        // There is no prompt for device nodes; report what we have.
        PermissionRequest::Answered(vec![self.check()])
    }
}

#[cfg(unix)]
fn can_access(path: &Path) -> bool {
    use std::os::unix::ffi::OsStrExt;
    let Ok(c_path) = std::ffi::CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    unsafe { libc::access(c_path.as_ptr(), libc::R_OK | libc::W_OK) == 0 }
}

#[cfg(not(unix))]
fn can_access(path: &Path) -> bool {
    path.exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_first_grant_counts() {
        assert!(is_granted(&[PermissionStatus::Granted]));
        assert!(is_granted(&[PermissionStatus::Granted, PermissionStatus::Denied]));
        assert!(!is_granted(&[PermissionStatus::Denied, PermissionStatus::Granted]));
        assert!(!is_granted(&[]));
    }

    #[test]
    fn deferred_gates_record_the_request_code() {
        let mut gate = StaticPermissionGate::denied().deferred();
        assert_eq!(
            gate.request(CAMERA_PERMISSION_REQUEST_CODE),
            PermissionRequest::Pending
        );
        assert_eq!(gate.requests(), &[CAMERA_PERMISSION_REQUEST_CODE]);
    }

    #[test]
    fn non_path_devices_are_granted() {
        assert!(DeviceAccessGate::new(Some("synthetic:")).path().is_none());
        assert_eq!(
            DeviceAccessGate::new(None).check(),
            PermissionStatus::Granted
        );
    }

    #[test]
    fn missing_device_nodes_are_denied() {
        let mut gate = DeviceAccessGate::new(Some("file:/nonexistent/video99"));
        assert_eq!(gate.path(), Some(Path::new("/nonexistent/video99")));
        assert_eq!(gate.check(), PermissionStatus::Denied);
        assert_eq!(
            gate.request(CAMERA_PERMISSION_REQUEST_CODE),
            PermissionRequest::Answered(vec![PermissionStatus::Denied])
        );
    }
}
