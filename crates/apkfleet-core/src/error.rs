//! Error taxonomy for fleet operations.
//!
//! Only setup and fatal errors are represented here. Per-unit failures
//! (a package that could not be resolved or installed) are data in
//! [`crate::report::DeviceResult`], never errors.

use std::path::PathBuf;

use crate::bridge::BridgeError;

/// Errors that abort a whole fleet operation.
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    #[error("no device ids were resolved")]
    NoDevices,

    #[error("package list is empty")]
    EmptyPackageList,

    #[error("input file not found: {}", .path.display())]
    InputMissing { path: PathBuf },

    #[error("device registry error: {0}")]
    Registry(#[from] csv::Error),

    #[error("bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("device task failed: {0}")]
    TaskFailed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for fleet operations.
pub type Result<T> = std::result::Result<T, FleetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fleet_error_display() {
        let err = FleetError::InputMissing {
            path: PathBuf::from("packages.txt"),
        };
        assert_eq!(err.to_string(), "input file not found: packages.txt");

        assert!(FleetError::NoDevices.to_string().contains("no device"));
        assert!(FleetError::EmptyPackageList.to_string().contains("empty"));
    }

    #[test]
    fn test_bridge_error_converts() {
        let err: FleetError = BridgeError::ExecutableNotFound {
            executable: "adb".to_string(),
        }
        .into();
        assert!(err.to_string().contains("bridge executable not found"));
    }
}
