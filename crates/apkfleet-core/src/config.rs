//! Runtime settings shared by every fleet command.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::artifacts::{ApkDirectory, DEFAULT_ARTIFACT_ROOT};
use crate::bridge::AdbBridge;
use crate::orchestrator::OrchestratorConfig;
use crate::telemetry::DEFAULT_LOG_FILE;

/// Default bridge executable, looked up on `PATH`.
pub const DEFAULT_BRIDGE_EXECUTABLE: &str = "adb";

/// Fleet-wide configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetConfig {
    /// Bridge executable name or path.
    pub bridge_executable: String,
    /// Root of the `<package>/*.apk` layout.
    pub artifact_root: PathBuf,
    /// Append-only diagnostic log; `None` disables it.
    pub log_file: Option<PathBuf>,
    /// Install fan-out settings.
    pub install: OrchestratorConfig,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            bridge_executable: DEFAULT_BRIDGE_EXECUTABLE.to_string(),
            artifact_root: PathBuf::from(DEFAULT_ARTIFACT_ROOT),
            log_file: Some(PathBuf::from(DEFAULT_LOG_FILE)),
            install: OrchestratorConfig::default(),
        }
    }
}

impl FleetConfig {
    pub fn bridge(&self) -> AdbBridge {
        AdbBridge::new(self.bridge_executable.clone())
    }

    pub fn resolver(&self) -> ApkDirectory {
        ApkDirectory::new(self.artifact_root.clone())
    }
}
