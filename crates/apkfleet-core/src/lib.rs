//! apkfleet core library
//!
//! Installs APK packages on many adb-connected devices at once:
//! - Runs typed `adb` commands without a shell
//! - Resolves packages to local artifacts under `apks/<package>/`
//! - Retries each install with a fixed delay
//! - Fans devices out over a bounded tokio task pool and aggregates results

pub mod artifacts;
pub mod bridge;
pub mod config;
pub mod download;
pub mod error;
pub mod fakes;
pub mod installer;
pub mod inputs;
pub mod inventory;
pub mod orchestrator;
pub mod progress;
pub mod report;
pub mod retry;
pub mod telemetry;

// Re-export key types
pub use artifacts::{ApkDirectory, ArtifactResolver, Resolution};
pub use bridge::{AdbBridge, Bridge, BridgeCommand, BridgeError, CommandOutput, InstallOptions};
pub use config::FleetConfig;
pub use download::download_packages;
pub use error::{FleetError, Result};
pub use inputs::{load_package_list, DeviceSource};
pub use installer::DeviceInstaller;
pub use inventory::{
    list_devices, list_installed_packages, write_device_registry, write_package_list, DeviceInfo,
};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use progress::{Reporter, UnitOutcome};
pub use report::{AggregateReport, DeviceResult, DownloadReport};
pub use retry::{Attempted, RetryPolicy};
pub use telemetry::init_tracing;

/// apkfleet version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
