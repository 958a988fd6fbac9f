//! Parallel installation across many devices.
//!
//! One tokio task per device, at most `concurrency_limit` running at once.
//! Each task owns its [`DeviceResult`] and hands it back through its join
//! handle; nothing is collected through shared mutable state. Device tasks
//! never affect each other except through a fatal error, which closes the
//! semaphore so queued devices are not started.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{error, info, instrument};

use crate::artifacts::ArtifactResolver;
use crate::bridge::{Bridge, InstallOptions};
use crate::error::{FleetError, Result};
use crate::inputs::{load_package_list, unique_device_ids, DeviceSource};
use crate::installer::DeviceInstaller;
use crate::progress::Reporter;
use crate::report::{AggregateReport, DeviceResult};
use crate::retry::RetryPolicy;

/// Device tasks allowed to run at once when not configured otherwise.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Configuration for a fleet installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum concurrent device tasks (0 is treated as 1).
    pub concurrency_limit: usize,
    /// Retry applied to each package install.
    pub retry: RetryPolicy,
    /// Flags for every install invocation.
    pub options: InstallOptions,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
            options: InstallOptions::default(),
        }
    }
}

/// Fans package installation out across devices.
pub struct Orchestrator {
    bridge: Arc<dyn Bridge>,
    resolver: Arc<dyn ArtifactResolver>,
    reporter: Arc<Reporter>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        bridge: Arc<dyn Bridge>,
        resolver: Arc<dyn ArtifactResolver>,
        reporter: Arc<Reporter>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            bridge,
            resolver,
            reporter,
            config,
        }
    }

    /// Resolve devices and packages from their sources, then install.
    pub async fn install_from(
        &self,
        devices: &DeviceSource,
        package_list: &Path,
    ) -> Result<AggregateReport> {
        let devices = devices.resolve()?;
        let packages = load_package_list(package_list)?;
        self.install_across(devices, packages).await
    }

    /// Install every package on every device.
    ///
    /// Device ids are de-duplicated first, so each device runs once. Waits for all device tasks. Per-package failures end up in the report;
    /// only setup errors and fatal bridge errors are returned as `Err`.
    #[instrument(skip_all, fields(devices = devices.len(), packages = packages.len()))]
    pub async fn install_across(
        &self,
        devices: Vec<String>,
        packages: Vec<String>,
    ) -> Result<AggregateReport> {
        let devices = unique_device_ids(devices);
        if devices.is_empty() {
            return Err(FleetError::NoDevices);
        }
        if packages.is_empty() {
            return Err(FleetError::EmptyPackageList);
        }

        let limit = self.config.concurrency_limit.max(1);
        let total_devices = devices.len();
        let packages: Arc<[String]> = packages.into();

        self.reporter.begin((total_devices * packages.len()) as u64);
        self.reporter.line(format!(
            "Installing {} package(s) on {} device(s), {} at a time...",
            packages.len(),
            total_devices,
            limit
        ));
        info!(limit, "starting fleet install");

        let installer = DeviceInstaller::new(
            Arc::clone(&self.bridge),
            Arc::clone(&self.resolver),
            Arc::clone(&self.reporter),
        )
        .with_retry(self.config.retry)
        .with_options(self.config.options);

        // Semaphore enforces concurrency_limit
        let sem = Arc::new(Semaphore::new(limit));
        let mut tasks = Vec::with_capacity(total_devices);

        for (index, device) in devices.into_iter().enumerate() {
            let installer = installer.clone();
            let packages = Arc::clone(&packages);
            let reporter = Arc::clone(&self.reporter);
            let sem = Arc::clone(&sem);

            let task = tokio::spawn(async move {
                // A closed semaphore means a sibling hit a fatal error.
                let Ok(_permit) = Arc::clone(&sem).acquire_owned().await else {
                    return Ok(None);
                };

                reporter.line(format!(
                    "[device {}/{}] {device}: installing",
                    index + 1,
                    total_devices
                ));
                let result = installer.install_all(&device, &packages).await;
                if result.is_err() {
                    sem.close();
                }
                result.map(Some)
            });
            tasks.push(task);
        }

        let joined = futures::future::join_all(tasks).await;

        let mut results: Vec<DeviceResult> = Vec::with_capacity(total_devices);
        let mut fatal: Option<FleetError> = None;
        for outcome in joined {
            match outcome {
                Ok(Ok(Some(result))) => results.push(result),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    fatal.get_or_insert(e);
                }
                Err(join_err) => {
                    fatal.get_or_insert(FleetError::TaskFailed(join_err.to_string()));
                }
            }
        }

        if let Some(e) = fatal {
            error!(error = %e, "fleet install aborted");
            return Err(e);
        }

        let report = AggregateReport::from_results(results);
        info!(
            succeeded = report.succeeded_count(),
            failed = report.failed_count(),
            "fleet install finished"
        );
        Ok(report)
    }
}
