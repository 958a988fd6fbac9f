//! Pulling package artifacts from a device into the artifact root.
//!
//! A failing package is recorded and the batch continues with the next one.

use std::path::Path;

use tracing::{error, info, instrument};

use crate::bridge::{Bridge, BridgeCommand, BridgeError};
use crate::error::{FleetError, Result};
use crate::progress::Reporter;
use crate::report::DownloadReport;
use crate::retry::RetryPolicy;

/// Download every artifact of every package from `device` into
/// `<root>/<package>/`.
#[instrument(skip(bridge, packages, reporter), fields(packages = packages.len()))]
pub async fn download_packages(
    bridge: &dyn Bridge,
    device: Option<&str>,
    packages: &[String],
    root: &Path,
    retry: RetryPolicy,
    reporter: &Reporter,
) -> Result<DownloadReport> {
    if packages.is_empty() {
        return Err(FleetError::EmptyPackageList);
    }

    let total = packages.len();
    let mut report = DownloadReport {
        total,
        ..DownloadReport::default()
    };
    reporter.begin(total as u64);
    reporter.line(format!("Downloading {total} package(s)..."));

    for package in packages {
        reporter.line(format!("{package}: downloading"));
        match download_package(bridge, device, package, root, retry, reporter).await {
            Ok(count) => {
                reporter.step(format!("{package}: {count} artifact(s) downloaded"));
                report.succeeded += 1;
            }
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                error!(package = %package, error = %e, "download failed");
                reporter.step(format!("{package}: FAILED: {e}"));
                report.failed.push(package.clone());
            }
        }
    }

    info!(
        succeeded = report.succeeded,
        failed = report.failed.len(),
        "download finished"
    );
    Ok(report)
}

async fn download_package(
    bridge: &dyn Bridge,
    device: Option<&str>,
    package: &str,
    root: &Path,
    retry: RetryPolicy,
    reporter: &Reporter,
) -> std::result::Result<usize, BridgeError> {
    let output = bridge
        .run(device, &BridgeCommand::package_path(package))
        .await?;
    let remote_paths = parse_package_paths(&output.stdout);

    let package_dir = std::path::absolute(root.join(package))?;
    std::fs::create_dir_all(&package_dir)?;

    for remote in &remote_paths {
        let file_name = remote.rsplit('/').next().unwrap_or(remote.as_str());
        reporter.line(format!("  {package}: pulling {file_name}"));

        let command = BridgeCommand::pull(remote, &package_dir);
        let command_ref = &command;
        retry
            .run_while(
                move |_| bridge.run(device, command_ref),
                |e: &BridgeError| !e.is_fatal(),
            )
            .await
            .outcome?;
    }
    Ok(remote_paths.len())
}

/// Extract remote artifact paths from `pm path` output (`package:<path>`).
pub fn parse_package_paths(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| line.trim().strip_prefix("package:"))
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(str::to_string)
        .collect()
}
