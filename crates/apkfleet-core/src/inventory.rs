//! Device and installed-package inventory.
//!
//! Produces the two inputs the installer consumes: the device registry CSV
//! and the package list file.

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::bridge::{Bridge, BridgeCommand};
use crate::error::Result;

/// Placeholder for properties the bridge did not report.
pub const UNKNOWN: &str = "N/A";

/// One row of the device registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_id: String,
    #[serde(default = "unknown")]
    pub model: String,
    #[serde(default = "unknown")]
    pub android_version: String,
}

fn unknown() -> String {
    UNKNOWN.to_string()
}

/// List devices in the `device` state via `devices -l`.
pub async fn list_devices(bridge: &dyn Bridge) -> Result<Vec<DeviceInfo>> {
    let output = bridge.run(None, &BridgeCommand::devices_long()).await?;
    let devices = parse_device_listing(&output.stdout);
    info!(count = devices.len(), "listed devices");
    Ok(devices)
}

/// Parse `devices -l` output.
///
/// The first line is the `List of devices attached` header. Daemon notices
/// start with `*`. Only rows whose state column is `device` are kept, so
/// `offline` and `unauthorized` devices are skipped.
pub fn parse_device_listing(stdout: &str) -> Vec<DeviceInfo> {
    stdout
        .lines()
        .skip(1)
        .filter(|line| !line.starts_with('*'))
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let device_id = parts.next()?;
            if parts.next()? != "device" {
                return None;
            }
            let props: Vec<&str> = parts.collect();
            Some(DeviceInfo {
                device_id: device_id.to_string(),
                model: property(&props, "model"),
                android_version: property(&props, "release"),
            })
        })
        .collect()
}

fn property(props: &[&str], key: &str) -> String {
    props
        .iter()
        .find_map(|prop| prop.strip_prefix(key)?.strip_prefix(':'))
        .map_or_else(unknown, str::to_string)
}

/// Write the device registry CSV (`device_id,model,android_version`).
pub fn write_device_registry(path: &Path, devices: &[DeviceInfo]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    if devices.is_empty() {
        writer.write_record(["device_id", "model", "android_version"])?;
    }
    for device in devices {
        writer.serialize(device)?;
    }
    writer.flush()?;
    Ok(())
}

/// List third-party packages installed on `device`.
pub async fn list_installed_packages(
    bridge: &dyn Bridge,
    device: Option<&str>,
) -> Result<Vec<String>> {
    let output = bridge
        .run(device, &BridgeCommand::list_third_party_packages())
        .await?;
    let packages = parse_package_listing(&output.stdout);
    info!(count = packages.len(), "listed installed packages");
    Ok(packages)
}

/// Parse `pm list packages -f` output.
///
/// Lines look like `package:/data/app/~~x==/com.example-y==/base.apk=com.example`;
/// the package name follows the last `=`.
pub fn parse_package_listing(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| line.rsplit('=').next())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Write one package name per line.
pub fn write_package_list(path: &Path, packages: &[String]) -> Result<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    for package in packages {
        writeln!(file, "{package}")?;
    }
    file.flush()?;
    Ok(())
}
