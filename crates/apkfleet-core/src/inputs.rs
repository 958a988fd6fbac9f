//! Loading of device and package inputs.
//!
//! Both loaders fail fast: a missing file or an empty result is a setup
//! error, reported before any device work starts.

use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::error::{FleetError, Result};
use crate::inventory::DeviceInfo;

/// Where the target device ids come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSource {
    /// Ids given directly.
    Explicit(Vec<String>),
    /// A device registry CSV previously written by `devices`.
    Registry(PathBuf),
}

impl DeviceSource {
    /// Resolve to a non-empty, duplicate-free list of device ids.
    ///
    /// First occurrence order is kept.
    pub fn resolve(&self) -> Result<Vec<String>> {
        let ids = match self {
            DeviceSource::Explicit(ids) => ids.clone(),
            DeviceSource::Registry(path) => read_registry_ids(path)?,
        };

        let devices = unique_device_ids(ids);
        if devices.is_empty() {
            error!(source = ?self, "no device ids resolved");
            return Err(FleetError::NoDevices);
        }
        debug!(count = devices.len(), "resolved devices");
        Ok(devices)
    }
}

/// Trim ids and drop blanks and repeats, keeping first-occurrence order.
pub fn unique_device_ids(ids: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut devices: Vec<String> = Vec::new();
    for id in ids {
        let id = id.trim();
        if !id.is_empty() && !devices.iter().any(|d| d == id) {
            devices.push(id.to_string());
        }
    }
    devices
}

fn read_registry_ids(path: &Path) -> Result<Vec<String>> {
    if !path.is_file() {
        error!(path = %path.display(), "device registry not found");
        return Err(FleetError::InputMissing {
            path: path.to_path_buf(),
        });
    }
    let mut reader = csv::Reader::from_path(path)?;
    let mut ids = Vec::new();
    for row in reader.deserialize::<DeviceInfo>() {
        ids.push(row?.device_id);
    }
    Ok(ids)
}

/// Read a package list: one name per line, blank lines ignored.
pub fn load_package_list(path: &Path) -> Result<Vec<String>> {
    if !path.is_file() {
        error!(path = %path.display(), "package list not found");
        return Err(FleetError::InputMissing {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    let packages = parse_package_list(&content);
    if packages.is_empty() {
        error!(path = %path.display(), "package list is empty");
        return Err(FleetError::EmptyPackageList);
    }
    Ok(packages)
}

/// Parse package list text into trimmed, non-blank names.
pub fn parse_package_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
