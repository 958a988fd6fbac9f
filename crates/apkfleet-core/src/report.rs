//! Per-device and aggregate installation results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Packages that failed on one device, in processing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceResult {
    pub device: String,
    pub failed_packages: Vec<String>,
}

impl DeviceResult {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            failed_packages: Vec::new(),
        }
    }

    pub fn record_failure(&mut self, package: impl Into<String>) {
        self.failed_packages.push(package.into());
    }

    /// Whether every package installed.
    pub fn succeeded(&self) -> bool {
        self.failed_packages.is_empty()
    }
}

/// Outcome of one orchestration run across all devices.
///
/// Every input device lands in exactly one of `succeeded` or `failed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub total_devices: usize,
    /// Devices with no failed package, in input order.
    pub succeeded: Vec<String>,
    /// Device → failed packages in processing order.
    pub failed: BTreeMap<String, Vec<String>>,
}

impl AggregateReport {
    /// Merge device results, keeping the order they are given in.
    pub fn from_results(results: impl IntoIterator<Item = DeviceResult>) -> Self {
        let mut report = Self::default();
        for result in results {
            report.merge(result);
        }
        report
    }

    /// Add one device's result.
    pub fn merge(&mut self, result: DeviceResult) {
        self.total_devices += 1;
        if result.succeeded() {
            self.succeeded.push(result.device);
        } else {
            self.failed.insert(result.device, result.failed_packages);
        }
    }

    pub fn succeeded_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// Whether every package installed on every device.
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    /// Human-readable completion summary.
    pub fn render_summary(&self) -> String {
        let mut out = format!(
            "Done: {}/{} devices succeeded\n",
            self.succeeded_count(),
            self.total_devices
        );
        if !self.failed.is_empty() {
            out.push_str("\nFailed devices and packages:\n");
            for (device, packages) in &self.failed {
                out.push_str(&format!("  device {device}:\n"));
                for package in packages {
                    out.push_str(&format!("    - {package}\n"));
                }
            }
        }
        out
    }
}

/// Outcome of downloading a batch of packages from one device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: Vec<String>,
}

impl DownloadReport {
    pub fn render_summary(&self) -> String {
        let mut out = format!("Done: {}/{} packages downloaded\n", self.succeeded, self.total);
        if !self.failed.is_empty() {
            out.push_str("Failed packages:\n");
            for package in &self.failed {
                out.push_str(&format!("  - {package}\n"));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(device: &str, packages: &[&str]) -> DeviceResult {
        DeviceResult {
            device: device.to_string(),
            failed_packages: packages.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_every_device_lands_in_one_bucket() {
        let report = AggregateReport::from_results([
            DeviceResult::new("A"),
            failed("B", &["pkg2"]),
            DeviceResult::new("C"),
        ]);

        assert_eq!(report.total_devices, 3);
        assert_eq!(report.succeeded, ["A", "C"]);
        assert_eq!(report.failed["B"], ["pkg2"]);
        assert_eq!(
            report.succeeded_count() + report.failed_count(),
            report.total_devices
        );
        assert!(!report.all_succeeded());
    }

    #[test]
    fn test_summary_lists_failed_packages() {
        let report = AggregateReport::from_results([failed("B", &["pkg2", "pkg5"])]);
        let summary = report.render_summary();
        assert!(summary.starts_with("Done: 0/1 devices succeeded"));
        assert!(summary.contains("  device B:\n    - pkg2\n    - pkg5\n"));
    }

    #[test]
    fn test_summary_without_failures_is_one_line() {
        let report = AggregateReport::from_results([DeviceResult::new("A")]);
        assert_eq!(report.render_summary(), "Done: 1/1 devices succeeded\n");
    }

    #[test]
    fn test_report_json_fields() {
        let report = AggregateReport::from_results([failed("A", &["pkg"])]);
        let value = serde_json::to_value(&report).unwrap();
        let obj = value.as_object().unwrap();
        for key in ["total_devices", "succeeded", "failed"] {
            assert!(obj.contains_key(key), "missing key: {key}");
        }
    }
}
