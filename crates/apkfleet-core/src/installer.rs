//! Sequential installation of a package list onto one device.

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::artifacts::{ArtifactResolver, Resolution};
use crate::bridge::{Bridge, BridgeCommand, BridgeError, InstallOptions, SDK_VERSION_PROP};
use crate::error::Result;
use crate::progress::{Reporter, UnitOutcome};
use crate::report::DeviceResult;
use crate::retry::RetryPolicy;

/// Installs packages onto a single device, one at a time, in list order.
///
/// Cheap to clone; the orchestrator hands one clone to every device task.
#[derive(Clone)]
pub struct DeviceInstaller {
    bridge: Arc<dyn Bridge>,
    resolver: Arc<dyn ArtifactResolver>,
    reporter: Arc<Reporter>,
    retry: RetryPolicy,
    options: InstallOptions,
}

impl DeviceInstaller {
    pub fn new(
        bridge: Arc<dyn Bridge>,
        resolver: Arc<dyn ArtifactResolver>,
        reporter: Arc<Reporter>,
    ) -> Self {
        Self {
            bridge,
            resolver,
            reporter,
            retry: RetryPolicy::default(),
            options: InstallOptions::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_options(mut self, options: InstallOptions) -> Self {
        self.options = options;
        self
    }

    /// Install every package onto `device`.
    ///
    /// Per-package failures are recorded in the returned [`DeviceResult`] and
    /// processing moves on. Only a fatal bridge error (missing executable)
    /// is returned as `Err`.
    #[instrument(skip(self, packages), fields(packages = packages.len()))]
    pub async fn install_all(&self, device: &str, packages: &[String]) -> Result<DeviceResult> {
        self.probe_sdk_version(device).await?;

        let mut result = DeviceResult::new(device);
        for package in packages {
            let outcome = self.install_package(device, package).await?;
            if matches!(outcome, UnitOutcome::Failed { .. }) {
                result.record_failure(package.as_str());
            }
            self.reporter.unit_completed(device, package, &outcome);
        }

        info!(failed = result.failed_packages.len(), "device finished");
        Ok(result)
    }

    async fn probe_sdk_version(&self, device: &str) -> Result<()> {
        match self
            .bridge
            .run(Some(device), &BridgeCommand::getprop(SDK_VERSION_PROP))
            .await
        {
            Ok(output) => match output.stdout.trim().parse::<u32>() {
                Ok(sdk) => debug!(sdk, "device sdk version"),
                Err(_) => warn!(raw = %output.stdout.trim(), "unparseable sdk version"),
            },
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => warn!(error = %e, "could not read sdk version"),
        }
        Ok(())
    }

    async fn install_package(&self, device: &str, package: &str) -> Result<UnitOutcome> {
        let resolution = match self.resolver.resolve(package) {
            Ok(resolution) => resolution,
            Err(e) => {
                warn!(package = %package, error = %e, "cannot read package artifacts");
                return Ok(UnitOutcome::Failed {
                    reason: format!("cannot read package artifacts: {e}"),
                });
            }
        };

        let artifacts = match resolution {
            Resolution::Found(artifacts) => artifacts,
            unresolved => {
                warn!(package = %package, diagnostic = %unresolved, "no artifacts to install");
                return Ok(UnitOutcome::Failed {
                    reason: unresolved.to_string(),
                });
            }
        };

        let command = BridgeCommand::install_multiple(&artifacts, self.options);
        let bridge = &self.bridge;
        let command_ref = &command;
        let attempted = self
            .retry
            .run_while(
                move |attempt| async move {
                    debug!(package = %package, attempt, "install attempt");
                    bridge.run(Some(device), command_ref).await
                },
                |e: &BridgeError| !e.is_fatal(),
            )
            .await;

        match attempted.outcome {
            Ok(_) => Ok(UnitOutcome::Installed {
                attempts: attempted.attempts,
            }),
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e) => {
                error!(
                    package = %package,
                    attempts = attempted.attempts,
                    error = %e,
                    "install failed, giving up"
                );
                Ok(UnitOutcome::Failed {
                    reason: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeArtifacts, ScriptedBridge};
    use crate::progress::SharedBuffer;
    use std::time::Duration;

    fn packages(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn installer(bridge: &Arc<ScriptedBridge>, artifacts: FakeArtifacts) -> DeviceInstaller {
        DeviceInstaller::new(
            Arc::clone(bridge) as Arc<dyn Bridge>,
            Arc::new(artifacts),
            Arc::new(Reporter::silent()),
        )
        .with_retry(RetryPolicy::new(3, Duration::from_millis(1)))
    }

    #[tokio::test]
    async fn test_packages_install_in_order() {
        let bridge = Arc::new(ScriptedBridge::new());
        let artifacts = FakeArtifacts::new()
            .with_package("pkg.a", &["/apks/pkg.a/base.apk"])
            .with_package("pkg.b", &["/apks/pkg.b/base.apk"])
            .with_package("pkg.c", &["/apks/pkg.c/base.apk"]);

        let result = installer(&bridge, artifacts)
            .install_all("A", &packages(&["pkg.c", "pkg.a", "pkg.b"]))
            .await
            .unwrap();

        assert!(result.succeeded());
        let order: Vec<_> = bridge
            .install_calls("A")
            .iter()
            .map(|args| args.last().cloned().unwrap())
            .collect();
        assert_eq!(
            order,
            [
                "/apks/pkg.c/base.apk",
                "/apks/pkg.a/base.apk",
                "/apks/pkg.b/base.apk"
            ]
        );
    }

    #[tokio::test]
    async fn test_unresolved_package_is_not_retried() {
        let bridge = Arc::new(ScriptedBridge::new());
        let artifacts = FakeArtifacts::new()
            .with_missing_dir("pkg.missing")
            .with_empty_dir("pkg.empty");

        let result = installer(&bridge, artifacts)
            .install_all("A", &packages(&["pkg.missing", "pkg.empty"]))
            .await
            .unwrap();

        assert_eq!(result.failed_packages, ["pkg.missing", "pkg.empty"]);
        assert!(bridge.install_calls("A").is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_retries_continue_with_next_package() {
        let bridge = Arc::new(ScriptedBridge::new());
        bridge.fail_installs("A", "pkg.bad", u32::MAX);
        let artifacts = FakeArtifacts::new()
            .with_package("pkg.bad", &["/apks/pkg.bad/base.apk"])
            .with_package("pkg.good", &["/apks/pkg.good/base.apk"]);

        let result = installer(&bridge, artifacts)
            .install_all("A", &packages(&["pkg.bad", "pkg.good"]))
            .await
            .unwrap();

        assert_eq!(result.failed_packages, ["pkg.bad"]);
        assert_eq!(bridge.install_attempts("A", "pkg.bad"), 3);
        assert_eq!(bridge.install_attempts("A", "pkg.good"), 1);
    }

    #[tokio::test]
    async fn test_progress_counts_each_unit_once() {
        let bridge = Arc::new(ScriptedBridge::new());
        bridge.fail_installs("A", "pkg.flaky", 2);
        let artifacts = FakeArtifacts::new()
            .with_package("pkg.flaky", &["/apks/pkg.flaky/base.apk"])
            .with_missing_dir("pkg.gone");
        let buffer = SharedBuffer::new();
        let reporter = Arc::new(Reporter::new(buffer.clone()));
        reporter.begin(2);

        let installer = DeviceInstaller::new(
            Arc::clone(&bridge) as Arc<dyn Bridge>,
            Arc::new(artifacts),
            Arc::clone(&reporter),
        )
        .with_retry(RetryPolicy::new(3, Duration::from_millis(1)));

        let result = installer
            .install_all("A", &packages(&["pkg.flaky", "pkg.gone"]))
            .await
            .unwrap();

        assert_eq!(result.failed_packages, ["pkg.gone"]);
        assert_eq!(bridge.install_attempts("A", "pkg.flaky"), 3);
        assert_eq!(reporter.completed(), 2);
        let out = buffer.contents();
        assert!(out.contains("[1/2] A: pkg.flaky installed after 3 attempts"));
        assert!(out.contains("[2/2] A: pkg.gone FAILED: package directory not found"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bridge_lost_mid_run_is_not_retried() {
        // The SDK probe succeeds, then the executable disappears.
        let bridge = Arc::new(ScriptedBridge::new().loses_executable_after(1));
        let artifacts = FakeArtifacts::new().with_package("pkg.a", &["/apks/pkg.a/base.apk"]);
        let installer = installer(&bridge, artifacts)
            .with_retry(RetryPolicy::new(3, Duration::from_secs(1)));

        let start = tokio::time::Instant::now();
        let err = installer
            .install_all("A", &packages(&["pkg.a"]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            crate::error::FleetError::Bridge(BridgeError::ExecutableNotFound { .. })
        ));
        assert_eq!(bridge.calls_started(), 2);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_grant_permissions_flag_reaches_bridge() {
        let bridge = Arc::new(ScriptedBridge::new());
        let artifacts = FakeArtifacts::new().with_package(
            "pkg.split",
            &["/apks/pkg.split/base.apk", "/apks/pkg.split/split_en.apk"],
        );

        installer(&bridge, artifacts)
            .with_options(InstallOptions {
                grant_permissions: true,
            })
            .install_all("A", &packages(&["pkg.split"]))
            .await
            .unwrap();

        let calls = bridge.install_calls("A");
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0],
            [
                "install-multiple",
                "-r",
                "-g",
                "/apks/pkg.split/base.apk",
                "/apks/pkg.split/split_en.apk"
            ]
        );
    }
}
