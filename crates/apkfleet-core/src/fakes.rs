//! In-memory fakes for the bridge and artifact traits (testing only)
//!
//! Provides `ScriptedBridge` and `FakeArtifacts` that satisfy the trait
//! contracts without a device or an `adb` binary.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::artifacts::{ArtifactResolver, Resolution};
use crate::bridge::{Bridge, BridgeCommand, BridgeError, BridgeResult, CommandOutput};

// ---------------------------------------------------------------------------
// ScriptedBridge
// ---------------------------------------------------------------------------

/// One recorded bridge invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub device: Option<String>,
    pub args: Vec<String>,
}

impl RecordedCall {
    fn is_install(&self) -> bool {
        self.args.first().map(String::as_str) == Some("install-multiple")
    }

    /// Whether this install call carries an artifact of `package`.
    fn installs(&self, package: &str) -> bool {
        self.is_install()
            && self.args.iter().any(|arg| {
                Path::new(arg)
                    .parent()
                    .and_then(Path::file_name)
                    .is_some_and(|dir| dir == package)
            })
    }
}

#[derive(Debug, Default)]
struct Script {
    calls: Vec<RecordedCall>,
    /// (device, package) → install failures still to hand out.
    install_failures: HashMap<(String, String), u32>,
    /// joined args → stdout.
    responses: HashMap<String, String>,
    /// joined args → stderr of a failing command.
    failures: HashMap<String, String>,
}

/// Bridge fake that records calls and replays scripted outcomes.
///
/// Unscripted commands succeed with empty output, except
/// `shell getprop ro.build.version.sdk` which answers `34`.
#[derive(Debug, Default)]
pub struct ScriptedBridge {
    script: Mutex<Script>,
    latency: Duration,
    executable_missing: bool,
    executable_lost_after: Option<usize>,
    started: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails as if the bridge executable were not installed.
    pub fn missing_executable() -> Self {
        Self {
            executable_missing: true,
            ..Self::default()
        }
    }

    /// The first `calls` calls behave normally; later ones fail as if the
    /// bridge executable had been removed.
    pub fn loses_executable_after(mut self, calls: usize) -> Self {
        self.executable_lost_after = Some(calls);
        self
    }

    /// Every call takes `latency` to complete.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// The next `times` installs of `package` on `device` fail.
    pub fn fail_installs(&self, device: &str, package: &str, times: u32) {
        let mut script = self.script.lock().unwrap();
        script
            .install_failures
            .insert((device.to_string(), package.to_string()), times);
    }

    /// Answer `command` with `stdout`.
    pub fn respond(&self, command: &BridgeCommand, stdout: &str) {
        let mut script = self.script.lock().unwrap();
        script
            .responses
            .insert(command.args().join(" "), stdout.to_string());
    }

    /// Fail `command` with `stderr`.
    pub fn fail(&self, command: &BridgeCommand, stderr: &str) {
        let mut script = self.script.lock().unwrap();
        script
            .failures
            .insert(command.args().join(" "), stderr.to_string());
    }

    /// All recorded calls in arrival order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.script.lock().unwrap().calls.clone()
    }

    /// Argument vectors of the install calls made against `device`.
    pub fn install_calls(&self, device: &str) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter(|call| call.is_install() && call.device.as_deref() == Some(device))
            .map(|call| call.args)
            .collect()
    }

    /// Number of install attempts of `package` on `device`.
    pub fn install_attempts(&self, device: &str, package: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.device.as_deref() == Some(device) && call.installs(package))
            .count()
    }

    /// Number of calls received, including ones that failed before being
    /// recorded.
    pub fn calls_started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn outcome(&self, call: &RecordedCall) -> BridgeResult<CommandOutput> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(call.clone());
        let key = call.args.join(" ");

        if let Some(stderr) = script.failures.get(&key) {
            return Err(BridgeError::CommandFailed {
                command: format!("adb {key}"),
                stderr: stderr.clone(),
                exit_code: Some(1),
            });
        }

        if call.is_install() {
            let device = call.device.clone().unwrap_or_default();
            let failing = script
                .install_failures
                .iter_mut()
                .find(|((d, p), remaining)| *d == device && **remaining > 0 && call.installs(p));
            if let Some(((_, package), remaining)) = failing {
                *remaining -= 1;
                return Err(BridgeError::CommandFailed {
                    command: format!("adb -s {device} {key}"),
                    stderr: format!("Failure [INSTALL_FAILED_INTERNAL_ERROR] {package}"),
                    exit_code: Some(1),
                });
            }
        }

        let stdout = match script.responses.get(&key) {
            Some(stdout) => stdout.clone(),
            None if key == "shell getprop ro.build.version.sdk" => "34\n".to_string(),
            None if call.is_install() => "Success\n".to_string(),
            None => String::new(),
        };
        Ok(CommandOutput {
            stdout,
            stderr: String::new(),
            exit_code: 0,
        })
    }
}

#[async_trait]
impl Bridge for ScriptedBridge {
    async fn run(
        &self,
        device: Option<&str>,
        command: &BridgeCommand,
    ) -> BridgeResult<CommandOutput> {
        let index = self.started.fetch_add(1, Ordering::SeqCst);
        if self.executable_missing || self.executable_lost_after.is_some_and(|n| index >= n) {
            return Err(BridgeError::ExecutableNotFound {
                executable: "adb".to_string(),
            });
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let call = RecordedCall {
            device: device.map(str::to_string),
            args: command.args().to_vec(),
        };
        let outcome = self.outcome(&call);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

// ---------------------------------------------------------------------------
// FakeArtifacts
// ---------------------------------------------------------------------------

/// Artifact resolver backed by a map. Unknown packages resolve to a missing
/// directory under `/apks`.
#[derive(Debug, Default, Clone)]
pub struct FakeArtifacts {
    packages: HashMap<String, Resolution>,
}

impl FakeArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_package(mut self, package: &str, artifacts: &[&str]) -> Self {
        self.packages.insert(
            package.to_string(),
            Resolution::Found(artifacts.iter().map(PathBuf::from).collect()),
        );
        self
    }

    pub fn with_missing_dir(mut self, package: &str) -> Self {
        self.packages.insert(
            package.to_string(),
            Resolution::MissingDirectory(Self::dir(package)),
        );
        self
    }

    pub fn with_empty_dir(mut self, package: &str) -> Self {
        self.packages.insert(
            package.to_string(),
            Resolution::EmptyDirectory(Self::dir(package)),
        );
        self
    }

    fn dir(package: &str) -> PathBuf {
        Path::new("/apks").join(package)
    }
}

impl ArtifactResolver for FakeArtifacts {
    fn resolve(&self, package: &str) -> std::io::Result<Resolution> {
        Ok(self
            .packages
            .get(package)
            .cloned()
            .unwrap_or_else(|| Resolution::MissingDirectory(Self::dir(package))))
    }
}
