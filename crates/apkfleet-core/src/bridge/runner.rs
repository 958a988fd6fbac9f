//! Child-process execution of bridge commands.

use std::io::ErrorKind;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, info};

use super::command::BridgeCommand;
use super::error::{BridgeError, BridgeResult};

/// Captured output of a successful bridge command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Runs bridge commands against a device.
///
/// `device = None` targets the default (only) connected device.
#[async_trait]
pub trait Bridge: Send + Sync {
    async fn run(&self, device: Option<&str>, command: &BridgeCommand)
        -> BridgeResult<CommandOutput>;
}

/// [`Bridge`] backed by the `adb` executable.
#[derive(Debug, Clone)]
pub struct AdbBridge {
    executable: String,
}

impl Default for AdbBridge {
    fn default() -> Self {
        Self::new("adb")
    }
}

impl AdbBridge {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    /// Run `version` once so a missing executable surfaces before any work.
    pub async fn ensure_available(&self) -> BridgeResult<()> {
        let output = self.run(None, &BridgeCommand::version()).await?;
        debug!(version = %output.stdout.lines().next().unwrap_or_default(), "bridge available");
        Ok(())
    }
}

#[async_trait]
impl Bridge for AdbBridge {
    async fn run(
        &self,
        device: Option<&str>,
        command: &BridgeCommand,
    ) -> BridgeResult<CommandOutput> {
        let argv = command.argv(&self.executable, device);
        let command_line = argv.join(" ");
        info!(device = device.unwrap_or("default"), command = %command_line, "running bridge command");

        let child = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    error!(executable = %self.executable, "bridge executable not found, check PATH");
                    BridgeError::ExecutableNotFound {
                        executable: self.executable.clone(),
                    }
                } else {
                    error!(command = %command_line, error = %e, "failed to spawn bridge command");
                    BridgeError::Io(e)
                }
            })?;

        let output = child.wait_with_output().await?;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            error!(
                device = device.unwrap_or("default"),
                command = %command_line,
                exit_code = ?output.status.code(),
                stderr = %stderr.trim(),
                "bridge command failed"
            );
            return Err(BridgeError::CommandFailed {
                command: command_line,
                stderr,
                exit_code: output.status.code(),
            });
        }

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_code: output.status.code().unwrap_or(0),
        })
    }
}
