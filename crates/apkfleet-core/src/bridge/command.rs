//! Typed bridge command construction.
//!
//! A [`BridgeCommand`] is always an argument vector. It is never joined into a
//! string and re-split, so artifact paths containing spaces reach the bridge
//! as single arguments.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{BridgeError, BridgeResult};

/// System property holding the device's SDK level.
pub const SDK_VERSION_PROP: &str = "ro.build.version.sdk";

/// Options applied to an install invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallOptions {
    /// Grant all runtime permissions requested by the package (`-g`).
    pub grant_permissions: bool,
}

/// A bridge subcommand and its arguments, without the executable or `-s`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeCommand {
    args: Vec<String>,
}

impl BridgeCommand {
    /// Build a command from pre-tokenized arguments.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Tokenize a shell-style command string.
    ///
    /// Whitespace separates tokens. A single or double quote at the start of
    /// a token opens a quoted token that ends at the matching quote; quote
    /// characters are kept. A quote inside a word is an ordinary character.
    pub fn parse(line: &str) -> BridgeResult<Self> {
        Ok(Self {
            args: tokenize(line)?,
        })
    }

    /// `version`
    pub fn version() -> Self {
        Self::from_args(["version"])
    }

    /// `devices -l`
    pub fn devices_long() -> Self {
        Self::from_args(["devices", "-l"])
    }

    /// `shell pm list packages -f -3`
    pub fn list_third_party_packages() -> Self {
        Self::from_args(["shell", "pm", "list", "packages", "-f", "-3"])
    }

    /// `shell pm path <package>`
    pub fn package_path(package: &str) -> Self {
        Self::from_args(["shell", "pm", "path", package])
    }

    /// `pull <remote> <local_dir>`
    pub fn pull(remote: &str, local_dir: &Path) -> Self {
        Self::from_args([
            "pull".to_string(),
            remote.to_string(),
            local_dir.to_string_lossy().into_owned(),
        ])
    }

    /// `shell getprop <key>`
    pub fn getprop(key: &str) -> Self {
        Self::from_args(["shell", "getprop", key])
    }

    /// `install-multiple -r [-g] <artifact>...`
    ///
    /// All artifacts of one package go into a single invocation so split
    /// packages install atomically.
    pub fn install_multiple(artifacts: &[PathBuf], options: InstallOptions) -> Self {
        let mut args = vec!["install-multiple".to_string(), "-r".to_string()];
        if options.grant_permissions {
            args.push("-g".to_string());
        }
        args.extend(
            artifacts
                .iter()
                .map(|path| path.to_string_lossy().into_owned()),
        );
        Self { args }
    }

    /// The subcommand arguments.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Full argument vector: executable, optional `-s <device>`, subcommand.
    pub fn argv(&self, executable: &str, device: Option<&str>) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 3);
        argv.push(executable.to_string());
        if let Some(device) = device {
            argv.push("-s".to_string());
            argv.push(device.to_string());
        }
        argv.extend(self.args.iter().cloned());
        argv
    }
}

impl fmt::Display for BridgeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.args.join(" "))
    }
}

fn tokenize(line: &str) -> BridgeResult<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in line.chars() {
        match quote {
            Some(open) => {
                current.push(ch);
                if ch == open {
                    quote = None;
                    tokens.push(std::mem::take(&mut current));
                }
            }
            None if (ch == '"' || ch == '\'') && current.is_empty() => {
                current.push(ch);
                quote = Some(ch);
            }
            None if ch.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            None => current.push(ch),
        }
    }

    if quote.is_some() {
        return Err(BridgeError::UnterminatedQuote(line.to_string()));
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}
