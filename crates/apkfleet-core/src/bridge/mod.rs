//! Device bridge: typed `adb` commands and their execution.
//!
//! # Modules
//!
//! - [`command`]: `BridgeCommand` builder and shell-style tokenizer
//! - [`runner`] : `Bridge` trait, `AdbBridge` process runner
//! - [`error`]  : `BridgeError` / `BridgeResult`

pub mod command;
pub mod error;
pub mod runner;

pub use command::{BridgeCommand, InstallOptions, SDK_VERSION_PROP};
pub use error::{BridgeError, BridgeResult};
pub use runner::{AdbBridge, Bridge, CommandOutput};
