//! Tracing initialisation.
//!
//! Call [`init_tracing`] once at program start. Console output goes to
//! stderr through an `EnvFilter`; the optional diagnostic log file receives
//! every `INFO`-and-above event as plain text, appended across runs.
//!
//! Safe to call more than once; subsequent calls are silently ignored
//! (the global subscriber can only be set once per process).

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Default diagnostic log file name.
pub const DEFAULT_LOG_FILE: &str = "apkfleet.log";

/// Initialise the global tracing subscriber.
///
/// * `json`: when `true`, console lines are newline-delimited JSON.
/// * `level`: console verbosity when `RUST_LOG` is not set.
/// * `log_file`: append-only diagnostic log; `None` disables it.
///
/// Fails only if the log file cannot be opened.
pub fn init_tracing(json: bool, level: Level, log_file: Option<&Path>) -> std::io::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let console = if json {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
            .with_filter(env_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(env_filter)
            .boxed()
    };

    let file = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(LevelFilter::INFO),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .ok();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_tracing_creates_log_file_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("diag.log");

        init_tracing(false, Level::WARN, Some(&path)).unwrap();
        init_tracing(true, Level::DEBUG, None).unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_unwritable_log_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing-dir").join("diag.log");
        assert!(init_tracing(false, Level::WARN, Some(&path)).is_err());
    }
}
