//! Shared progress counter and serialized user-facing output.
//!
//! Device tasks report through one [`Reporter`]. The counter and the sink sit
//! behind a single lock, so every line is written whole and the counter value
//! printed with a line is the value that line produced.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

/// How a (device, package) unit ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    Installed { attempts: u32 },
    Failed { reason: String },
}

struct ReporterState {
    completed: u64,
    total: u64,
    sink: Box<dyn Write + Send>,
}

/// Thread-safe progress accumulation and line output.
pub struct Reporter {
    state: Mutex<ReporterState>,
}

impl Reporter {
    /// Report to the given writer.
    pub fn new(sink: impl Write + Send + 'static) -> Self {
        Self {
            state: Mutex::new(ReporterState {
                completed: 0,
                total: 0,
                sink: Box::new(sink),
            }),
        }
    }

    /// Report to standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Discard all output; counters still work.
    pub fn silent() -> Self {
        Self::new(io::sink())
    }

    fn lock(&self) -> MutexGuard<'_, ReporterState> {
        // Poisoning is ignored; the state stays consistent under the lock.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reset the counter for a run of `total_units` units.
    pub fn begin(&self, total_units: u64) {
        let mut state = self.lock();
        state.completed = 0;
        state.total = total_units;
    }

    /// Write one line atomically.
    pub fn line(&self, text: impl AsRef<str>) {
        let mut state = self.lock();
        write_line(&mut state.sink, text.as_ref());
    }

    /// Count one finished unit and print its outcome.
    ///
    /// Returns the counter value after the increment.
    pub fn unit_completed(&self, device: &str, package: &str, outcome: &UnitOutcome) -> u64 {
        let message = match outcome {
            UnitOutcome::Installed { attempts: 1 } => format!("{device}: {package} installed"),
            UnitOutcome::Installed { attempts } => {
                format!("{device}: {package} installed after {attempts} attempts")
            }
            UnitOutcome::Failed { reason } => format!("{device}: {package} FAILED: {reason}"),
        };
        self.step(message)
    }

    /// Count one finished unit and print `[n/total] message`.
    pub fn step(&self, message: impl AsRef<str>) -> u64 {
        let mut state = self.lock();
        state.completed += 1;
        let line = format!("[{}/{}] {}", state.completed, state.total, message.as_ref());
        write_line(&mut state.sink, &line);
        state.completed
    }

    /// Units completed so far.
    pub fn completed(&self) -> u64 {
        self.lock().completed
    }

    /// Units expected in the current run.
    pub fn total(&self) -> u64 {
        self.lock().total
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::stdout()
    }
}

fn write_line(sink: &mut Box<dyn Write + Send>, text: &str) {
    // Best effort.
    let _ = writeln!(sink, "{text}");
    let _ = sink.flush();
}

/// In-memory sink that can be read back after the reporter is done with it.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        let buf = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut buf = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
