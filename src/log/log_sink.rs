use std::sync::Mutex;

use crate::log::log_level::LogLevel;

/// Destination for log lines emitted by the decrypt pipeline.
///
/// Components hold an `Arc<dyn LogSink>` and log through the `sink_*` macros,
/// which forward here with `module_path!()` as the target.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, msg: &str, target: &'static str);
}

/// Discards everything. Used when the caller does not want diagnostics.
#[derive(Debug, Clone, Default)]
pub struct NoopLogSink;

impl LogSink for NoopLogSink {
    #[inline]
    fn log(&self, _level: LogLevel, _msg: &str, _target: &'static str) {}
}

/// Keeps every line in memory, in emission order.
///
/// Handy for embedding the pipeline in another tool that wants to surface
/// per-packet diagnostics itself.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    lines: Mutex<Vec<(LogLevel, String)>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the collected lines.
    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        match self.lines.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Number of collected lines at `level` or above.
    pub fn count_at_least(&self, level: LogLevel) -> usize {
        self.lines().iter().filter(|(l, _)| *l >= level).count()
    }
}

impl LogSink for MemoryLogSink {
    fn log(&self, level: LogLevel, msg: &str, _target: &'static str) {
        let mut guard = match self.lines.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push((level, msg.to_owned()));
    }
}
