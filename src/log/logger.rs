use crate::log::{log_level::LogLevel, log_msg::LogMsg, logger_handle::LoggerHandle};

use std::{
    fs::{self, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::mpsc,
    thread,
};

/// Flush every 100 lines if debugging/tracing (to see progress near real-time).
#[cfg(feature = "log-debug")]
const FLUSH_BATCH_SIZE: u32 = 100;

/// Flush every 1000 lines otherwise (to save I/O while decrypting large captures).
#[cfg(not(feature = "log-debug"))]
const FLUSH_BATCH_SIZE: u32 = 1_000;

/// Where the background worker writes formatted lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    /// Appends to the given file, creating parent directories when missing.
    File(PathBuf),
}

/// Bounded, non-blocking logger backed by a single worker thread.
///
/// # Architecture
///
/// 1. **Producers**: pipeline components call `LogSink::log` on a [`LoggerHandle`].
/// 2. **Queue**: a bounded `mpsc` channel buffers messages; overflow is dropped, never blocks.
/// 3. **Consumer**: a dedicated `logger-worker` thread formats, writes and flushes in batches.
///
/// Call [`shutdown`](Self::shutdown) after every handle clone is dropped to
/// make sure the tail of the log reaches its destination.
pub struct Logger {
    handle: LoggerHandle,
    thread: Option<thread::JoinHandle<()>>,
}

impl Logger {
    /// Starts the worker for `target` with a queue of `cap` messages.
    ///
    /// # Errors
    /// Returns an I/O error if a log file was requested and cannot be opened.
    pub fn start(target: LogTarget, cap: usize, min_level: LogLevel) -> io::Result<Self> {
        let writer: Box<dyn Write + Send> = match target {
            LogTarget::Stderr => Box::new(io::stderr()),
            LogTarget::File(path) => Box::new(open_append(&path)?),
        };

        let (tx, rx) = mpsc::sync_channel::<LogMsg>(cap.max(1));
        let handle = LoggerHandle { tx, min_level };

        let thread = thread::Builder::new()
            .name("logger-worker".into())
            .spawn(move || {
                let mut out = BufWriter::new(writer);
                let mut lines_written: u32 = 0;

                while let Ok(m) = rx.recv() {
                    let _ = writeln!(
                        &mut out,
                        "[{:<5}] {} {} | {}",
                        m.level, m.ts_ms, m.target, m.text
                    );
                    lines_written = lines_written.wrapping_add(1);

                    // Warn/Error are flushed immediately so an abort is never silent.
                    if m.level >= LogLevel::Warn || lines_written.is_multiple_of(FLUSH_BATCH_SIZE)
                    {
                        let _ = out.flush();
                    }
                }

                let _ = out.flush();
            })?;

        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }

    /// Returns a cloneable handle to the logger sink.
    #[must_use]
    pub fn handle(&self) -> LoggerHandle {
        self.handle.clone()
    }

    /// Closes the queue and waits for the worker to drain it.
    ///
    /// Blocks until every outstanding [`LoggerHandle`] clone has been dropped.
    pub fn shutdown(mut self) {
        let Logger { handle, thread, .. } = &mut self;
        // Replace our sender with a disconnected one so the worker sees EOF
        // once the remaining clones go away.
        let (dead_tx, _) = mpsc::sync_channel::<LogMsg>(1);
        handle.tx = dead_tx;
        if let Some(t) = thread.take() {
            let _ = t.join();
        }
    }
}

fn open_append(path: &Path) -> io::Result<fs::File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
