//! Diagnostics and the headless duplicating sink.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: launcher diagnostics via `RUST_LOG`
//!   (default `launcher=info`), output to stderr.
//! - **Headless duplicating sink ([`OutputSink`])**: a GUI-launched instance
//!   has no terminal, so tracing output, user-facing banners, and supervised
//!   child output are all additionally written to a fixed log file under the
//!   install directory to keep the run debuggable.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context as _, Result};
use tracing_subscriber::fmt::writer::MakeWriter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::core::mode::RunMode;

/// Shared append handle on the headless log file.
///
/// Writers flush after every line so the file is complete even if the
/// process is terminated abruptly mid-run.
#[derive(Clone)]
pub struct OutputSink {
    file: Arc<Mutex<File>>,
}

impl OutputSink {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create log directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file {}", path.display()))?;
        Ok(Self {
            file: Arc::new(Mutex::new(file)),
        })
    }

    /// Append one line (newline added if missing) and flush immediately.
    pub fn write_line(&self, line: &[u8]) {
        let Ok(mut file) = self.file.lock() else {
            return;
        };
        let _ = file.write_all(line);
        if !line.ends_with(b"\n") {
            let _ = file.write_all(b"\n");
        }
        let _ = file.flush();
    }

    pub fn flush(&self) {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}

impl Write for OutputSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("log sink lock poisoned"))?;
        file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("log sink lock poisoned"))?;
        file.flush()
    }
}

impl<'a> MakeWriter<'a> for OutputSink {
    type Writer = OutputSink;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// User-facing progress output.
///
/// Banners, tips, and remediation instructions go to the original streams
/// and, in headless mode, to the duplicating sink.
#[derive(Clone)]
pub struct Console {
    sink: Option<OutputSink>,
}

impl Console {
    pub fn new(sink: Option<OutputSink>) -> Self {
        Self { sink }
    }

    pub fn say(&self, message: &str) {
        println!("{message}");
        if let Some(sink) = &self.sink {
            sink.write_line(message.as_bytes());
        }
    }

    pub fn error(&self, message: &str) {
        eprintln!("{message}");
        if let Some(sink) = &self.sink {
            sink.write_line(message.as_bytes());
        }
    }

    pub fn sink(&self) -> Option<&OutputSink> {
        self.sink.as_ref()
    }
}

/// Initialize tracing for this run.
///
/// Reads `RUST_LOG`, defaulting to `launcher=info`. Interactive runs log to
/// stderr only; headless runs add a second fmt layer writing (without ANSI
/// escapes) to the log file and return the shared sink for reuse by the
/// process adapter and console.
pub fn init(mode: RunMode, log_path: &Path) -> Result<Option<OutputSink>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("launcher=info"));
    let stderr_layer = fmt::layer().with_writer(io::stderr).compact();

    if !mode.is_headless() {
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .init();
        return Ok(None);
    }

    let sink = OutputSink::open(log_path)?;
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(sink.clone())
        .compact();
    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(Some(sink))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_appends_lines_with_trailing_newline() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("launcher.log");
        let sink = OutputSink::open(&path).expect("open sink");

        sink.write_line(b"first");
        sink.write_line(b"second\n");

        let contents = fs::read_to_string(&path).expect("read log");
        assert_eq!(contents, "first\nsecond\n");
    }

    #[test]
    fn sink_creates_missing_parent_directories() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(".launcher").join("launcher.log");

        let sink = OutputSink::open(&path).expect("open sink");
        sink.write_line(b"hello");

        assert!(path.is_file());
    }
}
