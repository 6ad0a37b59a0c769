//! Log sink: console, an append-only file, or both.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use clap::ValueEnum;
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogDestination {
    #[default]
    Console,
    File,
    Both,
}

impl LogDestination {
    fn wants_console(self) -> bool {
        matches!(self, LogDestination::Console | LogDestination::Both)
    }

    fn wants_file(self) -> bool {
        matches!(self, LogDestination::File | LogDestination::Both)
    }
}

/// `MakeWriter` that tees each formatted line to stdout and/or a shared file.
#[derive(Clone)]
pub struct LogWriter {
    console: bool,
    file: Option<Arc<Mutex<File>>>,
}

impl LogWriter {
    /// # Errors
    /// Fails when the log file cannot be opened for appending.
    pub fn new(destination: LogDestination, path: &Path) -> io::Result<Self> {
        let file = if destination.wants_file() {
            if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(Arc::new(Mutex::new(file)))
        } else {
            None
        };
        Ok(Self {
            console: destination.wants_console(),
            file,
        })
    }
}

pub struct LogWriterGuard {
    console: bool,
    file: Option<Arc<Mutex<File>>>,
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriterGuard {
            console: self.console,
            file: self.file.clone(),
        }
    }
}

fn poisoned() -> io::Error {
    io::Error::other("log file lock poisoned")
}

impl Write for LogWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.console {
            io::stdout().write_all(buf)?;
        }
        if let Some(file) = &self.file {
            file.lock().map_err(|_| poisoned())?.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.console {
            io::stdout().flush()?;
        }
        if let Some(file) = &self.file {
            file.lock().map_err(|_| poisoned())?.flush()?;
        }
        Ok(())
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `level` when set.
///
/// # Errors
/// Fails when the log file cannot be opened; a second call is ignored.
pub fn init(level: &str, destination: LogDestination, path: &Path) -> io::Result<()> {
    let writer = LogWriter::new(destination, path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_writer(writer)
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(destination == LogDestination::Console)
        .try_init();
    Ok(())
}
