//! Diagnostic output for the daemon.
//!
//! Every entry goes to two sinks: the console and an append-only file named
//! after the current calendar date (`dispatchd-YYYY-MM-DD.log`). The file
//! writer re-opens its target when the local date rolls over; there is no
//! rotation cleanup. Appends are serialized behind a mutex so entries from
//! concurrent sessions are never torn.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::Local;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::prelude::*;

use crate::config::Config;

/// Timestamp formatter rendering the entry's local time.
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Append-only writer targeting one file per calendar date.
///
/// Clones share the same state, so the subscriber's per-event writer clones
/// all funnel into one mutex-guarded file handle.
#[derive(Clone)]
pub struct DailyLogFile {
    inner: Arc<Mutex<DailyLogState>>,
}

struct DailyLogState {
    dir: PathBuf,
    day: String,
    file: Option<File>,
}

impl DailyLogFile {
    /// Create a writer appending under `dir`. The directory and the first
    /// file are created lazily on first write.
    pub fn new(dir: PathBuf) -> DailyLogFile {
        DailyLogFile {
            inner: Arc::new(Mutex::new(DailyLogState {
                dir,
                day: String::new(),
                file: None,
            })),
        }
    }
}

impl DailyLogState {
    /// Open the file for today's date, re-opening after a date rollover.
    fn roll(&mut self) -> io::Result<()> {
        let today = Local::now().format("%Y-%m-%d").to_string();
        if self.file.is_none() || self.day != today {
            fs::create_dir_all(&self.dir)?;
            let path = self.dir.join(format!("dispatchd-{today}.log"));
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            self.day = today;
            self.file = Some(file);
        }
        Ok(())
    }
}

impl Write for DailyLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer poisoned"))?;
        state.roll()?;
        match state.file.as_mut() {
            Some(file) => file.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer poisoned"))?;
        match state.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// Install the global diagnostic subscriber: console plus daily file.
///
/// `RUST_LOG` overrides the configured level when set.
pub fn init(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let file_writer = DailyLogFile::new(config.log_dir.clone());

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_timer(LocalTimer);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_timer(LocalTimer)
        .with_writer(move || file_writer.clone());

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_to_dated_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = DailyLogFile::new(dir.path().to_path_buf());

        writer.write_all(b"first entry\n").unwrap();
        writer.write_all(b"second entry\n").unwrap();
        writer.flush().unwrap();

        let today = Local::now().format("%Y-%m-%d").to_string();
        let path = dir.path().join(format!("dispatchd-{today}.log"));
        let contents = fs::read_to_string(path).unwrap();
        assert_eq!(contents, "first entry\nsecond entry\n");
    }

    #[test]
    fn test_clones_share_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = DailyLogFile::new(dir.path().to_path_buf());
        let mut clone = writer.clone();

        writer.write_all(b"from writer\n").unwrap();
        clone.write_all(b"from clone\n").unwrap();

        let today = Local::now().format("%Y-%m-%d").to_string();
        let contents = fs::read_to_string(dir.path().join(format!("dispatchd-{today}.log"))).unwrap();
        assert_eq!(contents, "from writer\nfrom clone\n");
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested").join("logs");
        let mut writer = DailyLogFile::new(nested.clone());

        writer.write_all(b"entry\n").unwrap();
        assert!(nested.exists());
    }
}
