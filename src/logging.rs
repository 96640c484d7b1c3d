//! Logging setup: stderr via env_logger, plus a day-partitioned file sink
//!
//! File lines look like:
//!
//! ```text
//! 2026-10-16T07:49:05.123Z - [INFO] - Balance updated: 1.50 BTC (3 records)
//! ```
//!
//! The sink opens `app-YYYY-MM-DD.log` for the date of each write and only
//! switches files between writes. Write failures are swallowed.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use log::{Level, Log, Metadata, Record, SetLoggerError};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;

pub struct DailyFileSink {
    dir: PathBuf,
    current: Mutex<Option<(NaiveDate, File)>>,
}

impl DailyFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let _ = std::fs::create_dir_all(&dir);
        Self {
            dir,
            current: Mutex::new(None),
        }
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("app-{}.log", date.format("%Y-%m-%d")))
    }

    pub fn format_line(at: DateTime<Utc>, level: Level, message: &str) -> String {
        format!(
            "{} - [{}] - {}\n",
            at.to_rfc3339_opts(SecondsFormat::Millis, true),
            level,
            message
        )
    }

    /// Append one entry stamped `at`; errors are dropped
    pub fn append_at(&self, at: DateTime<Utc>, level: Level, message: &str) {
        let line = Self::format_line(at, level, message);
        let _ = self.write_line(at.date_naive(), &line);
    }

    pub fn append(&self, level: Level, message: &str) {
        self.append_at(Utc::now(), level, message);
    }

    fn write_line(&self, date: NaiveDate, line: &str) -> io::Result<()> {
        let mut current = self
            .current
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log sink poisoned"))?;

        let stale = !matches!(current.as_ref(), Some((open_date, _)) if *open_date == date);
        if stale {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.path_for(date))?;
            *current = Some((date, file));
        }

        match current.as_mut() {
            Some((_, file)) => file.write_all(line.as_bytes()),
            None => Ok(()),
        }
    }
}

/// Forwards every enabled record to env_logger and to the file sink
pub struct TeeLogger {
    stderr: env_logger::Logger,
    file: DailyFileSink,
}

impl Log for TeeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.stderr.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if !self.stderr.matches(record) {
            return;
        }
        self.stderr.log(record);
        self.file.append(record.level(), &record.args().to_string());
    }

    fn flush(&self) {
        self.stderr.flush();
    }
}

/// Install the global logger (`RUST_LOG` filter, default `info`)
pub fn init_logging(log_dir: impl Into<PathBuf>) -> Result<(), SetLoggerError> {
    let stderr = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .build();
    let max_level = stderr.filter();

    log::set_boxed_logger(Box::new(TeeLogger {
        stderr,
        file: DailyFileSink::new(log_dir),
    }))?;
    log::set_max_level(max_level);
    Ok(())
}
