//! Log file that rolls over at local midnight and keeps a bounded number of backups.
//!
//! ```text
//! actions.out              ← active file, always at the configured path
//! actions.out.2026-10-17   ← backups, named after the day they cover
//! actions.out.2026-10-18
//! ```
//!
//! The first rollover happens at the midnight following the active file's
//! last modification (or following "now" for a fresh file), so a file left
//! behind by a previous run is rotated as soon as it is written to again on
//! a later day.

// External crates
use chrono::{DateTime, Local, NaiveDate, TimeDelta, TimeZone};
use regex::Regex;
use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Source of the current time, swappable in tests.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

#[derive(Debug)]
pub struct TimedRotatingFile {
    path: PathBuf,
    backup_count: usize,
    clock: Arc<dyn Clock>,
    file: File,
    rollover_at: DateTime<Local>,
    backup_pattern: Regex,
}

impl TimedRotatingFile {
    /// Open (or create) the active file at `path`, keeping at most
    /// `backup_count` rotated files. A count of zero keeps every backup.
    pub fn open(path: impl Into<PathBuf>, backup_count: usize) -> io::Result<Self> {
        Self::with_clock(path, backup_count, Arc::new(SystemClock))
    }

    pub fn with_clock(
        path: impl Into<PathBuf>,
        backup_count: usize,
        clock: Arc<dyn Clock>,
    ) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let reference = match fs::metadata(&path).and_then(|meta| meta.modified()) {
            Ok(modified) => DateTime::<Local>::from(modified),
            Err(_) => clock.now(),
        };

        let file_name = path
            .file_name()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("log file path {} has no file name", path.display()),
                )
            })?
            .to_string_lossy()
            .into_owned();
        let backup_pattern = Regex::new(&format!(
            r"^{}\.\d{{4}}-\d{{2}}-\d{{2}}$",
            regex::escape(&file_name)
        ))
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;

        let file = open_append(&path)?;

        Ok(Self {
            path,
            backup_count,
            clock,
            file,
            rollover_at: next_midnight(reference),
            backup_pattern,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Instant of the next scheduled rollover.
    pub fn rollover_at(&self) -> DateTime<Local> {
        self.rollover_at
    }

    /// Rotated backups beside the active file, oldest first.
    pub fn backups(&self) -> io::Result<Vec<PathBuf>> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut backups = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if self.backup_pattern.is_match(&name.to_string_lossy()) {
                backups.push(entry.path());
            }
        }
        // ISO dates sort chronologically
        backups.sort();
        Ok(backups)
    }

    fn rollover(&mut self, now: DateTime<Local>) -> io::Result<()> {
        self.file.flush()?;

        let covered_day = self
            .rollover_at
            .date_naive()
            .pred_opt()
            .unwrap_or_else(|| self.rollover_at.date_naive());
        let backup = backup_path(&self.path, covered_day);
        if backup.exists() {
            fs::remove_file(&backup)?;
        }
        if self.path.exists() {
            fs::rename(&self.path, &backup)?;
        }

        self.file = open_append(&self.path)?;
        self.prune_backups()?;
        self.rollover_at = next_midnight(now);
        Ok(())
    }

    fn prune_backups(&self) -> io::Result<()> {
        if self.backup_count == 0 {
            return Ok(());
        }

        let backups = self.backups()?;
        if backups.len() > self.backup_count {
            for stale in &backups[..backups.len() - self.backup_count] {
                fs::remove_file(stale)?;
            }
        }
        Ok(())
    }
}

impl Write for TimedRotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let now = self.clock.now();
        if now >= self.rollover_at {
            self.rollover(now)?;
        }
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn backup_path(path: &Path, day: NaiveDate) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(format!(".{}", day.format("%Y-%m-%d")));
    PathBuf::from(name)
}

/// First local midnight strictly after `instant`.
fn next_midnight(instant: DateTime<Local>) -> DateTime<Local> {
    instant
        .date_naive()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .and_then(|midnight| Local.from_local_datetime(&midnight).earliest())
        .unwrap_or_else(|| instant + TimeDelta::days(1))
}
