use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime, TimeDelta, Timelike};
use log::{debug, info, warn};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::clients::entities::{NowPlaying, TrackEntry, parse_log_line};
use crate::clients::errors::{Error, Result};

/// Outcome of [`LocalStorage::record_if_new`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    /// The entry that was appended
    Logged(TrackEntry),
    /// Already logged within the dedupe window
    Duplicate,
}

/// Date-partitioned, append-only track log.
///
/// One file per calendar day, `<log_dir>/<YYYY-MM-DD>.log`. The same files are read
/// back to suppress tracks already logged within the dedupe window.
pub struct LocalStorage {
    log_dir: PathBuf,
    window: TimeDelta,
    // Serializes check+append so the newest line is always the latest timestamp
    write_lock: Mutex<()>,
}

impl LocalStorage {
    /// Storage under `log_dir`, suppressing repeats within `window`
    pub fn new(log_dir: impl Into<PathBuf>, window: TimeDelta) -> Self {
        LocalStorage {
            log_dir: log_dir.into(),
            window,
            write_lock: Mutex::new(()),
        }
    }

    /// Create the log directory if it is missing
    pub async fn init(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.log_dir).await?;
        debug!("Using log directory {:?}", self.log_dir);
        Ok(())
    }

    /// Directory holding the daily files
    #[must_use]
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Path of the log file holding entries for `date`
    #[must_use]
    pub fn log_path(&self, date: NaiveDate) -> PathBuf {
        self.log_dir.join(format!("{}.log", date.format("%Y-%m-%d")))
    }

    /// Whether `track` was logged today within the dedupe window before `now`.
    ///
    /// A missing file means nothing was logged yet. Lines are scanned newest first
    /// and the scan stops at the first entry older than the window.
    pub async fn is_duplicate(&self, track: &NowPlaying, now: NaiveDateTime) -> Result<bool> {
        let now = second_precision(now);
        let path = self.log_path(now.date());
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        find_recent(&contents, &track.describe(), now, self.window)
    }

    /// Append one entry to the log file for `now`'s date, creating it if needed
    pub async fn append(&self, track: &NowPlaying, now: NaiveDateTime) -> Result<TrackEntry> {
        let entry = TrackEntry::new(second_precision(now), track.clone());
        tokio::fs::create_dir_all(&self.log_dir).await?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(entry.timestamp.date()))
            .await?;
        file.write_all(format!("{entry}\n").as_bytes()).await?;
        file.flush().await?;
        info!("Logged: {entry}");
        Ok(entry)
    }

    /// Append `track` unless it is a duplicate.
    ///
    /// An unreadable or corrupt log is reported and treated as "not a duplicate":
    /// logging a track twice beats losing it.
    pub async fn record_if_new(&self, track: &NowPlaying, now: NaiveDateTime) -> Result<Recorded> {
        let _guard = self.write_lock.lock().await;
        let duplicate = match self.is_duplicate(track, now).await {
            Ok(duplicate) => duplicate,
            Err(e) => {
                warn!("Error reading log file: {e}");
                false
            }
        };
        if duplicate {
            debug!("Skipping duplicate: {}", track.describe());
            return Ok(Recorded::Duplicate);
        }
        self.append(track, now).await.map(Recorded::Logged)
    }
}

fn second_precision(at: NaiveDateTime) -> NaiveDateTime {
    at.with_nanosecond(0).unwrap_or(at)
}

fn find_recent(
    contents: &str,
    description: &str,
    now: NaiveDateTime,
    window: TimeDelta,
) -> Result<bool> {
    let lines: Vec<&str> = contents.lines().collect();
    for (index, line) in lines.iter().enumerate().rev() {
        if line.trim().is_empty() {
            continue;
        }
        let (logged_at, logged) = parse_log_line(line).map_err(|reason| Error::CorruptLogLine {
            line: index + 1,
            reason,
        })?;
        if now - logged_at > window {
            break;
        }
        if logged == description {
            return Ok(true);
        }
    }
    Ok(false)
}
