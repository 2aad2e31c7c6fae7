use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{Local, NaiveDateTime, TimeDelta};
use log::{debug, error, info, warn};
use reqwest::Url;
use tokio::time::MissedTickBehavior;

use crate::clients::{
    IcecastClient, LocalStorage,
    errors::{Error, Result},
    icecast::RetryPolicy,
    local_storage::Recorded,
};

/// Icecast's JSON status page on a default local install
pub const DEFAULT_ENDPOINT_URL: &str = "http://localhost:8000/status-json.xsl";
/// Directory daily log files are written to
pub const DEFAULT_LOG_DIR: &str = "logs";
/// Minutes during which the same track is not logged again
pub const DEFAULT_DEDUPE_WINDOW_MINUTES: i64 = 60;
/// Status request attempts per tick
pub const DEFAULT_RETRY_COUNT: u32 = 3;
/// Seconds between status request attempts
pub const DEFAULT_RETRY_DELAY_SECONDS: u64 = 5;
/// Seconds before a status request is abandoned
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 10;

/// Configuration for the [`Tracker`]
pub struct Config {
    /// Status endpoint client
    pub icecast: IcecastClient,
    /// Daily log files
    pub storage: LocalStorage,
}

/// Collects settings and builds a [`Config`]; unset values fall back to the defaults above
#[derive(Default)]
pub struct ConfigBuilder {
    endpoint_url: Option<String>,
    log_dir: Option<PathBuf>,
    dedupe_window_minutes: Option<i64>,
    retry_count: Option<u32>,
    retry_delay_seconds: Option<u64>,
    request_timeout_seconds: Option<u64>,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn dedupe_window_minutes(mut self, minutes: i64) -> Self {
        self.dedupe_window_minutes = Some(minutes);
        self
    }

    #[must_use]
    pub fn retry_count(mut self, count: u32) -> Self {
        self.retry_count = Some(count);
        self
    }

    #[must_use]
    pub fn retry_delay_seconds(mut self, seconds: u64) -> Self {
        self.retry_delay_seconds = Some(seconds);
        self
    }

    #[must_use]
    pub fn request_timeout_seconds(mut self, seconds: u64) -> Self {
        self.request_timeout_seconds = Some(seconds);
        self
    }

    pub fn build(self) -> Result<Config> {
        let raw_url = self
            .endpoint_url
            .unwrap_or_else(|| DEFAULT_ENDPOINT_URL.to_string());
        let url = Url::parse(&raw_url)
            .map_err(|e| Error::ConfigurationError(format!("invalid endpoint URL {raw_url:?}: {e}")))?;

        let minutes = self
            .dedupe_window_minutes
            .unwrap_or(DEFAULT_DEDUPE_WINDOW_MINUTES);
        let window = TimeDelta::try_minutes(minutes)
            .filter(|window| *window >= TimeDelta::zero())
            .ok_or_else(|| {
                Error::ConfigurationError(format!("invalid dedupe window: {minutes} minutes"))
            })?;

        let attempts = self.retry_count.unwrap_or(DEFAULT_RETRY_COUNT);
        if attempts == 0 {
            return Err(Error::ConfigurationError(
                "retry count must be at least 1".to_string(),
            ));
        }
        let retry = RetryPolicy {
            attempts,
            delay: Duration::from_secs(
                self.retry_delay_seconds
                    .unwrap_or(DEFAULT_RETRY_DELAY_SECONDS),
            ),
        };
        let timeout = Duration::from_secs(
            self.request_timeout_seconds
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS),
        );

        let icecast = IcecastClient::new(url, timeout, retry)?;
        let storage = LocalStorage::new(
            self.log_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
            window,
        );
        Ok(Config { icecast, storage })
    }
}

/// What a single tick did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Sources returned by the status endpoint
    pub fetched: usize,
    /// Entries appended to the log
    pub logged: usize,
    /// Tracks suppressed by the dedupe window
    pub duplicates: usize,
    /// Tracks with an empty artist or title
    pub skipped: usize,
    /// Tracks that could not be written
    pub failed: usize,
}

/// Fetches what is playing and logs new tracks, one tick at a time
pub struct Tracker {
    config: Config,
}

impl Tracker {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Tracker { config }
    }

    /// Prepare the log directory
    pub async fn init(&self) -> Result<()> {
        self.config.storage.init().await
    }

    /// Run one tick against the local wall clock
    pub async fn tick(&self) -> TickReport {
        self.tick_with(|| Local::now().naive_local()).await
    }

    /// Run one tick with every track timestamped `now`
    pub async fn tick_at(&self, now: NaiveDateTime) -> TickReport {
        self.tick_with(|| now).await
    }

    /// Tick every `every` until `shutdown` resolves.
    ///
    /// Ticks never overlap; a slow tick delays the next one. A shutdown requested
    /// mid-tick takes effect once that tick has finished.
    pub async fn watch(&self, every: Duration, shutdown: impl Future<Output = ()>) -> Result<()> {
        if every.is_zero() {
            return Err(Error::ConfigurationError(
                "watch interval must be at least 1 second".to_string(),
            ));
        }
        tokio::pin!(shutdown);

        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!("Stopping");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    async fn tick_with(&self, clock: impl Fn() -> NaiveDateTime) -> TickReport {
        let mut report = TickReport::default();

        let tracks = self.config.icecast.fetch().await;
        if tracks.is_empty() {
            info!("No metadata fetched. Either the Icecast server is down or unreachable.");
            return report;
        }
        report.fetched = tracks.len();

        // Each track stands on its own, a failure never stops the rest
        for track in &tracks {
            if !track.is_loggable() {
                debug!("Skipping track with empty fields: {track:?}");
                report.skipped += 1;
                continue;
            }
            match self.config.storage.record_if_new(track, clock()).await {
                Ok(Recorded::Logged(_)) => report.logged += 1,
                Ok(Recorded::Duplicate) => report.duplicates += 1,
                Err(e) => {
                    error!("Error writing to log file: {e}");
                    report.failed += 1;
                }
            }
        }

        if report.failed > 0 {
            warn!("{} track(s) could not be logged", report.failed);
        }
        debug!("Tick finished: {report:?}");
        report
    }
}
