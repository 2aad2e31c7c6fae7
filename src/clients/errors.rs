use thiserror::Error;

/// Result alias used across the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong while fetching or logging tracks
#[derive(Error, Debug)]
pub enum Error {
    /// Transport failure, timeout or non-2xx status
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body is not valid JSON
    #[error("Status response deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// Valid JSON without `icestats.source`
    #[error("Unexpected status response: {0}")]
    UnexpectedShape(String),

    /// Reading or writing a log file failed
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// A log line could not be parsed
    #[error("Corrupt log line {line}: {reason}")]
    CorruptLogLine {
        /// 1-based line number
        line: usize,
        /// What was wrong with it
        reason: String,
    },

    /// Invalid setting
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Every fetch attempt failed
    #[error("Giving up after {attempts} attempts, last error: {last}")]
    RetriesExhausted {
        /// Requests made
        attempts: u32,
        /// Error of the final attempt
        last: Box<Error>,
    },
}

impl Error {
    /// Whether a failed fetch attempt is worth repeating.
    ///
    /// Transport failures, error statuses and undecodable bodies are retried.
    /// A well-formed body with the wrong layout is not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Http(_) | Error::Deserialization(_))
    }
}
