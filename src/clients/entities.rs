use std::fmt;

use chrono::NaiveDateTime;

/// Placeholder used when a source does not report an artist
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
/// Placeholder used when a source does not report a title
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// Timestamp layout used in log lines, second precision
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const ENTRY_SEPARATOR: &str = " - ";

/// What a single source is currently playing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    /// Artist as reported by the server
    pub artist: String,
    /// Title as reported by the server
    pub title: String,
}

impl NowPlaying {
    /// Track from raw artist and title
    #[must_use]
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        NowPlaying {
            artist: artist.into(),
            title: title.into(),
        }
    }

    /// Both fields must carry text for the track to be worth logging
    #[must_use]
    pub fn is_loggable(&self) -> bool {
        !self.artist.is_empty() && !self.title.is_empty()
    }

    /// The part of a log line after the timestamp, e.g. `Artist: X, Title: Y`.
    ///
    /// Line breaks are flattened so one entry always stays on one line.
    #[must_use]
    pub fn describe(&self) -> String {
        format!(
            "Artist: {}, Title: {}",
            single_line(&self.artist),
            single_line(&self.title)
        )
    }
}

fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

/// One line of a daily log file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackEntry {
    /// Local time the entry was written
    pub timestamp: NaiveDateTime,
    /// What was playing
    pub track: NowPlaying,
}

impl TrackEntry {
    /// Entry for `track` written at `timestamp`
    #[must_use]
    pub fn new(timestamp: NaiveDateTime, track: NowPlaying) -> Self {
        TrackEntry { timestamp, track }
    }
}

impl fmt::Display for TrackEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{ENTRY_SEPARATOR}{}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.track.describe()
        )
    }
}

/// Split a log line into its timestamp and the description that follows it.
///
/// The description is returned verbatim (without the trailing newline) so callers
/// can compare it against [`NowPlaying::describe`].
pub fn parse_log_line(line: &str) -> Result<(NaiveDateTime, &str), String> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (timestamp, description) = line
        .split_once(ENTRY_SEPARATOR)
        .ok_or_else(|| format!("missing '{ENTRY_SEPARATOR}' separator"))?;
    let timestamp = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
        .map_err(|e| format!("bad timestamp {timestamp:?}: {e}"))?;
    Ok((timestamp, description))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn entry_renders_in_log_format() {
        let entry = TrackEntry::new(at(7, 5, 3), NowPlaying::new("Alice", "Song A"));
        assert_eq!(
            entry.to_string(),
            "2024-03-09 07:05:03 - Artist: Alice, Title: Song A"
        );
    }

    #[test]
    fn parses_rendered_line() {
        let (ts, description) =
            parse_log_line("2024-03-09 07:05:03 - Artist: A - B, Title: C\n").unwrap();
        assert_eq!(ts, at(7, 5, 3));
        assert_eq!(description, "Artist: A - B, Title: C");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_log_line("not a log line").is_err());
        assert!(parse_log_line("yesterday - Artist: A, Title: B").is_err());
    }

    #[test]
    fn newlines_are_flattened() {
        let track = NowPlaying::new("Alice\nBand", "Song\r\nA");
        assert_eq!(track.describe(), "Artist: Alice Band, Title: Song  A");
    }

    #[test]
    fn empty_fields_are_not_loggable() {
        assert!(!NowPlaying::new("", "Song").is_loggable());
        assert!(!NowPlaying::new("Alice", "").is_loggable());
        assert!(NowPlaying::new("Alice", "Song").is_loggable());
    }
}
