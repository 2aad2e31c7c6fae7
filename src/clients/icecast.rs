use std::time::Duration;

use log::{debug, info, warn};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::clients::{
    entities::{NowPlaying, UNKNOWN_ARTIST, UNKNOWN_TITLE},
    errors::{Error, Result},
};

#[derive(Deserialize, Debug)]
struct StatusResponse {
    icestats: Option<IceStats>,
}

#[derive(Deserialize, Debug)]
struct IceStats {
    source: Option<Value>,
}

/// How many times a status request is attempted and how long to wait in between
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total requests per fetch, at least 1
    pub attempts: u32,
    /// Pause after a failed attempt
    pub delay: Duration,
}

/// Reads "now playing" metadata from an Icecast `status-json.xsl` endpoint
pub struct IcecastClient {
    http: reqwest::Client,
    url: Url,
    retry: RetryPolicy,
}

impl IcecastClient {
    /// Client for `url`; each request is abandoned after `timeout`
    pub fn new(url: Url, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(IcecastClient { http, url, retry })
    }

    /// One request, no retries
    pub async fn fetch_once(&self) -> Result<Vec<NowPlaying>> {
        let response = self
            .http
            .get(self.url.clone())
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;
        parse_status(&body)
    }

    /// Fetch with retries on transient failures.
    ///
    /// Shape failures are returned straight away, everything else is attempted
    /// up to `retry.attempts` times with `retry.delay` in between.
    pub async fn fetch_now_playing(&self) -> Result<Vec<NowPlaying>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fetch_once().await {
                Ok(tracks) => {
                    debug!("Fetched {} source(s) from {}", tracks.len(), self.url);
                    return Ok(tracks);
                }
                Err(e) if e.is_transient() => {
                    warn!("Attempt {attempt} failed: {e}");
                    if attempt >= self.retry.attempts {
                        return Err(Error::RetriesExhausted {
                            attempts: attempt,
                            last: Box::new(e),
                        });
                    }
                    info!("Retrying in {} seconds ...", self.retry.delay.as_secs());
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Like [`IcecastClient::fetch_now_playing`] but never fails: errors are
    /// logged and reported as "nothing playing".
    pub async fn fetch(&self) -> Vec<NowPlaying> {
        match self.fetch_now_playing().await {
            Ok(tracks) => tracks,
            Err(e @ Error::UnexpectedShape(_)) => {
                warn!("{e}");
                Vec::new()
            }
            Err(e) => {
                warn!("Max retries reached: {e}");
                Vec::new()
            }
        }
    }
}

/// Parse a status document into one entry per active source, in server order.
///
/// `icestats.source` is an object when a single mountpoint is live and an array
/// when there are several.
pub fn parse_status(body: &str) -> Result<Vec<NowPlaying>> {
    // Syntax errors are worth a retry, a document of the wrong shape is not
    let document: Value = serde_json::from_str(body)?;
    let response: StatusResponse = serde_json::from_value(document)
        .map_err(|e| Error::UnexpectedShape(format!("not an Icecast status document: {e}")))?;
    let source = response
        .icestats
        .and_then(|stats| stats.source)
        .ok_or_else(|| {
            Error::UnexpectedShape("expected keys 'icestats.source' not found".to_string())
        })?;

    match &source {
        Value::Object(source) => Ok(vec![now_playing(source)]),
        Value::Array(sources) => Ok(sources
            .iter()
            .enumerate()
            .filter_map(|(i, source)| match source {
                Value::Object(source) => Some(now_playing(source)),
                other => {
                    warn!("Skipping source #{i}, not an object: {other}");
                    None
                }
            })
            .collect()),
        other => Err(Error::UnexpectedShape(format!(
            "'icestats.source' is neither an object nor an array: {other}"
        ))),
    }
}

fn now_playing(source: &Map<String, Value>) -> NowPlaying {
    NowPlaying::new(
        text_field(source, "artist", UNKNOWN_ARTIST),
        text_field(source, "title", UNKNOWN_TITLE),
    )
}

fn text_field(source: &Map<String, Value>, key: &str, default: &str) -> String {
    match source.get(key) {
        None | Some(Value::Null) => default.to_string(),
        Some(Value::String(text)) => text.clone(),
        // Some encoders report numeric titles
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_source_object() {
        let body = r#"{"icestats": {"source": {"artist": "Alice", "title": "Song A"}}}"#;
        assert_eq!(
            parse_status(body).unwrap(),
            vec![NowPlaying::new("Alice", "Song A")]
        );
    }

    #[test]
    fn source_array_keeps_server_order() {
        let body = r#"{"icestats": {"source": [
            {"artist": "Alice", "title": "Song A", "listenurl": "http://x/a"},
            {"artist": "Bob", "title": "Song B"},
            {"artist": "Carol", "title": "Song C"}
        ]}}"#;
        let tracks = parse_status(body).unwrap();
        let artists: Vec<_> = tracks.iter().map(|t| t.artist.as_str()).collect();
        assert_eq!(artists, ["Alice", "Bob", "Carol"]);
    }

    #[test]
    fn missing_fields_get_defaults() {
        let body = r#"{"icestats": {"source": [{"title": "Song A"}, {"artist": "Bob", "title": null}, {}]}}"#;
        assert_eq!(
            parse_status(body).unwrap(),
            vec![
                NowPlaying::new(UNKNOWN_ARTIST, "Song A"),
                NowPlaying::new("Bob", UNKNOWN_TITLE),
                NowPlaying::new(UNKNOWN_ARTIST, UNKNOWN_TITLE),
            ]
        );
    }

    #[test]
    fn empty_strings_are_kept() {
        let body = r#"{"icestats": {"source": {"artist": "", "title": "Song A"}}}"#;
        assert_eq!(
            parse_status(body).unwrap(),
            vec![NowPlaying::new("", "Song A")]
        );
    }

    #[test]
    fn scalar_fields_are_rendered() {
        let body = r#"{"icestats": {"source": {"artist": "Alice", "title": 1999}}}"#;
        assert_eq!(parse_status(body).unwrap()[0].title, "1999");
    }

    #[test]
    fn missing_keys_are_a_shape_error() {
        for body in [
            r"{}",
            r#"{"icestats": {}}"#,
            r#"{"icestats": null}"#,
            r#"{"icestats": {"server_id": "Icecast 2.4.4"}}"#,
            r"[]",
            r#"{"icestats": "down"}"#,
            r#"{"icestats": 5}"#,
        ] {
            let err = parse_status(body).unwrap_err();
            assert!(matches!(err, Error::UnexpectedShape(_)), "{body}: {err}");
        }
    }

    #[test]
    fn scalar_source_is_a_shape_error() {
        let err = parse_status(r#"{"icestats": {"source": "live"}}"#).unwrap_err();
        assert!(matches!(err, Error::UnexpectedShape(_)));
    }

    #[test]
    fn non_object_entries_are_skipped() {
        let body = r#"{"icestats": {"source": [1, {"artist": "Bob", "title": "Song B"}]}}"#;
        assert_eq!(
            parse_status(body).unwrap(),
            vec![NowPlaying::new("Bob", "Song B")]
        );
    }

    #[test]
    fn invalid_json_is_a_deserialization_error() {
        for body in ["<html>", "", r#"{"icestats": "#] {
            let err = parse_status(body).unwrap_err();
            assert!(matches!(err, Error::Deserialization(_)), "{body}: {err}");
        }
    }
}
