//! Tracklogger - log what an Icecast server is playing
//!
//! This library polls an Icecast status endpoint, extracts the artist and title
//! of every active source and appends new tracks to one log file per day.

/// Client modules for the status endpoint and local log storage
pub mod clients;
/// Fetch, dedupe and append, one tick at a time
pub mod tracker;

pub use tracker::{Config, ConfigBuilder, TickReport, Tracker};
