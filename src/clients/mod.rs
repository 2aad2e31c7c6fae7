/// Track and log entry types
pub mod entities;
/// Error types and result aliases
pub mod errors;
/// Icecast status endpoint client
pub mod icecast;
/// Daily log files and duplicate detection
pub mod local_storage;

pub use icecast::IcecastClient;
pub use local_storage::LocalStorage;
