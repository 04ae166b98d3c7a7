//! Error types for framepulse-core

use thiserror::Error;

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for framepulse-core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Offline storage errors
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Event reporting errors
    #[error("report error: {0}")]
    Report(#[from] ReportError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Runtime wiring errors (missing async runtime, channel failures)
    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Configuration validation and loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(String),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Offline storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage directory unavailable: {0}")]
    DirUnavailable(String),

    #[error("record write failed: {0}")]
    WriteFailed(String),

    #[error("record exceeds storage quota ({size} > {quota} bytes)")]
    RecordTooLarge { size: u64, quota: u64 },

    #[error("corrupt offline record: {0}")]
    Corrupt(String),
}

/// Event reporter errors
#[derive(Error, Debug)]
pub enum ReportError {
    /// Request never reached the server (DNS, refused, timeout)
    #[error("transport failure: {0}")]
    Transport(String),

    /// Server answered with a non-2xx status
    #[error("server rejected batch: status {status}")]
    Server { status: u16, body: String },

    /// A send was already in flight; the batch was spilled offline
    #[error("reporter busy, batch spilled to offline storage")]
    Busy,
}

impl ReportError {
    /// Whether a failed delivery should be stored for retry.
    ///
    /// Transport and server failures are worth retrying; `Busy` batches
    /// have already been spilled by the reporter itself.
    #[must_use]
    pub fn should_store(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Server { .. })
    }
}
