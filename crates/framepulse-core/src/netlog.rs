//! Network activity log.
//!
//! Records every exchange with the ingestion endpoint - requests,
//! responses, failures, offline spills, compression decisions - in a
//! bounded in-memory ring the host can read for diagnostics, optionally
//! mirrored to a file under the data directory. Entries are also mirrored
//! to `tracing` at matching levels.
//!
//! The app key is masked before it reaches any log line.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::SharedClock;
use crate::ring::RingBuffer;

/// In-memory entries retained.
const MAX_RECENT_ENTRIES: usize = 100;

const LOG_FILE_NAME: &str = "network.log";

/// What a log entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetLogKind {
    Request,
    Response,
    Failure,
    OfflineSpill,
    OfflineReplay,
    Compression,
}

/// One network log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkLogEntry {
    pub unix_ms: i64,
    pub kind: NetLogKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_bytes: Option<usize>,
    #[serde(default)]
    pub compressed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consecutive_failures: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_multiplier: Option<u32>,
}

impl NetworkLogEntry {
    fn new(unix_ms: i64, kind: NetLogKind, message: String) -> Self {
        Self {
            unix_ms,
            kind,
            message,
            url: None,
            status: None,
            error: None,
            elapsed_ms: None,
            event_count: None,
            body_bytes: None,
            compressed: false,
            consecutive_failures: None,
            backoff_multiplier: None,
        }
    }
}

struct LogState {
    recent: RingBuffer<NetworkLogEntry>,
}

/// Bounded, maskable log of reporter activity.
pub struct NetworkLog {
    state: Mutex<LogState>,
    file_path: Option<PathBuf>,
    clock: SharedClock,
}

impl NetworkLog {
    /// Create a log; `file_dir` enables mirroring entries to
    /// `<dir>/network.log`.
    #[must_use]
    pub fn new(clock: SharedClock, file_dir: Option<PathBuf>) -> Self {
        Self {
            state: Mutex::new(LogState {
                recent: RingBuffer::new(MAX_RECENT_ENTRIES),
            }),
            file_path: file_dir.map(|dir| dir.join(LOG_FILE_NAME)),
            clock,
        }
    }

    pub fn log_request(&self, url: &str, body_bytes: usize, compressed: bool, event_count: usize) {
        let gz = if compressed { ", gzip" } else { "" };
        let mut entry = NetworkLogEntry::new(
            self.clock.unix_ms(),
            NetLogKind::Request,
            format!("REQUEST: POST {url} ({body_bytes} bytes{gz}, {event_count} events)"),
        );
        entry.url = Some(url.to_string());
        entry.body_bytes = Some(body_bytes);
        entry.compressed = compressed;
        entry.event_count = Some(event_count);
        debug!(url, body_bytes, compressed, event_count, "sending batch");
        self.push(entry);
    }

    pub fn log_response(&self, url: &str, status: u16, elapsed_ms: f64, event_count: usize) {
        let mut entry = NetworkLogEntry::new(
            self.clock.unix_ms(),
            NetLogKind::Response,
            format!("RESPONSE: {status} from {url} ({elapsed_ms:.0}ms, {event_count} events)"),
        );
        entry.url = Some(url.to_string());
        entry.status = Some(status);
        entry.elapsed_ms = Some(elapsed_ms);
        entry.event_count = Some(event_count);
        debug!(url, status, elapsed_ms, event_count, "batch delivered");
        self.push(entry);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn log_failure(
        &self,
        url: &str,
        status: Option<u16>,
        error: &str,
        elapsed_ms: f64,
        event_count: usize,
        consecutive_failures: u32,
        backoff_multiplier: u32,
    ) {
        let mut entry = NetworkLogEntry::new(
            self.clock.unix_ms(),
            NetLogKind::Failure,
            format!(
                "FAILURE: {error} from {url} (status: {}, {elapsed_ms:.0}ms, failures: {consecutive_failures}, backoff: {backoff_multiplier}x)",
                status.map_or_else(|| "none".to_string(), |s| s.to_string()),
            ),
        );
        entry.url = Some(url.to_string());
        entry.status = status;
        entry.error = Some(error.to_string());
        entry.elapsed_ms = Some(elapsed_ms);
        entry.event_count = Some(event_count);
        entry.consecutive_failures = Some(consecutive_failures);
        entry.backoff_multiplier = Some(backoff_multiplier);
        warn!(
            url,
            status,
            error,
            consecutive_failures,
            backoff_multiplier,
            "batch delivery failed"
        );
        self.push(entry);
    }

    pub fn log_offline_spill(&self, event_count: usize, reason: &str) {
        let mut entry = NetworkLogEntry::new(
            self.clock.unix_ms(),
            NetLogKind::OfflineSpill,
            format!("OFFLINE_SPILL: {event_count} events stored - {reason}"),
        );
        entry.event_count = Some(event_count);
        warn!(event_count, reason, "batch spilled to offline storage");
        self.push(entry);
    }

    pub fn log_offline_replay(&self, record_count: usize, event_count: usize) {
        let mut entry = NetworkLogEntry::new(
            self.clock.unix_ms(),
            NetLogKind::OfflineReplay,
            format!("OFFLINE_REPLAY: {record_count} records ({event_count} events)"),
        );
        entry.event_count = Some(event_count);
        info!(record_count, event_count, "replaying offline records");
        self.push(entry);
    }

    pub fn log_compression(&self, original_bytes: usize, compressed_bytes: usize) {
        let ratio = compressed_bytes as f64 / original_bytes.max(1) as f64;
        let mut entry = NetworkLogEntry::new(
            self.clock.unix_ms(),
            NetLogKind::Compression,
            format!(
                "COMPRESSION: {original_bytes} -> {compressed_bytes} bytes ({:.0}%)",
                ratio * 100.0
            ),
        );
        entry.body_bytes = Some(compressed_bytes);
        entry.compressed = true;
        debug!(original_bytes, compressed_bytes, "payload compressed");
        self.push(entry);
    }

    /// Recent entries, oldest first.
    #[must_use]
    pub fn recent(&self) -> Vec<NetworkLogEntry> {
        self.state.lock().expect("netlog lock poisoned").recent.to_vec()
    }

    /// Path of the mirror file, when file mirroring is enabled.
    #[must_use]
    pub fn file_path(&self) -> Option<&PathBuf> {
        self.file_path.as_ref()
    }

    /// Drop in-memory entries and the mirror file.
    pub fn clear(&self) {
        self.state.lock().expect("netlog lock poisoned").recent.clear();
        if let Some(path) = &self.file_path {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!(path = %path.display(), error = %e, "failed to remove network log file");
                }
            }
        }
    }

    fn push(&self, entry: NetworkLogEntry) {
        if let Some(path) = &self.file_path {
            let line = format!("[{}] [{:?}] {}\n", entry.unix_ms, entry.kind, entry.message);
            let result = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .and_then(|mut file| file.write_all(line.as_bytes()));
            if let Err(e) = result {
                // Logging must never break the pipeline
                warn!(path = %path.display(), error = %e, "failed to append network log");
            }
        }
        self.state
            .lock()
            .expect("netlog lock poisoned")
            .recent
            .push_overwrite(entry);
    }
}

/// Mask a secret, keeping a short recognizable prefix.
#[must_use]
pub fn mask_secret(value: &str) -> String {
    if value.len() <= 4 {
        return "****".to_string();
    }
    format!("{}****", &value[..4])
}
