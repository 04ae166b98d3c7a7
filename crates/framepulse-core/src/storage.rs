//! Durable offline storage for undelivered batches.
//!
//! Each batch that could not be delivered becomes one immutable JSON file
//! whose name embeds a monotonically increasing key, so lexicographic
//! order is chronological order: eviction removes the oldest records
//! first, and replay walks them oldest first.
//!
//! The byte quota is a real bound: writing a record that would exceed it
//! first evicts old records until the new one fits, and a record that is
//! larger than the entire quota is rejected outright.
//!
//! Replay is at-most-once per process start - a record is deleted when it
//! is handed back to the reporter, before the resend completes. A crash
//! in that window loses the batch; that is the accepted trade-off, not a
//! delivery guarantee.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, error, info, warn};

use crate::clock::SharedClock;
use crate::error::{Result, StorageError};
use crate::event::{Event, EventBatch};

const FILE_PREFIX: &str = "offline_";
const FILE_EXTENSION: &str = "json";

struct StoreState {
    current_bytes: u64,
}

/// Size-bounded FIFO store of serialized batches.
pub struct OfflineStorage {
    enabled: bool,
    dir: PathBuf,
    quota_bytes: u64,
    state: Mutex<StoreState>,
    /// Disambiguates records written within the same millisecond.
    seq: AtomicU64,
    clock: SharedClock,
}

impl OfflineStorage {
    /// Open (or create) the store under `dir`.
    ///
    /// Resident bytes are rescanned from disk so the quota survives
    /// process restarts. Directory creation failure disables the store.
    #[must_use]
    pub fn new(dir: PathBuf, quota_bytes: u64, enabled: bool, clock: SharedClock) -> Self {
        let enabled = enabled
            && match fs::create_dir_all(&dir) {
                Ok(()) => true,
                Err(e) => {
                    error!(dir = %dir.display(), error = %e, "offline storage unavailable");
                    false
                }
            };

        let current_bytes = if enabled { scan_size(&dir) } else { 0 };
        Self {
            enabled,
            dir,
            quota_bytes,
            state: Mutex::new(StoreState { current_bytes }),
            seq: AtomicU64::new(0),
            clock,
        }
    }

    /// Whether the store accepts writes.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Persist one batch for later replay.
    ///
    /// No-op when disabled or empty. Evicts oldest records to honor the
    /// quota; rejects a record that alone exceeds it.
    pub fn store(&self, events: &[Event]) -> Result<()> {
        if !self.enabled || events.is_empty() {
            return Ok(());
        }

        let json = serde_json::to_vec(&EventBatch::new(events.to_vec()))?;
        let size = json.len() as u64;
        if size > self.quota_bytes {
            warn!(
                size,
                quota = self.quota_bytes,
                "batch larger than storage quota, dropped"
            );
            return Err(StorageError::RecordTooLarge {
                size,
                quota: self.quota_bytes,
            }
            .into());
        }

        let mut state = self.state.lock().expect("storage lock poisoned");
        if state.current_bytes + size > self.quota_bytes {
            self.evict_oldest(&mut state, size);
        }

        let name = format!(
            "{FILE_PREFIX}{:013}_{:06}.{FILE_EXTENSION}",
            self.clock.unix_ms(),
            self.seq.fetch_add(1, Ordering::Relaxed),
        );
        let path = self.dir.join(name);
        fs::write(&path, &json)
            .map_err(|e| StorageError::WriteFailed(format!("{}: {e}", path.display())))?;
        state.current_bytes += size;
        debug!(
            events = events.len(),
            bytes = size,
            path = %path.display(),
            "batch stored offline"
        );
        Ok(())
    }

    /// Replay stored records oldest-first through `handler`.
    ///
    /// Each record is deleted when it is read, before its resend can
    /// complete, and corrupt records are deleted without being handed
    /// off. The handler runs outside the storage lock, so it may store
    /// new records (a failed resend spills right back). Returns the
    /// number of records replayed.
    pub fn replay<F>(&self, mut handler: F) -> usize
    where
        F: FnMut(Vec<Event>),
    {
        if !self.enabled {
            return 0;
        }

        let batches = {
            let mut state = self.state.lock().expect("storage lock poisoned");
            let files = self.list_records();
            if files.is_empty() {
                return 0;
            }
            info!(records = files.len(), "processing offline records");

            let mut batches = Vec::new();
            for path in files {
                let size = path.metadata().map(|m| m.len()).unwrap_or(0);
                let raw = fs::read_to_string(&path);
                if let Err(e) = fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %e, "failed to delete offline record");
                }
                state.current_bytes = state.current_bytes.saturating_sub(size);

                match raw.map_err(|e| e.to_string()).and_then(|json| {
                    serde_json::from_str::<EventBatch>(&json).map_err(|e| e.to_string())
                }) {
                    Ok(batch) if !batch.events.is_empty() => batches.push(batch.events),
                    Ok(_) => {}
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "corrupt offline record deleted");
                    }
                }
            }
            batches
        };

        let replayed = batches.len();
        for events in batches {
            handler(events);
        }
        replayed
    }

    /// Delete every record and reset size accounting.
    pub fn clear(&self) {
        let mut state = self.state.lock().expect("storage lock poisoned");
        for path in self.list_records() {
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "failed to delete offline record");
            }
        }
        state.current_bytes = 0;
    }

    /// Resident bytes across all records.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.state.lock().expect("storage lock poisoned").current_bytes
    }

    /// Number of resident records.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.list_records().len()
    }

    /// Record paths sorted oldest first (filename key order).
    fn list_records(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(std::result::Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(FILE_PREFIX) && n.ends_with(FILE_EXTENSION))
            })
            .collect();
        files.sort();
        files
    }

    /// Delete oldest records until `incoming` bytes fit under the quota.
    fn evict_oldest(&self, state: &mut StoreState, incoming: u64) {
        for path in self.list_records() {
            if state.current_bytes + incoming <= self.quota_bytes {
                break;
            }
            let size = path.metadata().map(|m| m.len()).unwrap_or(0);
            match fs::remove_file(&path) {
                Ok(()) => {
                    state.current_bytes = state.current_bytes.saturating_sub(size);
                    debug!(path = %path.display(), bytes = size, "evicted oldest offline record");
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to evict offline record");
                }
            }
        }
    }
}

fn scan_size(dir: &Path) -> u64 {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(std::result::Result::ok)
        .filter(|e| {
            e.file_name()
                .to_str()
                .is_some_and(|n| n.starts_with(FILE_PREFIX) && n.ends_with(FILE_EXTENSION))
        })
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}
