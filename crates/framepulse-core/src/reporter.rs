//! Batch delivery to the ingestion endpoint.
//!
//! The reporter owns the only suspension point in the pipeline: one
//! spawned task per outbound request, with the producer path never
//! waiting on it. Discipline:
//!
//! - **Single flight.** At most one request is outstanding. A batch that
//!   arrives while one is in flight is spilled to offline storage
//!   immediately - back-pressure sheds to disk, never blocks the caller.
//! - **Failure accounting.** Consecutive failures double a backoff
//!   multiplier (capped) and are spilled for retry, until the failure
//!   ceiling; at the ceiling the batch is discarded to protect the
//!   storage quota from a payload the server keeps rejecting.
//! - **Compression.** Bodies over 1 KiB are gzipped when that actually
//!   makes them smaller.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};

use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::{debug, error, warn};

use crate::config::AgentConfig;
use crate::error::{Error, ReportError, Result};
use crate::event::{Event, EventBatch};
use crate::netlog::NetworkLog;
use crate::storage::OfflineStorage;

/// Bodies below this size are never compressed.
const COMPRESSION_MIN_BYTES: usize = 1024;

/// Backoff multiplier cap.
const MAX_BACKOFF_MULTIPLIER: u32 = 32;

/// Reporter state snapshot for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReporterStats {
    pub consecutive_failures: u32,
    pub backoff_multiplier: u32,
    pub in_flight: bool,
}

struct ReporterInner {
    client: reqwest::Client,
    ingest_url: String,
    app_key: String,
    enable_compression: bool,
    max_consecutive_failures: u32,
    storage: Arc<OfflineStorage>,
    netlog: Arc<NetworkLog>,
    in_flight: AtomicBool,
    consecutive_failures: AtomicU32,
    backoff_multiplier: AtomicU32,
    handle: tokio::runtime::Handle,
}

/// Single-flight batch reporter. Cheap to clone.
#[derive(Clone)]
pub struct EventReporter {
    inner: Arc<ReporterInner>,
}

impl EventReporter {
    /// Build a reporter from config.
    ///
    /// `handle` is the runtime that outbound requests run on; the
    /// producer thread itself never blocks on I/O.
    pub fn new(
        config: &AgentConfig,
        storage: Arc<OfflineStorage>,
        netlog: Arc<NetworkLog>,
        handle: tokio::runtime::Handle,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs_f64(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::Report(ReportError::Transport(e.to_string())))?;

        Ok(Self {
            inner: Arc::new(ReporterInner {
                client,
                ingest_url: config.ingest_url(),
                app_key: config.app_key.clone(),
                enable_compression: config.enable_compression,
                max_consecutive_failures: config.max_consecutive_failures,
                storage,
                netlog,
                in_flight: AtomicBool::new(false),
                consecutive_failures: AtomicU32::new(0),
                backoff_multiplier: AtomicU32::new(1),
                handle,
            }),
        })
    }

    /// Send one batch. Returns immediately; the request runs on the
    /// reporter's runtime. No-op for an empty batch.
    pub fn send_batch(&self, events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        let inner = &self.inner;

        let json = match serde_json::to_vec(&EventBatch::new(events.clone())) {
            Ok(json) => json,
            Err(e) => {
                // Should not happen for well-formed events; nothing to retry.
                error!(error = %e, events = events.len(), "batch serialization failed, dropped");
                return;
            }
        };

        let (payload, compressed) = self.maybe_compress(json);

        if inner.in_flight.swap(true, Ordering::AcqRel) {
            inner
                .netlog
                .log_offline_spill(events.len(), "another batch already in flight");
            if let Err(e) = inner.storage.store(&events) {
                warn!(error = %e, "failed to spill concurrent batch");
            }
            return;
        }

        inner
            .netlog
            .log_request(&inner.ingest_url, payload.len(), compressed, events.len());

        let inner = Arc::clone(inner);
        let task = async move {
            let started = Instant::now();
            let outcome = post(&inner, payload, compressed).await;
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            match outcome {
                Ok(status) => on_success(&inner, elapsed_ms, status, events.len()),
                Err(err) => on_failure(&inner, elapsed_ms, &err, events),
            }
            inner.in_flight.store(false, Ordering::Release);
        };
        self.inner.handle.spawn(task);
    }

    /// Current failure/backoff state.
    #[must_use]
    pub fn stats(&self) -> ReporterStats {
        ReporterStats {
            consecutive_failures: self.inner.consecutive_failures.load(Ordering::Acquire),
            backoff_multiplier: self.inner.backoff_multiplier.load(Ordering::Acquire),
            in_flight: self.inner.in_flight.load(Ordering::Acquire),
        }
    }

    /// Whether a request is currently outstanding.
    #[must_use]
    pub fn is_sending(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    fn maybe_compress(&self, json: Vec<u8>) -> (Vec<u8>, bool) {
        if !self.inner.enable_compression || json.len() <= COMPRESSION_MIN_BYTES {
            return (json, false);
        }
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        let compressed = encoder
            .write_all(&json)
            .and_then(|()| encoder.finish())
            .unwrap_or_default();
        if compressed.is_empty() || compressed.len() >= json.len() {
            // Compression did not help; send plain
            return (json, false);
        }
        self.inner.netlog.log_compression(json.len(), compressed.len());
        (compressed, true)
    }
}

async fn post(
    inner: &ReporterInner,
    payload: Vec<u8>,
    compressed: bool,
) -> std::result::Result<u16, ReportError> {
    let mut request = inner
        .client
        .post(&inner.ingest_url)
        .header("Content-Type", "application/json")
        .body(payload);
    if !inner.app_key.is_empty() {
        request = request.header("X-App-Key", &inner.app_key);
    }
    if compressed {
        request = request.header("Content-Encoding", "gzip");
    }

    let response = request
        .send()
        .await
        .map_err(|e| ReportError::Transport(e.to_string()))?;

    let status = response.status();
    if status.is_success() {
        Ok(status.as_u16())
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(ReportError::Server {
            status: status.as_u16(),
            body,
        })
    }
}

fn on_success(inner: &ReporterInner, elapsed_ms: f64, status: u16, event_count: usize) {
    inner.consecutive_failures.store(0, Ordering::Release);
    inner.backoff_multiplier.store(1, Ordering::Release);
    inner
        .netlog
        .log_response(&inner.ingest_url, status, elapsed_ms, event_count);
    debug!(status, event_count, "batch delivered");
}

fn on_failure(inner: &ReporterInner, elapsed_ms: f64, err: &ReportError, events: Vec<Event>) {
    let failures = inner.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
    let backoff = inner
        .backoff_multiplier
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |m| {
            Some((m * 2).min(MAX_BACKOFF_MULTIPLIER))
        })
        .unwrap_or(MAX_BACKOFF_MULTIPLIER);

    let status = match err {
        ReportError::Server { status, .. } => Some(*status),
        _ => None,
    };
    inner.netlog.log_failure(
        &inner.ingest_url,
        status,
        &err.to_string(),
        elapsed_ms,
        events.len(),
        failures,
        backoff,
    );

    if failures < inner.max_consecutive_failures {
        inner
            .netlog
            .log_offline_spill(events.len(), "request failed, storing for retry");
        if let Err(e) = inner.storage.store(&events) {
            warn!(error = %e, "failed to store batch offline");
        }
    } else {
        warn!(
            failures,
            ceiling = inner.max_consecutive_failures,
            events = events.len(),
            "failure ceiling reached, batch discarded"
        );
        inner
            .netlog
            .log_offline_spill(events.len(), "failure ceiling reached, batch discarded");
    }
}
