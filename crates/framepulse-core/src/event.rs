//! Event model and wire format.
//!
//! Events are a closed set of variants carried by a tagged enum; the
//! discriminant serializes as the `type` field, and the common context
//! (timestamps, identity, device metadata) flattens alongside the
//! variant-specific payload so each event is one flat JSON object:
//!
//! ```json
//! {"type":"jank","timestamp":1712345678901,"app_version":"1.2.0",
//!  "platform":"Android","session_id":"...","device_id":"...","scene":"Level3",
//!  "duration_ms":120.5,"max_frame_ms":80.2,...}
//! ```
//!
//! Context is stamped exactly once at enqueue time; after that the event
//! is immutable and owned by the queue, then by the reporter or offline
//! storage until delivered or discarded.

use serde::{Deserialize, Serialize};

/// Context fields common to every event, filled in at enqueue time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonContext {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub app_version: String,
    pub platform: String,
    pub device_model: String,
    pub os_version: String,
    pub session_id: String,
    pub device_id: String,
    /// Scene active when the event was recorded, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<String>,
}

/// Variant-specific payload; the discriminant is the wire `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Periodic performance sample aggregated over one sampling window.
    PerfSample {
        fps: f64,
        frame_time_ms: f64,
        main_thread_ms: f64,
        gc_alloc_kb: f64,
        mem_mb: f64,
    },

    /// One completed jank episode.
    Jank {
        duration_ms: f64,
        max_frame_ms: f64,
        recent_gc_count: u32,
        recent_gc_alloc_kb: f64,
        recent_events: Vec<String>,
    },

    /// Startup phase timings, emitted once per process.
    Startup {
        phase1_ms: f64,
        phase2_ms: f64,
        tti_ms: f64,
    },

    /// One completed scene load.
    SceneLoad {
        scene_name: String,
        load_ms: f64,
        activate_ms: f64,
    },

    /// Deduplicated exception group.
    Exception {
        fingerprint: String,
        message: String,
        stack: String,
        count: u32,
    },

    /// Host-reported crash with breadcrumb trail.
    Crash {
        crash_type: String,
        fingerprint: String,
        stack: String,
        breadcrumbs: Vec<String>,
    },
}

impl EventPayload {
    /// Wire discriminant, for logs and storage diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PerfSample { .. } => "perf_sample",
            Self::Jank { .. } => "jank",
            Self::Startup { .. } => "startup",
            Self::SceneLoad { .. } => "scene_load",
            Self::Exception { .. } => "exception",
            Self::Crash { .. } => "crash",
        }
    }
}

/// A fully-stamped event. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(flatten)]
    pub context: CommonContext,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    /// Wire discriminant of the payload.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }
}

/// Wire envelope: `{"events": [ ... ]}` - also the offline record format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBatch {
    pub events: Vec<Event>,
}

impl EventBatch {
    #[must_use]
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }
}
