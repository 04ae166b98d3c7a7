//! framepulse-core: in-process telemetry agent for interactive applications.
//!
//! The agent samples per-frame performance signals at high frequency,
//! turns them into discrete events through stateful detectors, batches
//! them off the frame path, ships them to an ingestion endpoint, and
//! spills undelivered batches to durable storage for replay at the next
//! startup.
//!
//! # Architecture
//!
//! ```text
//! host signals → Detectors → EventQueue (lock-free ring) ─┐
//!                                  │ batch threshold       │
//!                                  ▼                       │
//!                            EventReporter ── success ── drop
//!                                  │ failure / busy
//!                                  ▼
//!                            OfflineStorage ── replay at startup
//! ```
//!
//! # Modules
//!
//! - `agent`: the owned pipeline object hosts construct and drive
//! - `collectors`: stateful detectors (perf, jank, memory, startup,
//!   scene, exception)
//! - `queue`: batching and flush policy over the frame-path ring
//! - `spsc`: lock-free bounded event ring (one producer, one consumer)
//! - `ring`: owned window ring for detector context and logs
//! - `reporter`: single-flight HTTP delivery with failure backoff
//! - `storage`: quota-bounded offline spill and replay
//! - `session`: device identity and session boundaries
//! - `event`: the closed event set and wire format
//! - `netlog`: bounded network activity log for diagnostics
//! - `config`: tunables, TOML loading, validation
//! - `clock`: injectable time source
//! - `logging`: tracing subscriber setup
//!
//! # Hot-path guarantees
//!
//! `Agent::record_frame` never blocks and never returns an error to the
//! host: enqueue is lock-free with overwrite-oldest semantics, flush
//! decisions take one short critical section, and all network and disk
//! I/O happens off the frame path.
//!
//! # Safety
//!
//! This crate forbids unsafe code.

#![forbid(unsafe_code)]

pub mod agent;
pub mod clock;
pub mod collectors;
pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod netlog;
pub mod queue;
pub mod reporter;
pub mod ring;
pub mod session;
pub mod spsc;
pub mod storage;

pub use agent::{Agent, HostInfo};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use collectors::LogSeverity;
pub use config::AgentConfig;
pub use error::{Error, Result};
pub use event::{CommonContext, Event, EventBatch, EventPayload};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
