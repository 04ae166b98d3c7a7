//! The agent: one explicitly-owned pipeline object.
//!
//! `Agent::new` wires session identity, the batching queue, the reporter,
//! offline storage and the detectors together; `shutdown` stops the
//! detectors and performs one final flush. There is no global instance -
//! the host constructs the agent, passes it to collaborators by
//! reference, and tears it down when done.
//!
//! Call discipline: the host drives `record_frame` once per tick from a
//! single thread (the hot path - no allocation beyond emitted events, no
//! blocking I/O); the other `record_*` hooks are called from that same
//! thread as signals arrive. Network delivery runs on the tokio runtime
//! the agent was created in.
//!
//! Nothing here ever returns an error to the per-frame path: failures
//! are absorbed and logged.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::clock::SharedClock;
use crate::collectors::{
    Collector, ExceptionCollector, ExceptionGroup, JankDetector, LogSeverity, MemoryMonitor,
    MemoryStats, PerfCollector, SceneLoadTracker, StartupTracker,
};
use crate::collectors::exception::fingerprint;
use crate::config::AgentConfig;
use crate::error::{Error, Result};
use crate::event::{CommonContext, Event, EventPayload};
use crate::netlog::{NetworkLog, NetworkLogEntry};
use crate::queue::EventQueue;
use crate::reporter::{EventReporter, ReporterStats};
use crate::session::SessionManager;
use crate::storage::OfflineStorage;

/// Host-provided device metadata, stamped into every event.
#[derive(Debug, Clone)]
pub struct HostInfo {
    pub platform: String,
    pub device_model: String,
    pub os_version: String,
}

impl HostInfo {
    /// Placeholder metadata for hosts that have none.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            platform: "Unknown".to_string(),
            device_model: "Unknown".to_string(),
            os_version: "Unknown".to_string(),
        }
    }
}

struct Detectors {
    perf: Option<PerfCollector>,
    jank: Option<JankDetector>,
    memory: MemoryMonitor,
    startup: Option<StartupTracker>,
    scene: Option<SceneLoadTracker>,
    exceptions: Option<ExceptionCollector>,
}

struct Inner {
    config: AgentConfig,
    host: HostInfo,
    clock: SharedClock,
    session: Mutex<SessionManager>,
    queue: Arc<EventQueue>,
    reporter: EventReporter,
    storage: Arc<OfflineStorage>,
    netlog: Arc<NetworkLog>,
    detectors: Mutex<Detectors>,
    current_scene: Mutex<Option<String>>,
    shut_down: AtomicBool,
}

/// In-process telemetry agent.
pub struct Agent {
    /// `None` when disabled by configuration: every call is a no-op.
    inner: Option<Inner>,
}

impl Agent {
    /// Construct and start the agent.
    ///
    /// Must be called within a tokio runtime; network delivery runs on
    /// it. Previously spilled batches are replayed immediately.
    pub fn new(config: AgentConfig, host: HostInfo, clock: SharedClock) -> Result<Self> {
        config.validate()?;

        if !config.enabled {
            info!("telemetry agent disabled by configuration");
            return Ok(Self { inner: None });
        }

        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Runtime(format!("agent requires a tokio runtime: {e}")))?;

        let data_dir = config.resolved_data_dir();
        info!(
            app_version = %config.app_version,
            server = %config.server_url,
            data_dir = %data_dir.display(),
            "initializing telemetry agent"
        );

        let netlog = Arc::new(NetworkLog::new(
            Arc::clone(&clock),
            config.network_log_to_file.then(|| data_dir.clone()),
        ));
        let storage = Arc::new(OfflineStorage::new(
            data_dir.join("offline"),
            config.max_offline_storage_bytes,
            config.enable_offline_storage,
            Arc::clone(&clock),
        ));
        let reporter = EventReporter::new(
            &config,
            Arc::clone(&storage),
            Arc::clone(&netlog),
            handle,
        )?;
        let session = SessionManager::new(
            &data_dir,
            config.background_timeout_secs,
            Arc::clone(&clock),
        );

        let queue = Arc::new(EventQueue::new(
            config.max_queue_size,
            config.batch_size,
            config.flush_interval_secs,
            Arc::clone(&clock),
        ));
        {
            let reporter = reporter.clone();
            queue.subscribe(Box::new(move |batch| {
                reporter.send_batch(batch.to_vec());
            }));
        }

        let detectors = Self::build_detectors(&config, clock.monotonic_secs());

        // Re-feed batches stranded by a previous run
        let mut replayed_events = 0usize;
        let replayed_records = storage.replay(|events| {
            replayed_events += events.len();
            reporter.send_batch(events);
        });
        if replayed_records > 0 {
            netlog.log_offline_replay(replayed_records, replayed_events);
        }

        info!("telemetry agent initialized");
        Ok(Self {
            inner: Some(Inner {
                config,
                host,
                clock,
                session: Mutex::new(session),
                queue,
                reporter,
                storage,
                netlog,
                detectors: Mutex::new(detectors),
                current_scene: Mutex::new(None),
                shut_down: AtomicBool::new(false),
            }),
        })
    }

    fn build_detectors(config: &AgentConfig, now_secs: f64) -> Detectors {
        let mut perf = config
            .enable_performance
            .then(|| PerfCollector::new(config.sampling_interval_secs));
        if let Some(p) = &mut perf {
            p.start();
        }

        let mut jank = config.enable_jank_detection.then(|| {
            JankDetector::new(config.jank_threshold_ms, config.sustained_jank_threshold_ms)
        });
        if let Some(j) = &mut jank {
            j.start();
        }

        let mut memory = MemoryMonitor::new();
        memory.start();

        let mut startup = config.enable_startup_timing.then(StartupTracker::new);
        if let Some(s) = &mut startup {
            s.start_at(now_secs);
        }

        let mut scene = config.enable_scene_load_tracking.then(SceneLoadTracker::new);
        if let Some(s) = &mut scene {
            s.start();
        }

        let mut exceptions = config.enable_exception_capture.then(ExceptionCollector::new);
        if let Some(e) = &mut exceptions {
            e.start();
        }

        Detectors {
            perf,
            jank,
            memory,
            startup,
            scene,
            exceptions,
        }
    }

    /// Whether the agent is live (enabled and not shut down).
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|inner| !inner.shut_down.load(Ordering::Acquire))
    }

    fn live(&self) -> Option<&Inner> {
        self.inner
            .as_ref()
            .filter(|inner| !inner.shut_down.load(Ordering::Acquire))
    }

    // -- Inbound collector surface -------------------------------------------

    /// Per-tick hook: feed one frame time and drive every detector.
    pub fn record_frame(&self, frame_time_ms: f64) {
        let Some(inner) = self.live() else { return };
        let now = inner.clock.monotonic_secs();

        let mut payloads: Vec<EventPayload> = Vec::new();
        {
            let mut detectors = inner.detectors.lock().expect("detector lock poisoned");
            let memory_stats = detectors.memory.recent_stats();
            let used_mb = detectors.memory.used_mb();

            if let Some(startup) = &mut detectors.startup {
                startup.on_frame(now);
            }

            if let Some(window) = detectors
                .perf
                .as_mut()
                .and_then(|perf| perf.on_frame(now, frame_time_ms))
            {
                payloads.push(EventPayload::PerfSample {
                    fps: window.fps,
                    frame_time_ms: window.avg_frame_ms,
                    // Main-thread time approximates frame time on hosts
                    // without a dedicated profiler hook
                    main_thread_ms: window.avg_frame_ms,
                    gc_alloc_kb: memory_stats.gc_alloc_kb,
                    mem_mb: used_mb,
                });
            }

            if let Some(episode) = detectors
                .jank
                .as_mut()
                .and_then(|jank| jank.on_frame(now, frame_time_ms))
            {
                debug!(
                    duration_ms = episode.duration_ms,
                    max_frame_ms = episode.max_frame_ms,
                    "jank episode detected"
                );
                payloads.push(EventPayload::Jank {
                    duration_ms: episode.duration_ms,
                    max_frame_ms: episode.max_frame_ms,
                    recent_gc_count: memory_stats.gc_count,
                    recent_gc_alloc_kb: memory_stats.gc_alloc_kb,
                    recent_events: episode.recent_events,
                });
            }

            if let Some(exceptions) = &mut detectors.exceptions {
                for group in exceptions.tick(now) {
                    payloads.push(exception_payload(group));
                }
            }
        }

        for payload in payloads {
            self.enqueue(inner, payload);
        }
        inner.queue.update();
    }

    /// Capture a log message; error severities feed exception dedupe.
    pub fn record_log_message(&self, message: &str, stack: &str, severity: LogSeverity) {
        let Some(inner) = self.live() else { return };
        let now = inner.clock.monotonic_secs();
        let unix_ms = inner.clock.unix_ms();

        let flushed = {
            let mut detectors = inner.detectors.lock().expect("detector lock poisoned");
            match &mut detectors.exceptions {
                Some(exceptions) => exceptions.record(now, unix_ms, message, stack, severity),
                None => Vec::new(),
            }
        };
        for group in flushed {
            self.enqueue(inner, exception_payload(group));
        }
    }

    /// Append a breadcrumb for crash context.
    pub fn record_breadcrumb(&self, text: &str) {
        let Some(inner) = self.live() else { return };
        let unix_ms = inner.clock.unix_ms();
        let mut detectors = inner.detectors.lock().expect("detector lock poisoned");
        if let Some(exceptions) = &mut detectors.exceptions {
            exceptions.record_breadcrumb(unix_ms, text);
        }
    }

    /// Note a gameplay event for jank episode context.
    pub fn note_event(&self, description: &str) {
        let Some(inner) = self.live() else { return };
        let now = inner.clock.monotonic_secs();
        let mut detectors = inner.detectors.lock().expect("detector lock poisoned");
        if let Some(jank) = &mut detectors.jank {
            jank.note_event(now, description);
        }
    }

    /// Feed a host memory reading (heap bytes, cumulative GC count).
    pub fn record_memory_sample(&self, heap_bytes: u64, gc_collections: u64) {
        let Some(inner) = self.live() else { return };
        let now = inner.clock.monotonic_secs();
        let mut detectors = inner.detectors.lock().expect("detector lock poisoned");
        detectors.memory.on_sample(now, heap_bytes, gc_collections);
    }

    /// An async scene load began.
    pub fn begin_scene_load(&self, scene_name: &str) {
        let Some(inner) = self.live() else { return };
        let now = inner.clock.monotonic_secs();
        let mut detectors = inner.detectors.lock().expect("detector lock poisoned");
        if let Some(scene) = &mut detectors.scene {
            scene.begin_load(scene_name, now);
        }
    }

    /// The async load finished; activation begins.
    pub fn scene_load_ready(&self, scene_name: &str) {
        let Some(inner) = self.live() else { return };
        let now = inner.clock.monotonic_secs();
        let mut detectors = inner.detectors.lock().expect("detector lock poisoned");
        if let Some(scene) = &mut detectors.scene {
            scene.mark_loaded(scene_name, now);
        }
    }

    /// The scene finished activating: emits the scene-load event and
    /// becomes the current scene for subsequent context stamps.
    pub fn scene_activated(&self, scene_name: &str) {
        let Some(inner) = self.live() else { return };
        let now = inner.clock.monotonic_secs();

        let timing = {
            let mut detectors = inner.detectors.lock().expect("detector lock poisoned");
            detectors
                .scene
                .as_mut()
                .and_then(|scene| scene.complete(scene_name, now))
        };

        *inner.current_scene.lock().expect("scene lock poisoned") = Some(scene_name.to_string());
        self.record_breadcrumb(&format!("Scene: {scene_name}"));

        if let Some(timing) = timing {
            self.enqueue(
                inner,
                EventPayload::SceneLoad {
                    scene_name: timing.scene_name,
                    load_ms: timing.load_ms,
                    activate_ms: timing.activate_ms,
                },
            );
        }
    }

    /// The app is ready for user input; emits the startup event once.
    pub fn mark_time_to_interactive(&self) {
        let Some(inner) = self.live() else { return };
        let now = inner.clock.monotonic_secs();
        let timing = {
            let mut detectors = inner.detectors.lock().expect("detector lock poisoned");
            detectors
                .startup
                .as_mut()
                .and_then(|startup| startup.mark_tti(now))
        };
        if let Some(timing) = timing {
            info!(
                phase1_ms = timing.phase1_ms,
                phase2_ms = timing.phase2_ms,
                tti_ms = timing.tti_ms,
                "startup tracked"
            );
            self.enqueue(
                inner,
                EventPayload::Startup {
                    phase1_ms: timing.phase1_ms,
                    phase2_ms: timing.phase2_ms,
                    tti_ms: timing.tti_ms,
                },
            );
        }
    }

    /// Host crash handler hook: emit a crash event with the breadcrumb
    /// trail and push it toward the wire immediately.
    pub fn record_crash(&self, crash_type: &str, stack: &str) {
        let Some(inner) = self.live() else { return };
        let breadcrumbs = {
            let detectors = inner.detectors.lock().expect("detector lock poisoned");
            detectors
                .exceptions
                .as_ref()
                .map(ExceptionCollector::breadcrumbs)
                .unwrap_or_default()
        };
        self.enqueue(
            inner,
            EventPayload::Crash {
                crash_type: crash_type.to_string(),
                fingerprint: fingerprint(crash_type, stack),
                stack: stack.to_string(),
                breadcrumbs,
            },
        );
        inner.queue.flush();
    }

    // -- Session control ------------------------------------------------------

    pub fn set_user_id(&self, user_id: &str) {
        if let Some(inner) = self.live() {
            inner
                .session
                .lock()
                .expect("session lock poisoned")
                .set_user_id(user_id);
        }
    }

    pub fn clear_user_id(&self) {
        if let Some(inner) = self.live() {
            inner
                .session
                .lock()
                .expect("session lock poisoned")
                .clear_user_id();
        }
    }

    /// Privacy reset of the stable device identifier.
    pub fn reset_device_id(&self) {
        if let Some(inner) = self.live() {
            inner
                .session
                .lock()
                .expect("session lock poisoned")
                .reset_device_id();
        }
    }

    /// App moved to the background: flush pending events first.
    pub fn on_background(&self) {
        let Some(inner) = self.live() else { return };
        inner
            .session
            .lock()
            .expect("session lock poisoned")
            .on_background();
        inner.queue.flush();
    }

    /// App returned to the foreground; may start a new session.
    pub fn on_foreground(&self) {
        if let Some(inner) = self.live() {
            inner
                .session
                .lock()
                .expect("session lock poisoned")
                .on_foreground();
        }
    }

    /// Input focus change without backgrounding.
    pub fn on_focus_changed(&self, has_focus: bool) {
        let Some(inner) = self.live() else { return };
        let mut session = inner.session.lock().expect("session lock poisoned");
        if has_focus {
            session.on_focus_gained();
        } else {
            session.on_focus_lost();
        }
    }

    // -- Outbound surface -----------------------------------------------------

    /// Force a transmission attempt of everything pending.
    pub fn flush(&self) {
        if let Some(inner) = self.live() {
            inner.queue.flush();
        }
    }

    /// Stop detectors, flush the exception table and pending events.
    ///
    /// Idempotent; the agent is inert afterwards. In-flight network
    /// requests complete or time out on their own.
    pub fn shutdown(&self) {
        let Some(inner) = self.inner.as_ref() else {
            return;
        };
        if inner.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("shutting down telemetry agent");

        let flushed = {
            let mut detectors = inner.detectors.lock().expect("detector lock poisoned");
            if let Some(perf) = &mut detectors.perf {
                perf.stop();
            }
            if let Some(jank) = &mut detectors.jank {
                jank.stop();
            }
            detectors.memory.stop();
            if let Some(startup) = &mut detectors.startup {
                startup.stop();
            }
            if let Some(scene) = &mut detectors.scene {
                scene.stop();
            }
            detectors
                .exceptions
                .as_mut()
                .map(ExceptionCollector::stop_and_flush)
                .unwrap_or_default()
        };
        for group in flushed {
            self.enqueue(inner, exception_payload(group));
        }
        inner.queue.flush();
    }

    /// Recent network log entries, oldest first.
    #[must_use]
    pub fn network_logs(&self) -> Vec<NetworkLogEntry> {
        self.inner
            .as_ref()
            .map(|inner| inner.netlog.recent())
            .unwrap_or_default()
    }

    /// Path of the network log file, when file mirroring is on.
    #[must_use]
    pub fn network_log_path(&self) -> Option<PathBuf> {
        self.inner
            .as_ref()
            .and_then(|inner| inner.netlog.file_path().cloned())
    }

    /// Clear the network log (memory and file).
    pub fn clear_network_logs(&self) {
        if let Some(inner) = self.inner.as_ref() {
            inner.netlog.clear();
        }
    }

    /// Recent GC pressure from the memory monitor.
    #[must_use]
    pub fn memory_stats(&self) -> MemoryStats {
        self.inner
            .as_ref()
            .map(|inner| {
                inner
                    .detectors
                    .lock()
                    .expect("detector lock poisoned")
                    .memory
                    .recent_stats()
            })
            .unwrap_or_default()
    }

    /// Current session id (empty when disabled).
    #[must_use]
    pub fn session_id(&self) -> String {
        self.inner
            .as_ref()
            .map(|inner| {
                inner
                    .session
                    .lock()
                    .expect("session lock poisoned")
                    .session_id()
                    .to_string()
            })
            .unwrap_or_default()
    }

    /// Stable device id (empty when disabled).
    #[must_use]
    pub fn device_id(&self) -> String {
        self.inner
            .as_ref()
            .map(|inner| {
                inner
                    .session
                    .lock()
                    .expect("session lock poisoned")
                    .device_id()
                    .to_string()
            })
            .unwrap_or_default()
    }

    /// Events currently buffered in the queue.
    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.inner.as_ref().map_or(0, |inner| inner.queue.len())
    }

    /// Bytes resident in offline storage.
    #[must_use]
    pub fn offline_bytes(&self) -> u64 {
        self.inner
            .as_ref()
            .map_or(0, |inner| inner.storage.total_bytes())
    }

    /// Records resident in offline storage.
    #[must_use]
    pub fn offline_record_count(&self) -> usize {
        self.inner
            .as_ref()
            .map_or(0, |inner| inner.storage.record_count())
    }

    /// Reporter failure/backoff snapshot.
    #[must_use]
    pub fn reporter_stats(&self) -> Option<ReporterStats> {
        self.inner.as_ref().map(|inner| inner.reporter.stats())
    }

    // -- Internals ------------------------------------------------------------

    /// Stamp context and enqueue; ownership passes to the queue.
    fn enqueue(&self, inner: &Inner, payload: EventPayload) {
        inner.queue.enqueue(Event {
            context: self.context(inner),
            payload,
        });
    }

    fn context(&self, inner: &Inner) -> CommonContext {
        let session = inner.session.lock().expect("session lock poisoned");
        CommonContext {
            timestamp: inner.clock.unix_ms(),
            app_version: inner.config.app_version.clone(),
            platform: inner.host.platform.clone(),
            device_model: inner.host.device_model.clone(),
            os_version: inner.host.os_version.clone(),
            session_id: session.session_id().to_string(),
            device_id: session.device_id().to_string(),
            scene: inner
                .current_scene
                .lock()
                .expect("scene lock poisoned")
                .clone(),
        }
    }
}

fn exception_payload(group: ExceptionGroup) -> EventPayload {
    EventPayload::Exception {
        fingerprint: group.fingerprint,
        message: group.message,
        stack: group.stack,
        count: group.count,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::clock::ManualClock;

    fn test_config(dir: &std::path::Path) -> AgentConfig {
        AgentConfig {
            // Nothing listens here; sends fail fast and spill offline
            server_url: "http://127.0.0.1:9".into(),
            data_dir: Some(dir.to_path_buf()),
            batch_size: 100,
            flush_interval_secs: 1000.0,
            ..AgentConfig::default()
        }
    }

    fn agent_with_clock(dir: &std::path::Path) -> (Agent, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let agent = Agent::new(
            test_config(dir),
            HostInfo::unknown(),
            clock.clone() as SharedClock,
        )
        .unwrap();
        (agent, clock)
    }

    #[tokio::test]
    async fn disabled_agent_is_inert() {
        let dir = tempfile::tempdir().unwrap();
        let config = AgentConfig {
            enabled: false,
            ..test_config(dir.path())
        };
        let clock = Arc::new(ManualClock::new(0));
        let agent = Agent::new(config, HostInfo::unknown(), clock as SharedClock).unwrap();

        assert!(!agent.is_active());
        agent.record_frame(16.0);
        agent.record_log_message("Oops: x", "stack", LogSeverity::Error);
        agent.flush();
        assert_eq!(agent.queue_depth(), 0);
        assert!(agent.session_id().is_empty());
    }

    #[tokio::test]
    async fn perf_samples_enqueue_after_window() {
        let dir = tempfile::tempdir().unwrap();
        let (agent, clock) = agent_with_clock(dir.path());

        for _ in 0..70 {
            clock.advance_secs(1.0 / 60.0);
            agent.record_frame(1000.0 / 60.0);
        }
        assert!(agent.queue_depth() >= 1, "a perf sample should be queued");
    }

    #[tokio::test]
    async fn jank_episode_enqueues_event() {
        let dir = tempfile::tempdir().unwrap();
        let (agent, clock) = agent_with_clock(dir.path());

        // Open an episode well past the threshold, then recover
        clock.advance_secs(0.1);
        agent.record_frame(120.0);
        clock.advance_secs(0.12);
        agent.record_frame(120.0);
        clock.advance_secs(0.12);
        agent.record_frame(10.0);
        assert!(agent.queue_depth() >= 1, "jank event should be queued");
    }

    #[tokio::test]
    async fn exception_dedupe_flushes_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let (agent, _clock) = agent_with_clock(dir.path());

        for _ in 0..3 {
            agent.record_log_message("Oops: boom", "at F ()", LogSeverity::Exception);
        }
        assert_eq!(agent.queue_depth(), 0, "deduped, not yet flushed");

        agent.shutdown();
        // Shutdown flushed the dedupe table into the queue and the queue
        // to the reporter; the reporter send fails and spills offline.
        assert!(!agent.is_active());
    }

    #[tokio::test]
    async fn scene_activation_stamps_subsequent_events() {
        let dir = tempfile::tempdir().unwrap();
        let (agent, clock) = agent_with_clock(dir.path());

        agent.begin_scene_load("Level1");
        clock.advance_secs(0.5);
        agent.scene_activated("Level1");
        assert_eq!(agent.queue_depth(), 1, "scene load event queued");

        agent.mark_time_to_interactive();
        assert_eq!(agent.queue_depth(), 2, "startup event queued");
    }

    #[tokio::test]
    async fn tti_reports_only_once() {
        let dir = tempfile::tempdir().unwrap();
        let (agent, clock) = agent_with_clock(dir.path());
        clock.advance_secs(1.0);
        agent.mark_time_to_interactive();
        agent.mark_time_to_interactive();
        assert_eq!(agent.queue_depth(), 1);
    }

    #[tokio::test]
    async fn session_identity_present() {
        let dir = tempfile::tempdir().unwrap();
        let (agent, _clock) = agent_with_clock(dir.path());
        assert_eq!(agent.device_id().len(), 32);
        assert!(agent.session_id().contains('_'));
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (agent, _clock) = agent_with_clock(dir.path());
        agent.shutdown();
        agent.shutdown();
        assert!(!agent.is_active());
    }

    #[tokio::test]
    async fn crash_event_carries_breadcrumbs_and_flushes() {
        let dir = tempfile::tempdir().unwrap();
        let (agent, _clock) = agent_with_clock(dir.path());

        agent.record_breadcrumb("entered boss room");
        agent.record_crash("sigsegv", "frame0\nframe1");
        // Crash flushes immediately; nothing should linger in the queue
        assert_eq!(agent.queue_depth(), 0);
    }

    #[tokio::test]
    async fn background_flushes_pending_events() {
        let dir = tempfile::tempdir().unwrap();
        let (agent, clock) = agent_with_clock(dir.path());
        clock.advance_secs(1.0);
        agent.mark_time_to_interactive();
        assert_eq!(agent.queue_depth(), 1);
        agent.on_background();
        assert_eq!(agent.queue_depth(), 0);
    }
}
