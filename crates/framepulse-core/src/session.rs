//! Device identity and session lifecycle.
//!
//! The device id is an anonymous SHA-256 digest (no PII in the seed),
//! persisted under the data directory and stable across sessions until
//! explicitly reset. Session ids are `{unix_ms}_{8 random hex}` and
//! rotate whenever the app returns to the foreground after more than
//! `background_timeout_secs` away.
//!
//! Session state is persisted as JSON so the next process start can
//! correlate a crash with the session it interrupted.

use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::clock::SharedClock;

const DEVICE_ID_FILE: &str = "device_id";
const SESSION_STATE_FILE: &str = "session_state.json";

/// Persisted snapshot of the active session, for crash correlation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionState {
    pub session_id: String,
    pub start_unix_ms: i64,
}

/// Owns device identity and session-boundary logic.
pub struct SessionManager {
    data_dir: PathBuf,
    clock: SharedClock,
    background_timeout_secs: f64,

    device_id: String,
    session_id: String,
    user_id: Option<String>,
    session_start_ms: i64,
    /// Monotonic seconds of the last foreground activity.
    last_activity: f64,
    is_background: bool,
    /// Session state found on disk at startup, from the previous run.
    recovered: Option<SessionState>,
}

impl SessionManager {
    /// Create a session manager rooted at `data_dir`.
    ///
    /// Filesystem failures are absorbed: identity falls back to an
    /// ephemeral id and persistence becomes best-effort.
    #[must_use]
    pub fn new(data_dir: &Path, background_timeout_secs: f64, clock: SharedClock) -> Self {
        if let Err(e) = fs::create_dir_all(data_dir) {
            warn!(dir = %data_dir.display(), error = %e, "data dir unavailable, identity will not persist");
        }

        let recovered = read_session_state(data_dir);
        let device_id = load_or_create_device_id(data_dir, clock.as_ref());
        let last_activity = clock.monotonic_secs();

        let mut manager = Self {
            data_dir: data_dir.to_path_buf(),
            clock,
            background_timeout_secs,
            device_id,
            session_id: String::new(),
            user_id: None,
            session_start_ms: 0,
            last_activity,
            is_background: false,
            recovered,
        };
        manager.start_new_session();
        manager
    }

    /// Stable anonymous device identifier.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Current session identifier.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Optional user correlation id.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Session start, milliseconds since the Unix epoch.
    #[must_use]
    pub fn session_start_ms(&self) -> i64 {
        self.session_start_ms
    }

    /// Seconds the current session has been running.
    #[must_use]
    pub fn session_duration_secs(&self) -> f64 {
        (self.clock.unix_ms() - self.session_start_ms) as f64 / 1000.0
    }

    pub fn set_user_id(&mut self, user_id: impl Into<String>) {
        self.user_id = Some(user_id.into());
    }

    pub fn clear_user_id(&mut self) {
        self.user_id = None;
    }

    /// Regenerate the device id (privacy reset).
    pub fn reset_device_id(&mut self) {
        self.device_id = generate_device_id(self.clock.as_ref());
        persist_device_id(&self.data_dir, &self.device_id);
        info!("device id reset");
    }

    /// Begin a fresh session and persist its state.
    pub fn start_new_session(&mut self) {
        let now_ms = self.clock.unix_ms();
        self.session_id = generate_session_id(now_ms);
        self.session_start_ms = now_ms;
        self.last_activity = self.clock.monotonic_secs();

        let state = SessionState {
            session_id: self.session_id.clone(),
            start_unix_ms: now_ms,
        };
        write_session_state(&self.data_dir, &state);
        debug!(session_id = %self.session_id, "session started");
    }

    /// App moved to the background: stamp the departure time.
    pub fn on_background(&mut self) {
        self.is_background = true;
        self.last_activity = self.clock.monotonic_secs();
    }

    /// App returned to the foreground: split the session if the gap
    /// exceeded the timeout.
    pub fn on_foreground(&mut self) {
        self.is_background = false;
        self.check_session_timeout();
    }

    /// App lost input focus without backgrounding.
    pub fn on_focus_lost(&mut self) {
        self.last_activity = self.clock.monotonic_secs();
    }

    /// App regained input focus.
    pub fn on_focus_gained(&mut self) {
        if !self.is_background {
            self.check_session_timeout();
        }
    }

    /// Record foreground activity to keep the session alive.
    pub fn record_activity(&mut self) {
        self.last_activity = self.clock.monotonic_secs();
    }

    /// Session state left behind by the previous process, if readable.
    #[must_use]
    pub fn previous_session(&self) -> Option<&SessionState> {
        self.recovered.as_ref()
    }

    fn check_session_timeout(&mut self) {
        let away = self.clock.monotonic_secs() - self.last_activity;
        if away > self.background_timeout_secs {
            info!(away_secs = away, "session timeout exceeded, starting new session");
            self.start_new_session();
        } else {
            self.last_activity = self.clock.monotonic_secs();
        }
    }
}

fn generate_session_id(now_ms: i64) -> String {
    let random: u32 = rand::rng().random();
    format!("{now_ms}_{random:08x}")
}

fn generate_device_id(clock: &dyn crate::clock::Clock) -> String {
    // Anonymous seed: wall clock + process randomness, hashed. Nothing
    // device-identifying goes in.
    let random: u128 = rand::rng().random();
    let seed = format!("{}_{}_{:032x}", clock.unix_ms(), std::process::id(), random);
    let digest = Sha256::digest(seed.as_bytes());
    hex::encode(&digest[..16])
}

fn load_or_create_device_id(data_dir: &Path, clock: &dyn crate::clock::Clock) -> String {
    let path = data_dir.join(DEVICE_ID_FILE);
    if let Ok(existing) = fs::read_to_string(&path) {
        let trimmed = existing.trim();
        if trimmed.len() == 32 && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            return trimmed.to_string();
        }
        warn!(path = %path.display(), "malformed device id file, regenerating");
    }
    let id = generate_device_id(clock);
    persist_device_id(data_dir, &id);
    id
}

fn persist_device_id(data_dir: &Path, id: &str) {
    let path = data_dir.join(DEVICE_ID_FILE);
    if let Err(e) = fs::write(&path, id) {
        warn!(path = %path.display(), error = %e, "failed to persist device id");
    }
}

fn read_session_state(data_dir: &Path) -> Option<SessionState> {
    let path = data_dir.join(SESSION_STATE_FILE);
    let raw = fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(state) => Some(state),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable session state, ignoring");
            None
        }
    }
}

fn write_session_state(data_dir: &Path, state: &SessionState) {
    let path = data_dir.join(SESSION_STATE_FILE);
    match serde_json::to_string(state) {
        Ok(json) => {
            if let Err(e) = fs::write(&path, json) {
                warn!(path = %path.display(), error = %e, "failed to persist session state");
            }
        }
        Err(e) => warn!(error = %e, "failed to serialize session state"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::clock::{ManualClock, SharedClock};

    fn manager_with_clock(dir: &Path, timeout: f64) -> (SessionManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let manager = SessionManager::new(dir, timeout, clock.clone() as SharedClock);
        (manager, clock)
    }

    #[test]
    fn device_id_is_stable_across_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let (first, _) = manager_with_clock(dir.path(), 30.0);
        let id = first.device_id().to_string();
        assert_eq!(id.len(), 32);
        drop(first);

        let (second, _) = manager_with_clock(dir.path(), 30.0);
        assert_eq!(second.device_id(), id);
    }

    #[test]
    fn reset_changes_device_id_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let (mut manager, _) = manager_with_clock(dir.path(), 30.0);
        let before = manager.device_id().to_string();
        manager.reset_device_id();
        let after = manager.device_id().to_string();
        assert_ne!(before, after);

        let (reloaded, _) = manager_with_clock(dir.path(), 30.0);
        assert_eq!(reloaded.device_id(), after);
    }

    #[test]
    fn session_id_has_timestamp_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = manager_with_clock(dir.path(), 30.0);
        let id = manager.session_id();
        let (ts, random) = id.split_once('_').expect("underscore separator");
        assert_eq!(ts, "1700000000000");
        assert_eq!(random.len(), 8);
    }

    #[test]
    fn short_background_gap_keeps_session() {
        let dir = tempfile::tempdir().unwrap();
        let (mut manager, clock) = manager_with_clock(dir.path(), 30.0);
        let original = manager.session_id().to_string();

        manager.on_background();
        clock.advance_secs(10.0);
        manager.on_foreground();
        assert_eq!(manager.session_id(), original);
    }

    #[test]
    fn long_background_gap_splits_session() {
        let dir = tempfile::tempdir().unwrap();
        let (mut manager, clock) = manager_with_clock(dir.path(), 30.0);
        let original = manager.session_id().to_string();

        manager.on_background();
        clock.advance_secs(31.0);
        manager.on_foreground();
        assert_ne!(manager.session_id(), original);
    }

    #[test]
    fn focus_gain_while_backgrounded_does_not_split() {
        let dir = tempfile::tempdir().unwrap();
        let (mut manager, clock) = manager_with_clock(dir.path(), 30.0);
        let original = manager.session_id().to_string();

        manager.on_background();
        clock.advance_secs(120.0);
        manager.on_focus_gained(); // still backgrounded
        assert_eq!(manager.session_id(), original);
    }

    #[test]
    fn activity_prevents_timeout_split() {
        let dir = tempfile::tempdir().unwrap();
        let (mut manager, clock) = manager_with_clock(dir.path(), 30.0);
        let original = manager.session_id().to_string();

        manager.on_focus_lost();
        clock.advance_secs(20.0);
        manager.record_activity();
        clock.advance_secs(20.0);
        manager.on_focus_gained();
        assert_eq!(manager.session_id(), original);
    }

    #[test]
    fn previous_session_recovered_on_restart() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = manager_with_clock(dir.path(), 30.0);
        let first_session = manager.session_id().to_string();
        drop(manager);

        let (second, _) = manager_with_clock(dir.path(), 30.0);
        let previous = second.previous_session().expect("previous session state");
        assert_eq!(previous.session_id, first_session);
        assert_eq!(previous.start_unix_ms, 1_700_000_000_000);
    }

    #[test]
    fn user_id_is_ephemeral() {
        let dir = tempfile::tempdir().unwrap();
        let (mut manager, _) = manager_with_clock(dir.path(), 30.0);
        assert!(manager.user_id().is_none());
        manager.set_user_id("player-42");
        assert_eq!(manager.user_id(), Some("player-42"));
        manager.clear_user_id();
        assert!(manager.user_id().is_none());
    }
}
