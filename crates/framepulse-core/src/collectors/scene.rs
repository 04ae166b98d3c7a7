//! Scene load timing.
//!
//! Loads are tracked as begin/complete pairs keyed by scene name, with an
//! optional mid-marker separating async load time from activation time.
//! A completion with no recorded begin still emits - as a zero-duration
//! event - so scene transitions remain countable even when the host could
//! not instrument the load start.

use std::collections::HashMap;

use tracing::debug;

use super::Collector;

/// One completed scene load.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneLoadTiming {
    pub scene_name: String,
    pub load_ms: f64,
    pub activate_ms: f64,
}

#[derive(Debug, Clone, Copy)]
struct PendingLoad {
    begin_secs: f64,
    /// Set by the mid-marker: async load finished, activation began.
    loaded_secs: Option<f64>,
}

/// Begin/complete pairing for scene loads.
#[derive(Debug)]
pub struct SceneLoadTracker {
    active: bool,
    pending: HashMap<String, PendingLoad>,
}

impl SceneLoadTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: false,
            pending: HashMap::new(),
        }
    }

    /// Record the start of an async scene load.
    pub fn begin_load(&mut self, name: &str, now_secs: f64) {
        if !self.active {
            return;
        }
        self.pending.insert(
            name.to_string(),
            PendingLoad {
                begin_secs: now_secs,
                loaded_secs: None,
            },
        );
    }

    /// Record that the async load finished and activation begins.
    pub fn mark_loaded(&mut self, name: &str, now_secs: f64) {
        if !self.active {
            return;
        }
        if let Some(pending) = self.pending.get_mut(name) {
            pending.loaded_secs = Some(now_secs);
        }
    }

    /// Record activation completion; emits the scene-load event.
    ///
    /// With no recorded begin (synchronous load), the event carries zero
    /// durations. With no mid-marker, all elapsed time counts as load.
    pub fn complete(&mut self, name: &str, now_secs: f64) -> Option<SceneLoadTiming> {
        if !self.active {
            return None;
        }

        let timing = match self.pending.remove(name) {
            Some(pending) => {
                let (load_ms, activate_ms) = match pending.loaded_secs {
                    Some(loaded) => (
                        ((loaded - pending.begin_secs) * 1000.0).max(0.0),
                        ((now_secs - loaded) * 1000.0).max(0.0),
                    ),
                    None => (((now_secs - pending.begin_secs) * 1000.0).max(0.0), 0.0),
                };
                SceneLoadTiming {
                    scene_name: name.to_string(),
                    load_ms,
                    activate_ms,
                }
            }
            None => {
                debug!(scene = name, "scene completed with no recorded begin");
                SceneLoadTiming {
                    scene_name: name.to_string(),
                    load_ms: 0.0,
                    activate_ms: 0.0,
                }
            }
        };
        Some(timing)
    }

    /// Forget an in-flight load (scene unloaded mid-flight).
    pub fn cancel(&mut self, name: &str) {
        self.pending.remove(name);
    }

    /// In-flight load count, for diagnostics.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Default for SceneLoadTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for SceneLoadTracker {
    fn start(&mut self) {
        self.active = true;
        self.pending.clear();
    }

    fn stop(&mut self) {
        self.active = false;
        self.pending.clear();
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> SceneLoadTracker {
        let mut t = SceneLoadTracker::new();
        t.start();
        t
    }

    #[test]
    fn paired_load_with_mid_marker_splits_phases() {
        let mut t = tracker();
        t.begin_load("Level3", 1.0);
        t.mark_loaded("Level3", 1.4);
        let timing = t.complete("Level3", 1.5).expect("timing");
        assert!((timing.load_ms - 400.0).abs() < 1e-6);
        assert!((timing.activate_ms - 100.0).abs() < 1e-6);
        assert_eq!(t.pending_count(), 0);
    }

    #[test]
    fn missing_mid_marker_folds_into_load_time() {
        let mut t = tracker();
        t.begin_load("Menu", 2.0);
        let timing = t.complete("Menu", 2.75).expect("timing");
        assert!((timing.load_ms - 750.0).abs() < 1e-6);
        assert!((timing.activate_ms - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unpaired_complete_emits_zero_duration() {
        let mut t = tracker();
        let timing = t.complete("Boot", 5.0).expect("timing");
        assert_eq!(timing.scene_name, "Boot");
        assert!((timing.load_ms - 0.0).abs() < f64::EPSILON);
        assert!((timing.activate_ms - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn concurrent_loads_keyed_by_name() {
        let mut t = tracker();
        t.begin_load("A", 1.0);
        t.begin_load("B", 1.2);
        let a = t.complete("A", 1.5).expect("A");
        let b = t.complete("B", 1.4).expect("B");
        assert!((a.load_ms - 500.0).abs() < 1e-6);
        assert!((b.load_ms - 200.0).abs() < 1e-6);
    }

    #[test]
    fn cancel_discards_pending_load() {
        let mut t = tracker();
        t.begin_load("Doomed", 1.0);
        t.cancel("Doomed");
        // Completion after cancel behaves like an unpaired load
        let timing = t.complete("Doomed", 9.0).expect("timing");
        assert!((timing.load_ms - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn inactive_tracker_emits_nothing() {
        let mut t = SceneLoadTracker::new();
        t.begin_load("X", 1.0);
        assert_eq!(t.complete("X", 2.0), None);
    }
}
