//! Startup phase timing.
//!
//! Three sequential markers produce one event: runtime init (when the
//! tracker starts), first rendered frame, and time-to-interactive (marked
//! explicitly by the host when the app is ready for input). Emitted
//! exactly once per process; later markers are ignored.

use super::Collector;

/// Startup phase durations, all clamped non-negative.
#[derive(Debug, Clone, PartialEq)]
pub struct StartupTiming {
    /// Native launch → runtime init. Zero unless the host supplies the
    /// native launch offset.
    pub phase1_ms: f64,
    /// Runtime init → first rendered frame.
    pub phase2_ms: f64,
    /// First rendered frame → interactive.
    pub tti_ms: f64,
}

/// One-shot startup phase tracker.
#[derive(Debug)]
pub struct StartupTracker {
    active: bool,
    reported: bool,
    init_secs: f64,
    /// Estimated native launch time; equals `init_secs` unless the host
    /// provides a measured offset.
    launch_secs: f64,
    first_frame_secs: Option<f64>,
    frame_count: u32,
}

impl StartupTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: false,
            reported: false,
            init_secs: 0.0,
            launch_secs: 0.0,
            first_frame_secs: None,
            frame_count: 0,
        }
    }

    /// Arm the tracker, stamping runtime init at `now_secs`.
    pub fn start_at(&mut self, now_secs: f64) {
        self.active = true;
        self.reported = false;
        self.init_secs = now_secs;
        self.launch_secs = now_secs;
        self.first_frame_secs = None;
        self.frame_count = 0;
    }

    /// Feed one frame; the first settled frame becomes the render marker.
    pub fn on_frame(&mut self, now_secs: f64) {
        if !self.active || self.reported {
            return;
        }
        self.frame_count += 1;
        // The very first tick still includes engine warm-up; the second
        // tick is the first representative frame.
        if self.first_frame_secs.is_none() && self.frame_count > 1 {
            self.first_frame_secs = Some(now_secs);
        }
    }

    /// Host-measured native-launch-to-init duration, when available.
    pub fn set_phase1_ms(&mut self, milliseconds: f64) {
        self.launch_secs = self.init_secs - milliseconds / 1000.0;
    }

    /// Mark time-to-interactive; emits the startup event exactly once.
    pub fn mark_tti(&mut self, now_secs: f64) -> Option<StartupTiming> {
        if !self.active || self.reported {
            return None;
        }
        self.reported = true;

        let first_frame = self.first_frame_secs.unwrap_or(self.init_secs);
        Some(StartupTiming {
            phase1_ms: ((self.init_secs - self.launch_secs) * 1000.0).max(0.0),
            phase2_ms: ((first_frame - self.init_secs) * 1000.0).max(0.0),
            tti_ms: ((now_secs - first_frame) * 1000.0).max(0.0),
        })
    }

    /// Whether the startup event has been emitted.
    #[must_use]
    pub fn has_reported(&self) -> bool {
        self.reported
    }
}

impl Default for StartupTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for StartupTracker {
    fn start(&mut self) {
        self.start_at(0.0);
    }

    fn stop(&mut self) {
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}
