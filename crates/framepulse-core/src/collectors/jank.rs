//! Jank episode detection.
//!
//! A frame above `jank_threshold_ms` opens an episode; while inside one,
//! frames above either threshold extend it. The first frame below both
//! thresholds closes the episode, which is emitted only when its total
//! duration exceeds the jank threshold AND a cooldown has elapsed since
//! the last emission - sustained bad stretches produce one event, not a
//! flood.

use tracing::trace;

use super::Collector;
use crate::ring::RingBuffer;

/// Minimum seconds between emitted episodes.
const REPORT_COOLDOWN_SECS: f64 = 1.0;

/// Context window entries carried on an emitted episode.
const MAX_RECENT_EVENTS: usize = 10;

/// One completed, reportable jank episode.
#[derive(Debug, Clone, PartialEq)]
pub struct JankEpisode {
    pub duration_ms: f64,
    pub max_frame_ms: f64,
    pub consecutive_frames: u32,
    pub recent_events: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Idle,
    InJank {
        start_secs: f64,
        max_frame_ms: f64,
        frames: u32,
    },
}

/// Frame-spike state machine.
pub struct JankDetector {
    jank_threshold_ms: f64,
    sustained_threshold_ms: f64,
    active: bool,
    state: State,
    last_report: f64,
    recent_events: RingBuffer<String>,
}

impl JankDetector {
    #[must_use]
    pub fn new(jank_threshold_ms: f64, sustained_threshold_ms: f64) -> Self {
        Self {
            jank_threshold_ms,
            sustained_threshold_ms,
            active: false,
            state: State::Idle,
            last_report: -REPORT_COOLDOWN_SECS,
            recent_events: RingBuffer::new(MAX_RECENT_EVENTS),
        }
    }

    /// Record a gameplay event for episode context.
    pub fn note_event(&mut self, now_secs: f64, description: &str) {
        self.recent_events
            .push_overwrite(format!("{now_secs:.2}:{description}"));
    }

    /// Feed one frame. Returns an episode when one closes and clears both
    /// the significance and cooldown bars.
    pub fn on_frame(&mut self, now_secs: f64, frame_ms: f64) -> Option<JankEpisode> {
        if !self.active {
            return None;
        }

        match self.state {
            State::Idle => {
                if frame_ms > self.jank_threshold_ms {
                    trace!(frame_ms, "jank episode opened");
                    self.state = State::InJank {
                        start_secs: now_secs,
                        max_frame_ms: frame_ms,
                        frames: 1,
                    };
                }
                None
            }
            State::InJank {
                start_secs,
                max_frame_ms,
                frames,
            } => {
                if frame_ms > self.sustained_threshold_ms {
                    // Above either threshold: the episode continues.
                    self.state = State::InJank {
                        start_secs,
                        max_frame_ms: max_frame_ms.max(frame_ms),
                        frames: frames + 1,
                    };
                    return None;
                }

                // Episode over; decide whether it is worth reporting.
                self.state = State::Idle;
                let duration_ms = (now_secs - start_secs) * 1000.0;
                let cooled_down = now_secs - self.last_report >= REPORT_COOLDOWN_SECS;
                if duration_ms > self.jank_threshold_ms && cooled_down {
                    self.last_report = now_secs;
                    return Some(JankEpisode {
                        duration_ms,
                        max_frame_ms,
                        consecutive_frames: frames,
                        recent_events: self.recent_events.to_vec(),
                    });
                }
                trace!(duration_ms, cooled_down, "jank episode discarded");
                None
            }
        }
    }
}

impl Collector for JankDetector {
    fn start(&mut self) {
        self.active = true;
        self.state = State::Idle;
        self.last_report = -REPORT_COOLDOWN_SECS;
    }

    fn stop(&mut self) {
        self.active = false;
        self.state = State::Idle;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}
