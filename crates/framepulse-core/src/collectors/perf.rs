//! Periodic performance sampling.
//!
//! Accumulates per-frame timings and closes a window every
//! `sampling_interval_secs`, emitting average frame time, peak frame time
//! and frames-per-second for the window.

use super::Collector;

/// One closed sampling window.
#[derive(Debug, Clone, PartialEq)]
pub struct PerfWindow {
    pub fps: f64,
    pub avg_frame_ms: f64,
    pub max_frame_ms: f64,
}

/// Frame-time aggregator.
#[derive(Debug)]
pub struct PerfCollector {
    sampling_interval_secs: f64,
    active: bool,
    window_start: f64,
    frame_count: u32,
    frame_time_sum_ms: f64,
    max_frame_ms: f64,
}

impl PerfCollector {
    #[must_use]
    pub fn new(sampling_interval_secs: f64) -> Self {
        Self {
            sampling_interval_secs,
            active: false,
            window_start: 0.0,
            frame_count: 0,
            frame_time_sum_ms: 0.0,
            max_frame_ms: 0.0,
        }
    }

    /// Feed one frame. Returns a closed window when the interval elapses.
    pub fn on_frame(&mut self, now_secs: f64, frame_ms: f64) -> Option<PerfWindow> {
        if !self.active {
            return None;
        }

        if self.frame_count == 0 && self.window_start == 0.0 {
            self.window_start = now_secs;
        }

        self.frame_count += 1;
        self.frame_time_sum_ms += frame_ms;
        if frame_ms > self.max_frame_ms {
            self.max_frame_ms = frame_ms;
        }

        let elapsed = now_secs - self.window_start;
        if elapsed < self.sampling_interval_secs {
            return None;
        }

        let window = if self.frame_count == 0 || elapsed <= 0.0 {
            None
        } else {
            Some(PerfWindow {
                fps: f64::from(self.frame_count) / elapsed,
                avg_frame_ms: self.frame_time_sum_ms / f64::from(self.frame_count),
                max_frame_ms: self.max_frame_ms,
            })
        };
        self.reset_window(now_secs);
        window
    }

    fn reset_window(&mut self, now_secs: f64) {
        self.window_start = now_secs;
        self.frame_count = 0;
        self.frame_time_sum_ms = 0.0;
        self.max_frame_ms = 0.0;
    }
}

impl Collector for PerfCollector {
    fn start(&mut self) {
        self.active = true;
        self.window_start = 0.0;
        self.frame_count = 0;
        self.frame_time_sum_ms = 0.0;
        self.max_frame_ms = 0.0;
    }

    fn stop(&mut self) {
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}
