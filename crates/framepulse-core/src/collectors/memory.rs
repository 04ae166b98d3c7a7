//! Heap and GC activity tracking.
//!
//! The host pushes heap readings (`heap_bytes`, cumulative collection
//! count); the monitor tracks collection deltas and positive allocation
//! deltas over a rolling window and exposes them to the other detectors -
//! jank episodes and perf samples both carry recent GC pressure.

use super::Collector;

/// Window to aggregate GC activity over before resetting.
const RESET_INTERVAL_SECS: f64 = 10.0;

/// GC activity within the current window.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MemoryStats {
    /// Collections observed in the window.
    pub gc_count: u32,
    /// Approximate bytes allocated in the window, in KiB.
    pub gc_alloc_kb: f64,
}

/// Rolling memory/GC aggregator fed by host readings.
#[derive(Debug)]
pub struct MemoryMonitor {
    active: bool,
    stats: MemoryStats,
    last_heap_bytes: Option<u64>,
    last_collections: u64,
    window_start: f64,
}

impl MemoryMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: false,
            stats: MemoryStats::default(),
            last_heap_bytes: None,
            last_collections: 0,
            window_start: 0.0,
        }
    }

    /// Feed one host reading.
    ///
    /// `collections` is the host's cumulative GC count; deltas are taken
    /// here. Heap shrinkage (a collection ran) does not count as negative
    /// allocation.
    pub fn on_sample(&mut self, now_secs: f64, heap_bytes: u64, collections: u64) {
        if !self.active {
            return;
        }

        if collections > self.last_collections {
            self.stats.gc_count += (collections - self.last_collections) as u32;
        }
        self.last_collections = collections;

        if let Some(last) = self.last_heap_bytes {
            if heap_bytes > last {
                self.stats.gc_alloc_kb += (heap_bytes - last) as f64 / 1024.0;
            }
        }
        self.last_heap_bytes = Some(heap_bytes);

        if now_secs - self.window_start > RESET_INTERVAL_SECS {
            self.stats = MemoryStats::default();
            self.window_start = now_secs;
        }
    }

    /// GC activity in the current window.
    #[must_use]
    pub fn recent_stats(&self) -> MemoryStats {
        self.stats
    }

    /// Most recent heap reading, in MiB.
    #[must_use]
    pub fn used_mb(&self) -> f64 {
        self.last_heap_bytes
            .map_or(0.0, |bytes| bytes as f64 / (1024.0 * 1024.0))
    }
}

impl Default for MemoryMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for MemoryMonitor {
    fn start(&mut self) {
        self.active = true;
        self.stats = MemoryStats::default();
        self.last_heap_bytes = None;
        self.last_collections = 0;
        self.window_start = 0.0;
    }

    fn stop(&mut self) {
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}
