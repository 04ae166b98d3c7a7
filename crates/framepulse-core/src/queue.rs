//! Event batching and flush policy.
//!
//! The queue owns the frame-path ring and decides *when* a batch leaves
//! the process: either the pending count reaches `batch_size`, or the
//! flush interval elapses with anything pending. Extraction and the
//! flush decision happen under one critical section - the ring's own
//! lock-free guarantees are not enough to ensure exactly one flush per
//! threshold crossing.
//!
//! Subscribers receive one immutable batch per notification, after the
//! critical section is released, so a subscriber can never deadlock the
//! queue by re-entering it.

use std::sync::Mutex;

use tracing::{debug, trace};

use crate::clock::SharedClock;
use crate::event::Event;
use crate::spsc::EventRing;

/// Batch notification callback.
pub type BatchSubscriber = Box<dyn Fn(&[Event]) + Send + Sync>;

struct FlushState {
    /// Events enqueued since the last flush (counts overwritten ones too).
    pending_since_flush: usize,
    /// Monotonic seconds at the last flush.
    last_flush: f64,
}

/// Batching queue in front of the reporter.
pub struct EventQueue {
    ring: EventRing<Event>,
    batch_size: usize,
    flush_interval_secs: f64,
    clock: SharedClock,
    state: Mutex<FlushState>,
    subscribers: Mutex<Vec<BatchSubscriber>>,
}

impl EventQueue {
    /// Create a queue over a ring of `max_queue_size` slots.
    ///
    /// # Panics
    ///
    /// Panics if `max_queue_size` or `batch_size` is 0 (rejected earlier
    /// by config validation).
    #[must_use]
    pub fn new(
        max_queue_size: usize,
        batch_size: usize,
        flush_interval_secs: f64,
        clock: SharedClock,
    ) -> Self {
        assert!(batch_size > 0, "batch_size must be > 0");
        let last_flush = clock.monotonic_secs();
        Self {
            ring: EventRing::new(max_queue_size),
            batch_size,
            flush_interval_secs,
            clock,
            state: Mutex::new(FlushState {
                pending_since_flush: 0,
                last_flush,
            }),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Register a batch subscriber.
    pub fn subscribe(&self, subscriber: BatchSubscriber) {
        self.subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .push(subscriber);
    }

    /// Enqueue one event; flushes synchronously if a threshold is crossed.
    ///
    /// Never fails: a full ring silently discards its oldest event.
    pub fn enqueue(&self, event: Event) {
        trace!(kind = event.kind(), "enqueue");
        if let Some(evicted) = self.ring.push_overwrite(event) {
            debug!(kind = evicted.kind(), "queue full, oldest event dropped");
        }

        let batches = {
            let mut state = self.state.lock().expect("queue lock poisoned");
            state.pending_since_flush += 1;
            let now = self.clock.monotonic_secs();
            if self.should_flush(&state, now) {
                self.extract_batches(&mut state, now)
            } else {
                Vec::new()
            }
        };
        self.notify(batches);
    }

    /// Per-tick check for the time-based flush predicate.
    pub fn update(&self) {
        let batches = {
            let mut state = self.state.lock().expect("queue lock poisoned");
            let now = self.clock.monotonic_secs();
            if self.should_flush(&state, now) {
                self.extract_batches(&mut state, now)
            } else {
                Vec::new()
            }
        };
        self.notify(batches);
    }

    /// Force a flush regardless of the predicate. No-op when empty.
    pub fn flush(&self) {
        let batches = {
            let mut state = self.state.lock().expect("queue lock poisoned");
            let now = self.clock.monotonic_secs();
            self.extract_batches(&mut state, now)
        };
        self.notify(batches);
    }

    /// Drop all pending events and reset the flush state.
    pub fn clear(&self) {
        let mut state = self.state.lock().expect("queue lock poisoned");
        self.ring.clear();
        state.pending_since_flush = 0;
        state.last_flush = self.clock.monotonic_secs();
    }

    /// Events currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    /// Events lost to ring overwrite since startup.
    #[must_use]
    pub fn total_dropped(&self) -> u64 {
        self.ring.total_evicted()
    }

    fn should_flush(&self, state: &FlushState, now: f64) -> bool {
        if state.pending_since_flush >= self.batch_size {
            return true;
        }
        now - state.last_flush >= self.flush_interval_secs && state.pending_since_flush > 0
    }

    /// Extract one batch, plus any further complete batches of backlog.
    ///
    /// Resets the flush timer and pending counter. Returns only non-empty
    /// batches; subscribers get one notification per batch.
    fn extract_batches(&self, state: &mut FlushState, now: f64) -> Vec<Vec<Event>> {
        state.last_flush = now;
        state.pending_since_flush = 0;

        let mut batches = Vec::new();
        loop {
            let batch = self.ring.pop_batch(self.batch_size);
            if batch.is_empty() {
                break;
            }
            batches.push(batch);
            // Only keep extracting while a full batch of backlog remains;
            // a partial remainder waits for the next threshold crossing.
            if self.ring.len() < self.batch_size {
                break;
            }
        }
        batches
    }

    fn notify(&self, batches: Vec<Vec<Event>>) {
        if batches.is_empty() {
            return;
        }
        let subscribers = self.subscribers.lock().expect("subscriber lock poisoned");
        for batch in batches {
            debug!(events = batch.len(), "batch ready");
            for subscriber in subscribers.iter() {
                subscriber(&batch);
            }
        }
    }
}

impl std::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue")
            .field("len", &self.len())
            .field("batch_size", &self.batch_size)
            .field("flush_interval_secs", &self.flush_interval_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::clock::ManualClock;
    use crate::event::{CommonContext, EventPayload};

    fn sample_event(fps: f64) -> Event {
        Event {
            context: CommonContext {
                timestamp: 1_700_000_000_000,
                app_version: "1.0.0".into(),
                platform: "Linux".into(),
                device_model: "test".into(),
                os_version: "test".into(),
                session_id: "s".into(),
                device_id: "d".into(),
                scene: None,
            },
            payload: EventPayload::PerfSample {
                fps,
                frame_time_ms: 1000.0 / fps,
                main_thread_ms: 1000.0 / fps,
                gc_alloc_kb: 0.0,
                mem_mb: 100.0,
            },
        }
    }

    struct Harness {
        clock: Arc<ManualClock>,
        queue: Arc<EventQueue>,
        batches: Arc<Mutex<Vec<Vec<Event>>>>,
    }

    fn harness(max_queue: usize, batch_size: usize, interval: f64) -> Harness {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let queue = Arc::new(EventQueue::new(
            max_queue,
            batch_size,
            interval,
            clock.clone() as SharedClock,
        ));
        let batches: Arc<Mutex<Vec<Vec<Event>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&batches);
        queue.subscribe(Box::new(move |batch| {
            sink.lock().unwrap().push(batch.to_vec());
        }));
        Harness {
            clock,
            queue,
            batches,
        }
    }

    #[test]
    fn starts_empty() {
        let h = harness(100, 5, 60.0);
        assert_eq!(h.queue.len(), 0);
        assert!(!h.queue.is_full());
    }

    #[test]
    fn reaching_batch_size_flushes_exactly_once() {
        let h = harness(100, 5, 60.0);
        for i in 0..5 {
            h.queue.enqueue(sample_event(60.0 + f64::from(i)));
        }
        let batches = h.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 5);
        assert_eq!(h.queue.len(), 0);
    }

    #[test]
    fn twenty_two_events_at_batch_twenty() {
        let h = harness(1000, 20, 60.0);
        for _ in 0..22 {
            h.queue.enqueue(sample_event(60.0));
        }
        let batches = h.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 20);
        assert_eq!(h.queue.len(), 2);
    }

    #[test]
    fn k_batches_plus_remainder() {
        let h = harness(100, 5, 60.0);
        for _ in 0..12 {
            h.queue.enqueue(sample_event(60.0));
        }
        let batches = h.batches.lock().unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 5);
        assert_eq!(batches[1].len(), 5);
        assert_eq!(h.queue.len(), 2);
    }

    #[test]
    fn forced_flush_sends_partial_batch() {
        let h = harness(100, 5, 60.0);
        h.queue.enqueue(sample_event(60.0));
        h.queue.enqueue(sample_event(55.0));
        h.queue.flush();
        let batches = h.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
    }

    #[test]
    fn flush_on_empty_queue_is_a_no_op() {
        let h = harness(100, 5, 60.0);
        h.queue.flush();
        h.queue.flush();
        assert!(h.batches.lock().unwrap().is_empty());
    }

    #[test]
    fn time_based_flush_via_update() {
        let h = harness(100, 50, 10.0);
        h.queue.enqueue(sample_event(60.0));
        h.queue.enqueue(sample_event(59.0));
        h.queue.update();
        assert!(h.batches.lock().unwrap().is_empty());

        h.clock.advance_secs(10.5);
        h.queue.update();
        let batches = h.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
    }

    #[test]
    fn time_flush_requires_pending_events() {
        let h = harness(100, 50, 10.0);
        h.clock.advance_secs(30.0);
        h.queue.update();
        assert!(h.batches.lock().unwrap().is_empty());
    }

    #[test]
    fn clear_discards_pending() {
        let h = harness(100, 5, 60.0);
        h.queue.enqueue(sample_event(60.0));
        h.queue.enqueue(sample_event(60.0));
        h.queue.clear();
        assert_eq!(h.queue.len(), 0);
        h.queue.flush();
        assert!(h.batches.lock().unwrap().is_empty());
    }

    #[test]
    fn overwrite_drops_oldest_when_ring_full() {
        // Capacity 4, batch threshold high enough that nothing flushes.
        let h = harness(4, 50, 600.0);
        for i in 0..6 {
            h.queue.enqueue(sample_event(f64::from(i)));
        }
        assert_eq!(h.queue.len(), 4);
        assert_eq!(h.queue.total_dropped(), 2);

        h.queue.flush();
        let batches = h.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        // The four most recent samples survive, in FIFO order.
        let fps: Vec<f64> = batches[0]
            .iter()
            .map(|e| match e.payload {
                EventPayload::PerfSample { fps, .. } => fps,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(fps, vec![2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn flush_resets_interval_timer() {
        let h = harness(100, 50, 10.0);
        h.queue.enqueue(sample_event(60.0));
        h.clock.advance_secs(9.0);
        h.queue.flush(); // manual flush at t=9 resets the timer
        h.queue.enqueue(sample_event(60.0));
        h.clock.advance_secs(9.0); // t=18, only 9s since last flush
        h.queue.update();
        assert_eq!(h.batches.lock().unwrap().len(), 1);

        h.clock.advance_secs(1.5); // now past the interval
        h.queue.update();
        assert_eq!(h.batches.lock().unwrap().len(), 2);
    }
}
