//! Exception capture with fingerprint deduplication.
//!
//! Error-severity log messages are grouped by a stable fingerprint
//! (exception type + normalized top stack frame) and coalesced into a
//! count instead of emitting one event per recurrence. Groups flush on a
//! timer, when the dedupe table hits its cap, and at `stop()`.
//!
//! The collector also keeps a bounded breadcrumb trail that crash events
//! attach for context.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use super::Collector;
use crate::ring::RingBuffer;

/// Dedupe table capacity; hitting it forces a flush.
const MAX_GROUPS: usize = 100;

/// Seconds between periodic dedupe flushes.
const DEDUPE_WINDOW_SECS: f64 = 60.0;

/// Breadcrumb trail length.
const MAX_BREADCRUMBS: usize = 50;

const MAX_MESSAGE_LEN: usize = 500;
const MAX_STACK_LEN: usize = 4000;

/// Severity of a captured log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSeverity {
    Debug,
    Info,
    Warning,
    Error,
    Exception,
    Assert,
}

impl LogSeverity {
    /// Only failures are captured; routine logs pass through untouched.
    #[must_use]
    pub fn is_capturable(self) -> bool {
        matches!(self, Self::Error | Self::Exception | Self::Assert)
    }
}

/// One deduplicated exception group, ready to become an event.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionGroup {
    pub fingerprint: String,
    pub message: String,
    pub stack: String,
    pub count: u32,
    pub first_seen_secs: f64,
    pub last_seen_secs: f64,
}

/// Fingerprint-deduplicating exception collector.
pub struct ExceptionCollector {
    active: bool,
    groups: HashMap<String, ExceptionGroup>,
    last_flush: f64,
    breadcrumbs: RingBuffer<String>,
}

impl ExceptionCollector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: false,
            groups: HashMap::new(),
            last_flush: 0.0,
            breadcrumbs: RingBuffer::new(MAX_BREADCRUMBS),
        }
    }

    /// Capture one log message.
    ///
    /// Returns groups flushed because the dedupe table hit its cap;
    /// usually empty.
    pub fn record(
        &mut self,
        now_secs: f64,
        unix_ms: i64,
        message: &str,
        stack: &str,
        severity: LogSeverity,
    ) -> Vec<ExceptionGroup> {
        if !self.active || !severity.is_capturable() {
            return Vec::new();
        }

        let fingerprint = fingerprint(message, stack);
        let mut flushed = Vec::new();

        if let Some(existing) = self.groups.get_mut(&fingerprint) {
            existing.count += 1;
            existing.last_seen_secs = now_secs;
        } else {
            if self.groups.len() >= MAX_GROUPS {
                flushed = self.flush();
            }
            self.groups.insert(
                fingerprint.clone(),
                ExceptionGroup {
                    fingerprint,
                    message: truncate(message, MAX_MESSAGE_LEN),
                    stack: truncate_stack(stack, MAX_STACK_LEN),
                    count: 1,
                    first_seen_secs: now_secs,
                    last_seen_secs: now_secs,
                },
            );
        }

        self.record_breadcrumb(unix_ms, &format!("Exception: {}", truncate(message, 100)));
        flushed
    }

    /// Periodic tick: flush the dedupe table once per window.
    pub fn tick(&mut self, now_secs: f64) -> Vec<ExceptionGroup> {
        if !self.active || now_secs - self.last_flush <= DEDUPE_WINDOW_SECS {
            return Vec::new();
        }
        self.last_flush = now_secs;
        self.flush()
    }

    /// Disarm and return any unflushed groups.
    pub fn stop_and_flush(&mut self) -> Vec<ExceptionGroup> {
        self.active = false;
        self.flush()
    }

    /// Append a breadcrumb with a wall-clock prefix.
    pub fn record_breadcrumb(&mut self, unix_ms: i64, text: &str) {
        if text.is_empty() {
            return;
        }
        self.breadcrumbs
            .push_overwrite(format!("[{}] {text}", format_time_of_day(unix_ms)));
    }

    /// Breadcrumb trail, oldest first.
    #[must_use]
    pub fn breadcrumbs(&self) -> Vec<String> {
        self.breadcrumbs.to_vec()
    }

    /// Pending (unflushed) group count, for diagnostics.
    #[must_use]
    pub fn pending_groups(&self) -> usize {
        self.groups.len()
    }

    fn flush(&mut self) -> Vec<ExceptionGroup> {
        let mut groups: Vec<ExceptionGroup> = self.groups.drain().map(|(_, g)| g).collect();
        groups.sort_by(|a, b| {
            a.first_seen_secs
                .partial_cmp(&b.first_seen_secs)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        groups
    }
}

impl Default for ExceptionCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for ExceptionCollector {
    fn start(&mut self) {
        self.active = true;
        self.groups.clear();
        self.last_flush = 0.0;
    }

    fn stop(&mut self) {
        self.active = false;
        self.groups.clear();
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

/// Stable 16-hex-char group fingerprint: exception type + top stack frame
/// with line numbers stripped, so the same failure groups across builds.
#[must_use]
pub fn fingerprint(message: &str, stack: &str) -> String {
    let first_line = stack.lines().next().unwrap_or("");
    let normalized = strip_line_numbers(first_line);
    let input = format!("{}|{normalized}", exception_type(message));
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..8])
}

/// Exception type prefix of a message ("NullReferenceException: ...").
fn exception_type(message: &str) -> &str {
    match message.find(':') {
        Some(idx) if idx > 0 && idx < 100 => message[..idx].trim(),
        _ => "UnknownException",
    }
}

/// Remove `:123`-style line numbers so equivalent frames group together.
fn strip_line_numbers(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ':' && chars.peek().is_some_and(char::is_ascii_digit) {
            while chars.peek().is_some_and(char::is_ascii_digit) {
                chars.next();
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Char-boundary-safe truncation with ellipsis.
fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_len.saturating_sub(3)).collect();
    format!("{cut}...")
}

/// Stacks keep their head (the interesting frames) and note the cut.
fn truncate_stack(stack: &str, max_len: usize) -> String {
    if stack.chars().count() <= max_len {
        return stack.to_string();
    }
    let cut: String = stack.chars().take(max_len.saturating_sub(20)).collect();
    format!("{cut}\n[truncated...]")
}

/// `HH:MM:SS.mmm` within the UTC day, for breadcrumb prefixes.
fn format_time_of_day(unix_ms: i64) -> String {
    let ms_of_day = unix_ms.rem_euclid(86_400_000);
    let ms = ms_of_day % 1000;
    let secs = ms_of_day / 1000;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        ms
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collector() -> ExceptionCollector {
        let mut c = ExceptionCollector::new();
        c.start();
        c
    }

    const STACK: &str = "at Game.Update () in Game.cs:42\nat Engine.Tick ()";

    #[test]
    fn repeats_coalesce_into_one_group() {
        let mut c = collector();
        for i in 0..5 {
            c.record(
                f64::from(i),
                1_700_000_000_000,
                "NullReferenceException: boom",
                STACK,
                LogSeverity::Exception,
            );
        }
        assert_eq!(c.pending_groups(), 1);
        let groups = c.stop_and_flush();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].count, 5);
        assert!((groups[0].first_seen_secs - 0.0).abs() < f64::EPSILON);
        assert!((groups[0].last_seen_secs - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn line_numbers_do_not_split_groups() {
        let mut c = collector();
        c.record(
            0.0,
            0,
            "NullReferenceException: boom",
            "at Game.Update () in Game.cs:42",
            LogSeverity::Exception,
        );
        c.record(
            1.0,
            0,
            "NullReferenceException: boom",
            "at Game.Update () in Game.cs:57",
            LogSeverity::Exception,
        );
        assert_eq!(c.pending_groups(), 1);
    }

    #[test]
    fn different_types_are_separate_groups() {
        let mut c = collector();
        c.record(0.0, 0, "NullReferenceException: a", STACK, LogSeverity::Error);
        c.record(0.0, 0, "ArgumentException: b", STACK, LogSeverity::Error);
        assert_eq!(c.pending_groups(), 2);
    }

    #[test]
    fn non_error_severities_ignored() {
        let mut c = collector();
        c.record(0.0, 0, "info message", "", LogSeverity::Info);
        c.record(0.0, 0, "warn message", "", LogSeverity::Warning);
        assert_eq!(c.pending_groups(), 0);
    }

    #[test]
    fn window_tick_flushes_groups() {
        let mut c = collector();
        c.record(1.0, 0, "Oops: x", STACK, LogSeverity::Error);
        assert!(c.tick(30.0).is_empty());
        let flushed = c.tick(61.0);
        assert_eq!(flushed.len(), 1);
        assert_eq!(c.pending_groups(), 0);
        // Next window starts from the flush
        assert!(c.tick(100.0).is_empty());
    }

    #[test]
    fn table_cap_forces_flush() {
        let mut c = collector();
        for i in 0..MAX_GROUPS {
            let flushed = c.record(
                0.0,
                0,
                &format!("Error{i}: x"),
                &format!("at Frame{i} ()"),
                LogSeverity::Error,
            );
            assert!(flushed.is_empty(), "no flush before the cap");
        }
        let flushed = c.record(1.0, 0, "Overflow: y", "at New ()", LogSeverity::Error);
        assert_eq!(flushed.len(), MAX_GROUPS);
        assert_eq!(c.pending_groups(), 1);
    }

    #[test]
    fn long_messages_and_stacks_truncate() {
        let mut c = collector();
        let long_message = format!("HugeException: {}", "m".repeat(1000));
        let long_stack = "s".repeat(10_000);
        c.record(0.0, 0, &long_message, &long_stack, LogSeverity::Exception);
        let groups = c.stop_and_flush();
        assert!(groups[0].message.chars().count() <= MAX_MESSAGE_LEN);
        assert!(groups[0].message.ends_with("..."));
        assert!(groups[0].stack.ends_with("[truncated...]"));
    }

    #[test]
    fn breadcrumbs_are_bounded_and_stamped() {
        let mut c = collector();
        for i in 0..60 {
            c.record_breadcrumb(1_700_000_000_000 + i, &format!("step {i}"));
        }
        let crumbs = c.breadcrumbs();
        assert_eq!(crumbs.len(), MAX_BREADCRUMBS);
        assert!(crumbs[0].contains("step 10"));
        assert!(crumbs[0].starts_with('['));
    }

    #[test]
    fn exceptions_leave_breadcrumbs() {
        let mut c = collector();
        c.record(0.0, 0, "Oops: z", STACK, LogSeverity::Error);
        let crumbs = c.breadcrumbs();
        assert_eq!(crumbs.len(), 1);
        assert!(crumbs[0].contains("Exception: Oops: z"));
    }

    #[test]
    fn fingerprint_is_stable_hex() {
        let a = fingerprint("TypeError: x", "at f () in a.cs:1");
        let b = fingerprint("TypeError: y", "at f () in a.cs:99");
        assert_eq!(a, b, "same type + frame must group");
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn message_without_type_prefix_uses_fallback() {
        let a = fingerprint("plain panic text with no colon", "at f ()");
        let b = fingerprint("different plain text", "at f ()");
        assert_eq!(a, b, "both fall back to UnknownException");
    }

    #[test]
    fn time_of_day_formatting() {
        // 1970-01-01 00:00:01.500
        assert_eq!(format_time_of_day(1500), "00:00:01.500");
        // One day + 1h 2m 3s and 42ms
        let ms = 86_400_000 + ((3600 + 120 + 3) * 1000 + 42);
        assert_eq!(format_time_of_day(ms), "01:02:03.042");
    }
}
