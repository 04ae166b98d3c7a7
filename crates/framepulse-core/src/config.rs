//! Agent configuration.
//!
//! Handles defaults, TOML loading, and validation of the agent's tunables.
//! Every field has a serde default so partial config files work; `validate`
//! rejects values that would wedge the pipeline (zero batch sizes, empty
//! server URL, inverted jank thresholds).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Error, Result};

/// Agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Ingestion endpoint base URL; events POST to `{server_url}/v1/events`.
    pub server_url: String,

    /// Application key sent as `X-App-Key` (empty = header omitted).
    pub app_key: String,

    /// Application version stamped into every event.
    pub app_version: String,

    /// Build identifier (informational).
    pub build: String,

    /// Master switch; a disabled agent absorbs all calls as no-ops.
    pub enabled: bool,

    /// Enable periodic performance samples.
    pub enable_performance: bool,

    /// Enable jank episode detection.
    pub enable_jank_detection: bool,

    /// Enable exception capture and dedupe.
    pub enable_exception_capture: bool,

    /// Enable startup phase timing.
    pub enable_startup_timing: bool,

    /// Enable scene load tracking.
    pub enable_scene_load_tracking: bool,

    /// Performance sampling window in seconds.
    pub sampling_interval_secs: f64,

    /// Frame time above this starts a jank episode (ms).
    pub jank_threshold_ms: f64,

    /// Frame time above this extends an episode already in progress (ms).
    pub sustained_jank_threshold_ms: f64,

    /// Events per transmitted batch.
    pub batch_size: usize,

    /// Flush pending events after this many seconds even below batch size.
    pub flush_interval_secs: f64,

    /// Ring buffer capacity; oldest events are overwritten past this.
    pub max_queue_size: usize,

    /// Spill undelivered batches to disk for replay at next startup.
    pub enable_offline_storage: bool,

    /// Byte quota for offline records; oldest evicted first.
    pub max_offline_storage_bytes: u64,

    /// HTTP request timeout in seconds.
    pub request_timeout_secs: f64,

    /// Consecutive delivery failures after which a batch is discarded
    /// instead of stored.
    pub max_consecutive_failures: u32,

    /// gzip request bodies larger than 1 KiB.
    pub enable_compression: bool,

    /// Foreground gap that splits a session (seconds).
    pub background_timeout_secs: f64,

    /// Data directory for device identity, session state, offline records
    /// and the network log. `None` = platform data dir + "framepulse".
    pub data_dir: Option<PathBuf>,

    /// Mirror network log entries to a file under the data directory.
    pub network_log_to_file: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8080".to_string(),
            app_key: String::new(),
            app_version: "1.0.0".to_string(),
            build: String::new(),
            enabled: true,
            enable_performance: true,
            enable_jank_detection: true,
            enable_exception_capture: true,
            enable_startup_timing: true,
            enable_scene_load_tracking: true,
            sampling_interval_secs: 1.0,
            jank_threshold_ms: 50.0,
            sustained_jank_threshold_ms: 33.0,
            batch_size: 20,
            flush_interval_secs: 30.0,
            max_queue_size: 1000,
            enable_offline_storage: true,
            max_offline_storage_bytes: 5 * 1024 * 1024,
            request_timeout_secs: 30.0,
            max_consecutive_failures: 5,
            enable_compression: true,
            background_timeout_secs: 30.0,
            data_dir: None,
            network_log_to_file: false,
        }
    }
}

impl AgentConfig {
    /// Reduced-overhead preset: exceptions only, slow cadence.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            enable_performance: false,
            enable_jank_detection: false,
            enable_startup_timing: false,
            enable_scene_load_tracking: false,
            sampling_interval_secs: 5.0,
            flush_interval_secs: 60.0,
            ..Self::default()
        }
    }

    /// Load a config from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|_| {
            Error::Config(ConfigError::FileNotFound(path.display().to_string()))
        })?;
        let config: Self = toml::from_str(&raw)
            .map_err(|e| Error::Config(ConfigError::Parse(e.to_string())))?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the pipeline depends on.
    pub fn validate(&self) -> Result<()> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> Error {
            Error::Config(ConfigError::Invalid {
                field,
                reason: reason.into(),
            })
        }

        if self.server_url.trim().is_empty() {
            return Err(invalid("server_url", "must not be empty"));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch_size", "must be > 0"));
        }
        if self.max_queue_size == 0 {
            return Err(invalid("max_queue_size", "must be > 0"));
        }
        if self.batch_size > self.max_queue_size {
            return Err(invalid(
                "batch_size",
                format!(
                    "must not exceed max_queue_size ({})",
                    self.max_queue_size
                ),
            ));
        }
        if self.flush_interval_secs <= 0.0 {
            return Err(invalid("flush_interval_secs", "must be > 0"));
        }
        if self.sampling_interval_secs <= 0.0 {
            return Err(invalid("sampling_interval_secs", "must be > 0"));
        }
        if self.jank_threshold_ms <= 0.0 {
            return Err(invalid("jank_threshold_ms", "must be > 0"));
        }
        if self.sustained_jank_threshold_ms > self.jank_threshold_ms {
            return Err(invalid(
                "sustained_jank_threshold_ms",
                "must not exceed jank_threshold_ms",
            ));
        }
        if self.request_timeout_secs <= 0.0 {
            return Err(invalid("request_timeout_secs", "must be > 0"));
        }
        if self.max_consecutive_failures == 0 {
            return Err(invalid("max_consecutive_failures", "must be > 0"));
        }
        Ok(())
    }

    /// Fully-qualified ingestion URL.
    #[must_use]
    pub fn ingest_url(&self) -> String {
        format!("{}/v1/events", self.server_url.trim_end_matches('/'))
    }

    /// Resolved data directory.
    #[must_use]
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("framepulse")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_tunables() {
        let config = AgentConfig::default();
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.max_queue_size, 1000);
        assert!((config.flush_interval_secs - 30.0).abs() < f64::EPSILON);
        assert!((config.jank_threshold_ms - 50.0).abs() < f64::EPSILON);
        assert!((config.sustained_jank_threshold_ms - 33.0).abs() < f64::EPSILON);
        assert_eq!(config.max_offline_storage_bytes, 5 * 1024 * 1024);
        assert_eq!(config.max_consecutive_failures, 5);
        assert!(config.enable_compression);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn minimal_preset_disables_samplers() {
        let config = AgentConfig::minimal();
        assert!(!config.enable_performance);
        assert!(!config.enable_jank_detection);
        assert!(config.enable_exception_capture);
        assert!((config.flush_interval_secs - 60.0).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_batch_size() {
        let config = AgentConfig {
            batch_size: 0,
            ..AgentConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_batch_larger_than_queue() {
        let config = AgentConfig {
            batch_size: 2000,
            max_queue_size: 1000,
            ..AgentConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_jank_thresholds() {
        let config = AgentConfig {
            jank_threshold_ms: 20.0,
            sustained_jank_threshold_ms: 33.0,
            ..AgentConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_server_url() {
        let config = AgentConfig {
            server_url: "  ".into(),
            ..AgentConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn ingest_url_strips_trailing_slash() {
        let config = AgentConfig {
            server_url: "https://apm.example.com/".into(),
            ..AgentConfig::default()
        };
        assert_eq!(config.ingest_url(), "https://apm.example.com/v1/events");
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: AgentConfig =
            toml::from_str("server_url = \"https://ingest.example.com\"\nbatch_size = 10")
                .unwrap();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_queue_size, 1000);
        assert!(config.validate().is_ok());
    }
}
