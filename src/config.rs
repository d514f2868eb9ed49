//! Worker and producer settings, optionally loaded from a JSON file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors from [`Config::load`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("reading config: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid JSON for [`Config`].
    #[error("parsing config: {0}")]
    Json(#[from] serde_json::Error),
}

/// What the consumer does with records whose code it does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownCodePolicy {
    /// Log and mark processed.
    #[default]
    Skip,
    /// Log and leave unprocessed for a newer build.
    Leave,
}

/// Consumer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Longest wait between two passes without a ping.
    pub poll_interval_ms: u64,
    /// Subtracted from the requested run time so a scheduled successor never overlaps.
    pub safety_margin_secs: u64,
    /// The consumer stops instead of waiting once less than this remains.
    pub min_wait_ms: u64,
    /// Delay before the first pass.
    pub settle_ms: u64,
    /// Delay before the first pass in quick mode.
    pub quick_settle_ms: u64,
    /// Handling of unknown codes.
    pub unknown_code: UnknownCodePolicy,
    /// Localhost UDP port that turns datagrams into pings.
    pub wakeup_port: Option<u16>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            safety_margin_secs: 15,
            min_wait_ms: 1_000,
            settle_ms: 2_000,
            quick_settle_ms: 50,
            unknown_code: UnknownCodePolicy::Skip,
            wakeup_port: None,
        }
    }
}

impl WorkerConfig {
    /// Active time for a run of `duration` minutes, or seconds in quick mode.
    pub fn run_time(&self, duration: u64, quick: bool) -> Duration {
        if quick {
            Duration::from_secs(duration)
        } else {
            Duration::from_secs(duration * 60).saturating_sub(Duration::from_secs(self.safety_margin_secs))
        }
    }

    /// Delay before the first pass.
    pub fn settle(&self, quick: bool) -> Duration {
        Duration::from_millis(if quick { self.quick_settle_ms } else { self.settle_ms })
    }
}

/// Producer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// First backoff step when waiting for the consumer.
    pub initial_backoff_ms: u64,
    /// Upper bound on the total time spent waiting.
    pub max_total_wait_ms: u64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 200,
            max_total_wait_ms: 3_000,
        }
    }
}

/// Complete configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Consumer settings.
    pub worker: WorkerConfig,
    /// Producer settings.
    pub producer: ProducerConfig,
}

impl Config {
    /// Reads a JSON config file; missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
