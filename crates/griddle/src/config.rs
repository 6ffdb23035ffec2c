//! Service and scheduler configuration.

use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::error::{GriddleError, Result};

/// Default pause between an empty admission queue and batch execution.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Tuning knobs for the scheduling loop.
///
/// With the defaults, batches are purely time-boxed: everything admitted
/// for a key since the previous drain cycle runs in one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Pause, in milliseconds, once the admission queue is observed empty.
    pub poll_interval_ms: u64,

    /// When set, reaching this many pending requests across all keys
    /// triggers execution without waiting for the poll interval.
    pub max_batch_size: Option<usize>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_batch_size: None,
        }
    }
}

impl SchedulerConfig {
    /// The pause taken after each drain of the admission queue.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Sets the poll interval.
    ///
    /// The interval has millisecond resolution. Any sub-millisecond remainder
    /// rounds up, so a non-zero `interval` never becomes zero.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        let millis = interval.as_millis();
        let rounded = if interval.subsec_nanos() % 1_000_000 != 0 { millis + 1 } else { millis };
        self.poll_interval_ms = u64::try_from(rounded).unwrap_or(u64::MAX);
        self
    }

    /// Caps the pending requests, across all keys, that one drain cycle
    /// collects before executing without waiting out the poll interval.
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = Some(size);
        self
    }

    /// Rejects a zero poll interval and a zero batch size cap.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(GriddleError::Config("poll_interval_ms must be positive".into()));
        }
        if self.max_batch_size == Some(0) {
            return Err(GriddleError::Config("max_batch_size must be positive when set".into()));
        }
        Ok(())
    }
}

/// Top level configuration for a service fronting one inference routine.
///
/// ```yaml
/// routine: rotate
/// routine_config:
///   quality: 90
/// scheduler:
///   poll_interval_ms: 50
///   max_batch_size: 16
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Registered name of the inference routine to serve.
    pub routine: String,

    /// Opaque settings handed to the routine factory.
    #[serde(default)]
    pub routine_config: serde_json::Value,

    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl ServiceConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let config: ServiceConfig = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.routine.trim().is_empty() {
            return Err(GriddleError::Config("routine name must not be empty".into()));
        }
        self.scheduler.validate()
    }
}
