//! Runtime configuration for a realtime session.

use crate::backoff::{BackoffPolicy, DEFAULT_MAX_ATTEMPTS};
use crate::error::{RealtimeError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Realtime configuration.
///
/// Missing fields fall back to their defaults when deserialized.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Delay before the first retry, in milliseconds.
    /// Default: 1000
    pub base_delay_ms: u64,

    /// Retries per key before giving up.
    /// Default: 5
    pub max_attempts: u32,

    /// Upper clamp for a single retry delay (None = unbounded).
    pub max_delay_ms: Option<u64>,

    /// Buffered status events per watcher before it is dropped.
    /// Default: 256
    pub status_buffer: usize,

    /// Re-check row filters on delivered payloads.
    /// Default: true
    pub verify_filters: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_delay_ms: None,
            status_buffer: 256,
            verify_filters: true,
        }
    }
}

impl RealtimeConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: RealtimeConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_delay_ms == 0 {
            return Err(RealtimeError::Config(
                "base_delay_ms must be greater than zero".to_string(),
            ));
        }
        if self.status_buffer == 0 {
            return Err(RealtimeError::Config(
                "status_buffer must be greater than zero".to_string(),
            ));
        }
        if let Some(max) = self.max_delay_ms {
            if max < self.base_delay_ms {
                return Err(RealtimeError::Config(format!(
                    "max_delay_ms ({max}) is below base_delay_ms ({})",
                    self.base_delay_ms
                )));
            }
        }
        Ok(())
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_attempts: self.max_attempts,
            max_delay: self.max_delay_ms.map(Duration::from_millis),
        }
    }
}
