use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Batching configuration for ingestion cables.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CableConfig {
    /// Once the estimated size of the buffered records exceeds this many bytes, the buffer is
    /// flushed without waiting for the next tick. Zero flushes on every send.
    #[serde(default = "default_batch_size_bytes")]
    pub batch_size_bytes: usize,
    /// Period, in milliseconds, of the ticker that flushes a non-empty buffer.
    #[serde(default = "default_batch_interval_ms")]
    pub batch_interval_ms: u64,
    /// Fixed delay, in milliseconds, before re-sending a batch rejected with HTTP 429.
    #[serde(default = "default_rate_limit_retry_delay_ms")]
    pub rate_limit_retry_delay_ms: u64,
    /// Number of sends that can be queued for the worker before `send` starts waiting.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl CableConfig {
    /// Default flush threshold, 16 MiB.
    pub const DEFAULT_BATCH_SIZE_BYTES: usize = 16 * 1024 * 1024;

    /// Default flush ticker period.
    pub const DEFAULT_BATCH_INTERVAL_MS: u64 = 1000;

    /// Default delay between two attempts of a rate limited batch.
    pub const DEFAULT_RATE_LIMIT_RETRY_DELAY_MS: u64 = 10_000;

    /// Default capacity of the hand-off channel.
    pub const DEFAULT_CHANNEL_CAPACITY: usize = 1;

    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch_interval_ms)
    }

    pub fn rate_limit_retry_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_retry_delay_ms)
    }

    /// Validates cable configuration settings.
    ///
    /// Ensures the ticker period, the rate limit retry delay and the channel capacity are
    /// non-zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.batch_interval_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "cable.batch_interval_ms".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.rate_limit_retry_delay_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "cable.rate_limit_retry_delay_ms".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.channel_capacity == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "cable.channel_capacity".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for CableConfig {
    fn default() -> Self {
        Self {
            batch_size_bytes: default_batch_size_bytes(),
            batch_interval_ms: default_batch_interval_ms(),
            rate_limit_retry_delay_ms: default_rate_limit_retry_delay_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_batch_size_bytes() -> usize {
    CableConfig::DEFAULT_BATCH_SIZE_BYTES
}

fn default_batch_interval_ms() -> u64 {
    CableConfig::DEFAULT_BATCH_INTERVAL_MS
}

fn default_rate_limit_retry_delay_ms() -> u64 {
    CableConfig::DEFAULT_RATE_LIMIT_RETRY_DELAY_MS
}

fn default_channel_capacity() -> usize {
    CableConfig::DEFAULT_CHANNEL_CAPACITY
}
