use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Back-off settings used while polling a statement until it terminates.
///
/// The interval starts at `initial_interval_ms`, doubles after every non-terminal fetch and
/// never grows past `max_interval_ms`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PollConfig {
    /// Delay, in milliseconds, before the first re-fetch of a running statement.
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,
    /// Upper bound, in milliseconds, for the delay between two fetches.
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
}

impl PollConfig {
    /// Default delay before the first re-fetch.
    pub const DEFAULT_INITIAL_INTERVAL_MS: u64 = 5;

    /// Default cap for the delay between fetches.
    pub const DEFAULT_MAX_INTERVAL_MS: u64 = 1000;

    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    /// Validates poll configuration settings.
    ///
    /// The initial interval must be non-zero and must not exceed the maximum interval.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.initial_interval_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "poll.initial_interval_ms".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.initial_interval_ms > self.max_interval_ms {
            return Err(ValidationError::InvalidFieldValue {
                field: "poll.max_interval_ms".to_string(),
                constraint: "must be greater than or equal to `poll.initial_interval_ms`"
                    .to_string(),
            });
        }

        Ok(())
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_initial_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
        }
    }
}

fn default_initial_interval_ms() -> u64 {
    PollConfig::DEFAULT_INITIAL_INTERVAL_MS
}

fn default_max_interval_ms() -> u64 {
    PollConfig::DEFAULT_MAX_INTERVAL_MS
}
