use std::time::Duration;

use scopedb_config::shared::PollConfig;

/// Doubling delay sequence bounded by a maximum.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    next: Duration,
    max: Duration,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            next: initial.min(max),
            max,
        }
    }

    /// Returns the delay to wait now and doubles the following one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = self.next.saturating_mul(2).min(self.max);
        delay
    }
}

impl From<&PollConfig> for ExponentialBackoff {
    fn from(config: &PollConfig) -> Self {
        Self::new(config.initial_interval(), config.max_interval())
    }
}
