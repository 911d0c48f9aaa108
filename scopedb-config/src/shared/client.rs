use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::{PollConfig, ValidationError};

/// Connection settings for a ScopeDB client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ClientConfig {
    /// Base URL of the server, e.g. `http://localhost:6543`.
    pub endpoint: String,
    /// Optional per-request timeout in milliseconds. No timeout is applied when unset.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    /// Statement polling back-off.
    #[serde(default)]
    pub poll: PollConfig,
}

impl ClientConfig {
    /// Creates a configuration for `endpoint` with default settings.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            request_timeout_ms: None,
            poll: PollConfig::default(),
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Validates the client configuration and its nested sections.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.endpoint.trim().is_empty() {
            return Err(ValidationError::EndpointEmpty);
        }

        if self.request_timeout_ms == Some(0) {
            return Err(ValidationError::InvalidFieldValue {
                field: "request_timeout_ms".to_string(),
                constraint: "must be greater than 0 when set".to_string(),
            });
        }

        self.poll.validate()
    }
}
