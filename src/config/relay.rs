//! Connection relay configuration (deadlines, frame limits, inbound parsing)

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::domain::chat::InboundMode;

/// Upper bound for `max_message_size`.
pub const MAX_FRAME_CEILING: usize = 64 * 1024;

/// Per-connection relay settings
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Silence tolerated from a client before it is dropped
    #[serde(default = "default_read_wait")]
    pub read_wait_secs: u64,

    /// Time allowed for one outbound write
    #[serde(default = "default_write_wait")]
    pub write_wait_secs: u64,

    /// Millisecond override of `read_wait_secs`
    #[serde(default)]
    pub read_wait_ms: Option<u64>,

    /// Millisecond override of `write_wait_secs`
    #[serde(default)]
    pub write_wait_ms: Option<u64>,

    /// Largest accepted inbound frame in bytes (inclusive)
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// How client text frames are interpreted
    #[serde(default)]
    pub inbound_mode: InboundMode,

    /// Consecutive publish failures that end a connection
    #[serde(default = "default_max_publish_failures")]
    pub max_publish_failures: u32,

    /// Events replayed to a joining client on log backends
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl RelayConfig {
    /// Read deadline; reset by every inbound frame.
    pub fn read_wait(&self) -> Duration {
        self.read_wait_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_secs(self.read_wait_secs))
    }

    /// Bound on each outbound write.
    pub fn write_wait(&self) -> Duration {
        self.write_wait_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_secs(self.write_wait_secs))
    }

    /// Keepalive ping interval, half the read deadline.
    pub fn ping_period(&self) -> Duration {
        self.read_wait() / 2
    }

    /// Size the socket layer accepts before failing the read outright.
    ///
    /// Larger than `max_message_size` so frames just over the limit reach
    /// the inbound pump and are rejected there as validation failures.
    pub fn transport_limit(&self) -> usize {
        MAX_FRAME_CEILING.max(self.max_message_size)
    }

    /// Validate relay configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.read_wait().is_zero() || self.read_wait() > Duration::from_secs(600) {
            return Err(ValidationError::InvalidTimeout("relay.read_wait", 600));
        }
        if self.write_wait().is_zero() || self.write_wait() > Duration::from_secs(60) {
            return Err(ValidationError::InvalidTimeout("relay.write_wait", 60));
        }
        if self.ping_period().is_zero() {
            return Err(ValidationError::MustBePositive("relay.read_wait / 2"));
        }
        if self.max_message_size == 0 || self.max_message_size > MAX_FRAME_CEILING {
            return Err(ValidationError::InvalidMessageSize(MAX_FRAME_CEILING));
        }
        if self.max_publish_failures == 0 {
            return Err(ValidationError::MustBePositive("relay.max_publish_failures"));
        }
        Ok(())
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            read_wait_secs: default_read_wait(),
            write_wait_secs: default_write_wait(),
            read_wait_ms: None,
            write_wait_ms: None,
            max_message_size: default_max_message_size(),
            inbound_mode: InboundMode::default(),
            max_publish_failures: default_max_publish_failures(),
            history_limit: default_history_limit(),
        }
    }
}

fn default_read_wait() -> u64 {
    30
}

fn default_write_wait() -> u64 {
    5
}

fn default_max_message_size() -> usize {
    512
}

fn default_max_publish_failures() -> u32 {
    3
}

fn default_history_limit() -> usize {
    10
}
