//! Message bus configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Delivery model of the message bus.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BusBackend {
    /// Fire-and-forget broadcast, no history.
    #[default]
    PubSub,
    /// Bounded append-only log with history replay on join.
    Log,
}

/// Message bus configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    #[serde(default)]
    pub backend: BusBackend,

    /// Per-room buffer of the in-memory broadcast channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Entries retained per room by log backends
    #[serde(default = "default_max_log_len")]
    pub max_log_len: usize,
}

impl BusConfig {
    /// Validate bus configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.channel_capacity == 0 {
            return Err(ValidationError::MustBePositive("bus.channel_capacity"));
        }
        if self.max_log_len == 0 {
            return Err(ValidationError::MustBePositive("bus.max_log_len"));
        }
        Ok(())
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            backend: BusBackend::default(),
            channel_capacity: default_channel_capacity(),
            max_log_len: default_max_log_len(),
        }
    }
}

fn default_channel_capacity() -> usize {
    128
}

fn default_max_log_len() -> usize {
    100
}
