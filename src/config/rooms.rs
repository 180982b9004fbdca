//! Room lifecycle configuration

use serde::Deserialize;

/// Room lifecycle configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RoomsConfig {
    /// Hours a room lives after creation; 0 keeps rooms forever
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
}

impl RoomsConfig {
    /// Retention window in seconds, `None` when rooms never expire.
    pub fn retention_secs(&self) -> Option<u64> {
        (self.retention_hours > 0).then(|| self.retention_hours * 3600)
    }
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            retention_hours: default_retention_hours(),
        }
    }
}

fn default_retention_hours() -> u64 {
    24
}
