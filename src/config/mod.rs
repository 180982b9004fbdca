//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `ROOM_RELAY` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use room_relay::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod auth;
mod bus;
mod error;
mod redis;
mod relay;
mod rooms;
mod server;

pub use auth::{AuthConfig, MIN_PRODUCTION_SECRET_LEN};
pub use bus::{BusBackend, BusConfig};
pub use error::{ConfigError, ValidationError};
pub use redis::RedisConfig;
pub use relay::{RelayConfig, MAX_FRAME_CEILING};
pub use rooms::RoomsConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
/// Every section has defaults except the JWT secret, which `validate`
/// requires.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment, origins)
    #[serde(default)]
    pub server: ServerConfig,

    /// Redis configuration; empty URL selects in-memory adapters
    #[serde(default)]
    pub redis: RedisConfig,

    /// Token validation
    #[serde(default)]
    pub auth: AuthConfig,

    /// Per-connection deadlines and limits
    #[serde(default)]
    pub relay: RelayConfig,

    /// Message bus delivery model
    #[serde(default)]
    pub bus: BusConfig,

    /// Room retention
    #[serde(default)]
    pub rooms: RoomsConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `ROOM_RELAY` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `ROOM_RELAY__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `ROOM_RELAY__BUS__BACKEND=log` -> `bus.backend = log`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("ROOM_RELAY")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for the first invalid value found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.redis.validate()?;
        self.auth.validate(&self.server.environment)?;
        self.relay.validate()?;
        self.bus.validate()?;

        if self.bus.backend == BusBackend::Log && self.relay.history_limit > self.bus.max_log_len {
            return Err(ValidationError::HistoryExceedsRetention {
                history_limit: self.relay.history_limit,
                max_log_len: self.bus.max_log_len,
            });
        }
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
