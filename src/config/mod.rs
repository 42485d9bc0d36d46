//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;

use crate::server::SchedulerConfig;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Broadcast cadence in ticks
    pub tick_period: u32,
    /// Lateness tolerance window in ticks
    pub receive_tick_period: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            tick_period: parse_ticks("TICK_PERIOD", 6)?,
            receive_tick_period: parse_ticks("RECEIVE_TICK_PERIOD", 60)?,
        })
    }

    /// Scheduling constants derived from the configured windows
    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig::new(self.tick_period, self.receive_tick_period)
    }
}

/// Parse a positive tick count from the environment, with a default
fn parse_ticks(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    match env::var(name) {
        Ok(raw) => match raw.parse::<u32>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(ConfigError::InvalidTicks(name)),
        },
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("{0} must be a positive tick count")]
    InvalidTicks(&'static str),
}
