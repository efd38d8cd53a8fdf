//! Configuration module for lane_dispatch.
//!
//! Settings are read from environment variables. Library users can also
//! build a [`PoolConfig`] directly.
//!
//! # Example
//!
//! ```rust,ignore
//! use lane_dispatch::config::Config;
//!
//! let config = Config::from_env()?;
//! println!("Lanes: {}", config.pool.lane_count());
//! ```

mod error;
mod logging;
mod parse;
mod pool;

pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use parse::parse_duration;
pub use pool::{PoolConfig, RequestTimeout, DEFAULT_POOL_NAME, MIN_PARALLELISM};

/// Complete application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Dispatch pool configuration.
    pub pool: PoolConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            pool: PoolConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        use tracing::info;

        info!("Configuration loaded:");
        info!("  Pool: {}", self.pool.name);
        info!("  Parallelism: {}", self.pool.parallelism());

        if self.pool.is_passthrough() {
            info!("  Mode: passthrough (no threads)");
        } else {
            info!(
                "  Lanes: {} ({} workers + coordinator)",
                self.pool.lane_count(),
                self.pool.worker_count()
            );
        }

        info!("  Max in flight: {}", self.pool.max_in_flight());
        info!("  On exhaustion: {:?}", self.pool.exhaustion);

        match self.pool.request_timeout.as_duration() {
            Some(timeout) => info!("  Request timeout: {}ms", timeout.as_millis()),
            None => info!("  Request timeout: disabled"),
        }

        info!("  Log format: {:?}", self.logging.format);
    }
}
