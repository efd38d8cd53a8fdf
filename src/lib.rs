//! lane_dispatch - Scatter/gather worker pool over fixed execution lanes.
//!
//! A request is split into independent work units, the units run in
//! parallel across a fixed set of lanes, and their results are reassembled
//! in submission order and handed back to the caller.
//!
//! # Features
//!
//! - **Fixed topology**: one coordinator thread plus `N - 2` workers for parallelism `N`
//! - **FIFO requests**: one request is scattered and gathered at a time
//! - **Correlation**: every request carries a recycled 16-bit identifier
//! - **Panic capture**: a panicking unit fails its request, not the pool
//! - **Metrics**: per-pool Prometheus registry
//! - **Structured logging**: JSON or text output via tracing
//!
//! # Example
//!
//! ```rust,ignore
//! use lane_dispatch::{Config, DispatchPool};
//!
//! let config = Config::from_env()?;
//! let pool = DispatchPool::start(&config.pool)?;
//! let total = pool.submit(MyOperation, payload)?;
//! pool.stop();
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit hash (8 chars) with optional "-dirty" suffix
pub const BUILD_VERSION: &str = env!("BUILD_VERSION");

/// Full version string: "0.1.0 (abc12345)" or "0.1.0 (abc12345-dirty)"
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_VERSION"), ")");

pub mod config;
pub mod dispatch;
pub mod logging;

// Re-exports for convenience
pub use config::Config;
pub use dispatch::{DispatchPool, Operation, PoolError, Scatter};
