//! Dispatch pool configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

use super::parse::{env_bool, env_duration, env_opt, env_parse};
use super::ConfigError;
use crate::dispatch::{ExhaustionPolicy, MAX_REQUEST_ID};

/// Default thread-name prefix.
pub const DEFAULT_POOL_NAME: &str = "dispatch";

/// Smallest parallelism that starts any threads.
pub const MIN_PARALLELISM: usize = 2;

/// Caller-side wait limit for a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestTimeout(pub Option<Duration>);

impl RequestTimeout {
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.0.is_some()
    }

    #[inline]
    pub fn as_duration(&self) -> Option<Duration> {
        self.0
    }
}

/// Pool sizing and admission settings.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Thread-name prefix and metrics label.
    pub name: String,
    /// What `submit` does when every request identifier is taken.
    pub exhaustion: ExhaustionPolicy,
    /// Used by callers that wait with a deadline.
    pub request_timeout: RequestTimeout,
    /// Execution contexts the pool may occupy.
    parallelism: usize,
    /// Size of the request identifier pool.
    max_in_flight: NonZeroUsize,
}

impl PoolConfig {
    /// Config with the given parallelism and defaults for everything else.
    ///
    /// Unlike [`from_env`](Self::from_env), 0 is taken literally and yields
    /// a passthrough pool.
    pub fn new(parallelism: usize) -> Self {
        Self {
            name: DEFAULT_POOL_NAME.to_string(),
            exhaustion: ExhaustionPolicy::default(),
            request_timeout: RequestTimeout::default(),
            parallelism,
            max_in_flight: Self::default_max_in_flight(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let parallelism = match env_parse("DISPATCH_PARALLELISM", 0usize)? {
            0 => num_cpus::get(),
            n => n,
        };
        let max_in_flight = Self::parse_max_in_flight()?;
        let exhaustion = if env_bool("DISPATCH_FAIL_FAST", false) {
            ExhaustionPolicy::Abort
        } else {
            ExhaustionPolicy::Reject
        };

        Ok(Self {
            name: env_opt("DISPATCH_POOL_NAME").unwrap_or_else(|| DEFAULT_POOL_NAME.to_string()),
            exhaustion,
            request_timeout: RequestTimeout(env_duration("DISPATCH_REQUEST_TIMEOUT", "off")?),
            parallelism,
            max_in_flight,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the identifier pool size, clamped to `1..=MAX_REQUEST_ID`.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        let clamped = max_in_flight.clamp(1, MAX_REQUEST_ID as usize);
        self.max_in_flight = NonZeroUsize::new(clamped).unwrap_or(self.max_in_flight);
        self
    }

    pub fn with_exhaustion_policy(mut self, policy: ExhaustionPolicy) -> Self {
        self.exhaustion = policy;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = RequestTimeout(timeout);
        self
    }

    #[inline]
    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    #[inline]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.get()
    }

    /// True when parallelism is too low to start any threads.
    #[inline]
    pub fn is_passthrough(&self) -> bool {
        self.parallelism < MIN_PARALLELISM
    }

    /// Lanes the pool will create: one fewer than parallelism, or none.
    #[inline]
    pub fn lane_count(&self) -> usize {
        if self.is_passthrough() {
            0
        } else {
            self.parallelism - 1
        }
    }

    /// Dedicated workers: every lane except the coordinator's lane 0.
    #[inline]
    pub fn worker_count(&self) -> usize {
        self.lane_count().saturating_sub(1)
    }

    fn default_max_in_flight() -> NonZeroUsize {
        NonZeroUsize::new(MAX_REQUEST_ID as usize).unwrap_or(NonZeroUsize::MIN)
    }

    fn parse_max_in_flight() -> Result<NonZeroUsize, ConfigError> {
        let max = env_parse("DISPATCH_MAX_IN_FLIGHT", MAX_REQUEST_ID as usize)?;
        if max > MAX_REQUEST_ID as usize {
            return Err(ConfigError::Invalid {
                key: "DISPATCH_MAX_IN_FLIGHT".into(),
                message: format!("must not exceed {}", MAX_REQUEST_ID),
            });
        }
        NonZeroUsize::new(max).ok_or_else(|| ConfigError::Invalid {
            key: "DISPATCH_MAX_IN_FLIGHT".into(),
            message: "in-flight limit cannot be zero".into(),
        })
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}
