//! Prometheus metrics for a dispatch pool.
//!
//! Each pool owns its own registry, labelled with the pool name, so several
//! pools can live in one process without colliding.

use std::time::Duration;

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

use super::error::PoolResult;

/// Request latency buckets (in seconds).
const REQUEST_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0,
];

pub struct PoolMetrics {
    registry: Registry,

    /// Requests serviced by the coordinator, by outcome
    pub requests_total: IntCounterVec,

    /// Time from intake to publish, in seconds
    pub request_duration_seconds: Histogram,

    /// Work units executed, by lane
    pub units_total: IntCounterVec,

    /// Requests holding an identifier
    pub requests_in_flight: IntGauge,

    /// Lanes in the pool (0 in passthrough mode)
    pub lanes: IntGauge,
}

impl PoolMetrics {
    /// Create a registry whose metrics carry a constant `pool` label.
    pub fn new(pool: &str) -> Result<Self, prometheus::Error> {
        let registry =
            Registry::new_custom(None, Some([("pool".to_string(), pool.to_string())].into()))?;

        let requests_total = IntCounterVec::new(
            Opts::new("dispatch_requests_total", "Total requests serviced"),
            &["outcome"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let request_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "dispatch_request_duration_seconds",
                "Request scatter/gather duration in seconds",
            )
            .buckets(REQUEST_BUCKETS.to_vec()),
        )?;
        registry.register(Box::new(request_duration_seconds.clone()))?;

        let units_total = IntCounterVec::new(
            Opts::new("dispatch_units_total", "Total work units executed"),
            &["lane"],
        )?;
        registry.register(Box::new(units_total.clone()))?;

        let requests_in_flight =
            IntGauge::new("dispatch_requests_in_flight", "Requests holding an identifier")?;
        registry.register(Box::new(requests_in_flight.clone()))?;

        let lanes = IntGauge::new("dispatch_lanes", "Number of lanes")?;
        registry.register(Box::new(lanes.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration_seconds,
            units_total,
            requests_in_flight,
            lanes,
        })
    }

    /// Counter a lane increments for every unit it executes.
    pub(crate) fn lane_counter(&self, lane: usize) -> IntCounter {
        self.units_total.with_label_values(&[lane.to_string().as_str()])
    }

    pub(crate) fn record_request(&self, outcome: &PoolResult<()>, elapsed: Duration) {
        let label = match outcome {
            Ok(()) => "ok",
            Err(e) if e.is_panic() => "panic",
            Err(_) => "error",
        };
        self.requests_total.with_label_values(&[label]).inc();
        self.request_duration_seconds.observe(elapsed.as_secs_f64());
    }

    /// Requests that completed with the given outcome label (`ok`, `panic`, `error`).
    pub fn requests_with_outcome(&self, outcome: &str) -> u64 {
        self.requests_total.with_label_values(&[outcome]).get()
    }

    /// Encode all metrics in Prometheus text format.
    pub fn encode(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %e, "failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
