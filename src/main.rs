use std::time::Instant;

use tracing::{info, warn};

use lane_dispatch::config::Config;
use lane_dispatch::dispatch::{DispatchPool, Operation, PoolError, Scatter};
use lane_dispatch::{logging, VERSION};

/// Fans `payload` out as `payload * k` for k in 1..=3, one unit per lane,
/// and sums the incremented values.
struct Fanout;

impl Operation for Fanout {
    type Payload = i64;
    type UnitOutput = i64;
    type Packaged = i64;

    fn split(&self, payload: i64, lanes: &mut Scatter<i64>) {
        for k in 1..=3 {
            lanes.push(k - 1, payload * k as i64, |v| v + 1);
        }
    }

    fn package(&self, results: Vec<i64>) -> i64 {
        results.into_iter().sum()
    }

    fn expected_units(&self) -> Option<usize> {
        Some(3)
    }
}

/// Squares every element of the payload, spreading them round-robin.
struct SquareAll;

impl Operation for SquareAll {
    type Payload = Vec<u64>;
    type UnitOutput = u64;
    type Packaged = Vec<u64>;

    fn split(&self, payload: Vec<u64>, lanes: &mut Scatter<u64>) {
        for n in payload {
            lanes.push_round_robin(n, |n| n * n);
        }
    }

    fn package(&self, results: Vec<u64>) -> Vec<u64> {
        results
    }
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env()?;
    logging::init(&config.logging)?;

    info!("Starting lane_dispatch {}", VERSION);
    config.log_summary();

    let pool = DispatchPool::start(&config.pool)?;

    match pool.submit(Fanout, 10)? {
        Some(total) => info!(total, "fanout request completed"),
        None => info!("pool is in passthrough mode, nothing was dispatched"),
    }

    let started = Instant::now();
    let squares = match config.pool.request_timeout.as_duration() {
        Some(timeout) => {
            // Single-threaded runtime; the pool does the parallel work
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()?;
            match runtime.block_on(pool.submit_with_timeout(SquareAll, (1..=64).collect(), timeout)) {
                Err(PoolError::Timeout(limit)) => {
                    warn!(timeout_ms = limit.as_millis() as u64, "square request timed out");
                    None
                }
                other => other?,
            }
        }
        None => pool.submit(SquareAll, (1..=64).collect())?,
    };

    if let Some(squares) = squares {
        info!(
            units = squares.len(),
            last = squares.last().copied().unwrap_or_default(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "square request completed"
        );
    }

    let stats = serde_json::to_string(&pool.stats())?;
    info!(stats = %stats, "pool stats");
    print!("{}", pool.metrics().encode());

    pool.stop();
    Ok(())
}
