//! Scatter/gather worker pool.
//!
//! Callers submit an [`Operation`] with its payload. The coordinator splits it
//! into work units across the lanes, drains lane 0 itself, gathers every
//! unit's result, and hands the packaged result back to the caller.
//!
//! # Architecture
//!
//! ```text
//! submit() ──▶ IdPool lease ──▶ intake channel
//!                                    │ (FIFO)
//!                            ┌───────▼───────┐
//!                            │  Coordinator  │  split / package
//!                            └───┬───┬───┬───┘
//!                 ┌──────────────┘   │   └──────────────┐
//!          ┌──────▼──────┐    ┌──────▼──────┐    ┌──────▼──────┐
//!          │   Lane 0    │    │   Lane 1    │ .. │  Lane N-2   │
//!          │(coordinator)│    │  (worker)   │    │  (worker)   │
//!          └──────┬──────┘    └──────┬──────┘    └──────┬──────┘
//!                 └──────────────┐   │   ┌──────────────┘
//!                            ┌───▼───▼───▼───┐
//!                            │    gather     │  ordered by sequence index
//!                            └───────┬───────┘
//!                                    │ oneshot reply
//! submit() ◀─────────────── Published { id, payload }
//! ```
//!
//! A request's units all finish and are packaged before the coordinator takes
//! the next request. With parallelism `N >= 2` there are `N - 1` lanes and
//! `N - 2` workers; below that the pool is a passthrough.
//!
//! # Example
//!
//! ```rust
//! use lane_dispatch::dispatch::{DispatchPool, Operation, Scatter};
//!
//! struct Square;
//!
//! impl Operation for Square {
//!     type Payload = Vec<u64>;
//!     type UnitOutput = u64;
//!     type Packaged = Vec<u64>;
//!
//!     fn split(&self, payload: Vec<u64>, lanes: &mut Scatter<u64>) {
//!         for n in payload {
//!             lanes.push_round_robin(n, |n| n * n);
//!         }
//!     }
//!
//!     fn package(&self, results: Vec<u64>) -> Vec<u64> {
//!         results
//!     }
//! }
//!
//! let pool = DispatchPool::with_parallelism(4)?;
//! let squares = pool.submit(Square, vec![1, 2, 3, 4])?;
//! assert_eq!(squares, Some(vec![1, 4, 9, 16]));
//! # Ok::<(), lane_dispatch::dispatch::PoolError>(())
//! ```

mod coordinator;
mod error;
mod ids;
mod lane;
mod metrics;
mod pool;
mod request;
mod scatter;

pub use error::{PoolError, PoolResult};
pub use ids::{ExhaustionPolicy, IdLease, IdPool, RequestId, MAX_REQUEST_ID};
pub use lane::{CompletionTag, UnitOutput};
pub use metrics::PoolMetrics;
pub use pool::{DispatchPool, PoolStats};
pub use request::{Operation, Published};
pub use scatter::Scatter;
