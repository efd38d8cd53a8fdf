//! Pool lifecycle and the request gateway.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;

use super::coordinator::Coordinator;
use super::error::{PoolError, PoolResult};
use super::ids::{ExhaustionPolicy, IdLease, IdPool};
use super::lane;
use super::metrics::PoolMetrics;
use super::request::{Operation, Published, Request, TypedRequest};
use crate::config::PoolConfig;

type Pending<T> = oneshot::Receiver<PoolResult<Published<T>>>;

/// Fixed-size scatter/gather pool.
///
/// One coordinator thread serves lane 0 and services requests in submission
/// order; every other lane has a dedicated worker thread. With a parallelism
/// below 2 the pool starts no threads and every submission returns `Ok(None)`.
pub struct DispatchPool {
    name: String,
    lane_count: usize,
    /// `None` once stopped, and always in passthrough mode.
    intake: Mutex<Option<mpsc::Sender<Request>>>,
    ids: IdPool,
    exhaustion: ExhaustionPolicy,
    threads: Mutex<Vec<JoinHandle<()>>>,
    shutdown: AtomicBool,
    metrics: Arc<PoolMetrics>,
}

/// Point-in-time view of pool activity.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PoolStats {
    pub lanes: usize,
    pub workers: usize,
    pub in_flight: usize,
    pub requests_ok: u64,
    pub requests_failed: u64,
    /// Units executed per lane, indexed by lane.
    pub units_per_lane: Vec<u64>,
}

impl DispatchPool {
    /// Start a pool sized by `config`.
    pub fn start(config: &PoolConfig) -> PoolResult<Self> {
        let name = config.name.clone();
        let metrics = Arc::new(PoolMetrics::new(&name)?);
        let ids = IdPool::with_gauge(
            config.max_in_flight(),
            metrics.requests_in_flight.clone(),
        );

        if config.is_passthrough() {
            tracing::info!(
                pool = %name,
                parallelism = config.parallelism(),
                "parallelism below 2, dispatch pool running as passthrough"
            );
            return Ok(Self {
                name,
                lane_count: 0,
                intake: Mutex::new(None),
                ids,
                exhaustion: config.exhaustion,
                threads: Mutex::new(Vec::new()),
                shutdown: AtomicBool::new(false),
                metrics,
            });
        }

        let lane_count = config.lane_count();
        metrics.lanes.set(lane_count as i64);

        let (intake_tx, intake_rx) = mpsc::channel::<Request>();
        let mut handles = Vec::with_capacity(lane_count);
        let mut drains = Vec::with_capacity(lane_count);
        for index in 0..lane_count {
            let (handle, drain) = lane::lane(index, metrics.lane_counter(index));
            handles.push(handle);
            drains.push(drain);
        }

        let mut drains = drains.into_iter();
        let own_lane = drains
            .next()
            .ok_or_else(|| PoolError::Spawn("pool has no lanes".into()))?;

        let mut threads = Vec::with_capacity(lane_count);
        for drain in drains {
            let thread_name = format!("{}-lane-{}", name, drain.index());
            let handle = thread::Builder::new()
                .name(thread_name)
                .spawn(move || drain.run())
                .map_err(|e| PoolError::Spawn(e.to_string()))?;
            threads.push(handle);
        }

        let coordinator = Coordinator::new(intake_rx, handles, own_lane, Arc::clone(&metrics));
        let handle = thread::Builder::new()
            .name(format!("{}-coordinator", name))
            .spawn(move || coordinator.run())
            .map_err(|e| PoolError::Spawn(e.to_string()))?;
        threads.push(handle);

        tracing::info!(
            pool = %name,
            lanes = lane_count,
            workers = lane_count - 1,
            max_in_flight = ids.capacity(),
            "dispatch pool started"
        );

        Ok(Self {
            name,
            lane_count,
            intake: Mutex::new(Some(intake_tx)),
            ids,
            exhaustion: config.exhaustion,
            threads: Mutex::new(threads),
            shutdown: AtomicBool::new(false),
            metrics,
        })
    }

    /// Start a pool with default settings and the given parallelism.
    pub fn with_parallelism(parallelism: usize) -> PoolResult<Self> {
        Self::start(&PoolConfig::new(parallelism))
    }

    /// Submit a request and block until its packaged result is published.
    ///
    /// Returns `Ok(None)` in passthrough mode. Must not be called from inside
    /// an async runtime or from a unit step running on this pool; use
    /// [`submit_async`](Self::submit_async) from async code.
    pub fn submit<Op: Operation>(
        &self,
        op: Op,
        payload: Op::Payload,
    ) -> PoolResult<Option<Op::Packaged>> {
        Ok(self
            .submit_published(op, payload)?
            .map(Published::into_payload))
    }

    /// Like [`submit`](Self::submit), but returns the result still tagged with
    /// its request identifier. The identifier is held until the returned value
    /// is dropped or unwrapped.
    pub fn submit_published<Op: Operation>(
        &self,
        op: Op,
        payload: Op::Payload,
    ) -> PoolResult<Option<Published<Op::Packaged>>> {
        let Some(pending) = self.enqueue(op, payload)? else {
            return Ok(None);
        };
        let published = pending
            .blocking_recv()
            .map_err(|_| PoolError::ChannelClosed)??;
        Ok(Some(published))
    }

    /// Submit a request and wait for its result without blocking the runtime.
    pub async fn submit_async<Op: Operation>(
        &self,
        op: Op,
        payload: Op::Payload,
    ) -> PoolResult<Option<Op::Packaged>> {
        let Some(pending) = self.enqueue(op, payload)? else {
            return Ok(None);
        };
        let published = pending.await.map_err(|_| PoolError::ChannelClosed)??;
        Ok(Some(published.into_payload()))
    }

    /// Submit a request and wait at most `timeout` for its result.
    ///
    /// On timeout the request still runs to completion; its identifier is
    /// released once the coordinator publishes.
    pub async fn submit_with_timeout<Op: Operation>(
        &self,
        op: Op,
        payload: Op::Payload,
        timeout: Duration,
    ) -> PoolResult<Option<Op::Packaged>> {
        let Some(pending) = self.enqueue(op, payload)? else {
            return Ok(None);
        };
        match tokio::time::timeout(timeout, pending).await {
            Ok(Ok(Ok(published))) => Ok(Some(published.into_payload())),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_)) => Err(PoolError::ChannelClosed),
            Err(_) => Err(PoolError::Timeout(timeout)),
        }
    }

    /// Lease an identifier and queue the request. `None` in passthrough mode.
    fn enqueue<Op: Operation>(
        &self,
        op: Op,
        payload: Op::Payload,
    ) -> PoolResult<Option<Pending<Op::Packaged>>> {
        if self.is_passthrough() {
            return Ok(None);
        }
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(PoolError::Shutdown);
        }

        let lease = self.lease()?;
        let id = lease.id();
        let (reply_tx, reply_rx) = oneshot::channel();
        let request: Request = Box::new(TypedRequest::new(op, payload, lease, reply_tx));

        {
            let intake = self.intake();
            let sender = intake.as_ref().ok_or(PoolError::Shutdown)?;
            sender.send(request).map_err(|_| PoolError::Shutdown)?;
        }

        tracing::trace!(pool = %self.name, request_id = %id, "request queued");
        Ok(Some(reply_rx))
    }

    fn lease(&self) -> PoolResult<IdLease> {
        if let Some(lease) = self.ids.acquire() {
            return Ok(lease);
        }

        let capacity = self.ids.capacity();
        match self.exhaustion {
            ExhaustionPolicy::Reject => {
                tracing::warn!(pool = %self.name, capacity, "request identifiers exhausted");
                Err(PoolError::CapacityExceeded { capacity })
            }
            ExhaustionPolicy::Abort => {
                tracing::error!(
                    pool = %self.name,
                    capacity,
                    "request identifiers exhausted, aborting"
                );
                std::process::abort()
            }
        }
    }

    /// Stop accepting requests, finish the ones already queued, join all threads.
    ///
    /// Idempotent. Every caller returns only once all pool threads have been
    /// joined, including callers that raced with the first one. Must not be
    /// called from a unit step running on this pool.
    pub fn stop(&self) {
        let first = !self.shutdown.swap(true, Ordering::SeqCst);
        if first {
            tracing::info!(pool = %self.name, "shutting down dispatch pool");

            // Closing intake lets the coordinator drain what is queued, then
            // exit and drop the lane senders, which stops the workers.
            self.intake().take();
        }

        // Held across the joins so concurrent callers wait here.
        let mut threads = self.threads();
        for handle in threads.drain(..) {
            let thread_name = handle.thread().name().unwrap_or("?").to_string();
            if handle.join().is_err() {
                tracing::error!(pool = %self.name, thread = %thread_name, "pool thread panicked");
            }
        }

        if first {
            tracing::info!(pool = %self.name, "dispatch pool stopped");
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when the pool was started with parallelism below 2.
    #[inline]
    pub fn is_passthrough(&self) -> bool {
        self.lane_count == 0
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Number of lanes, including the coordinator's lane 0.
    #[inline]
    pub fn lane_count(&self) -> usize {
        self.lane_count
    }

    /// Number of dedicated worker threads.
    #[inline]
    pub fn worker_count(&self) -> usize {
        self.lane_count.saturating_sub(1)
    }

    /// Pool threads spawned and not yet joined: workers plus the coordinator.
    ///
    /// Blocks while a [`stop`](Self::stop) is joining threads.
    pub fn thread_count(&self) -> usize {
        self.threads().len()
    }

    /// Requests currently holding an identifier.
    pub fn in_flight(&self) -> usize {
        self.ids.in_use()
    }

    /// Identifier pool size.
    pub fn max_in_flight(&self) -> usize {
        self.ids.capacity()
    }

    pub fn metrics(&self) -> &PoolMetrics {
        &self.metrics
    }

    pub fn stats(&self) -> PoolStats {
        let metrics = self.metrics();
        PoolStats {
            lanes: self.lane_count,
            workers: self.worker_count(),
            in_flight: self.in_flight(),
            requests_ok: metrics.requests_with_outcome("ok"),
            requests_failed: metrics.requests_with_outcome("panic")
                + metrics.requests_with_outcome("error"),
            units_per_lane: (0..self.lane_count)
                .map(|lane| metrics.lane_counter(lane).get())
                .collect(),
        }
    }

    // Sender and handle lists stay consistent even if a holder panicked.
    fn intake(&self) -> MutexGuard<'_, Option<mpsc::Sender<Request>>> {
        self.intake.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn threads(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.threads.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for DispatchPool {
    fn drop(&mut self) {
        self.stop();
    }
}
