//! Bounded pool of reusable request identifiers.
//!
//! Identifiers correlate a submitted request with the result published for it.
//! A lease holds one identifier and hands it back when dropped, so an id is
//! never held by two in-flight requests at once.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use prometheus::IntGauge;

/// Largest identifier the pool can hand out.
pub const MAX_REQUEST_ID: u16 = u16::MAX;

/// Short identifier correlating a request with its published result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u16);

impl RequestId {
    #[inline]
    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What `submit` does when every identifier is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExhaustionPolicy {
    /// Return `PoolError::CapacityExceeded` to the caller.
    #[default]
    Reject,
    /// Log and abort the process.
    Abort,
}

/// Fixed set of identifiers `1..=capacity`, reused oldest-released first.
#[derive(Clone)]
pub struct IdPool {
    inner: Arc<Inner>,
}

struct Inner {
    free: Mutex<VecDeque<u16>>,
    capacity: usize,
    /// Tracks leased identifiers as they are acquired and released.
    gauge: Option<IntGauge>,
}

impl IdPool {
    /// Create a pool holding `capacity` identifiers, clamped to `1..=MAX_REQUEST_ID`.
    pub fn new(capacity: usize) -> Self {
        Self::build(capacity, None)
    }

    /// Like [`new`](Self::new), keeping `gauge` equal to [`in_use`](Self::in_use).
    pub fn with_gauge(capacity: usize, gauge: IntGauge) -> Self {
        gauge.set(0);
        Self::build(capacity, Some(gauge))
    }

    fn build(capacity: usize, gauge: Option<IntGauge>) -> Self {
        let capacity = capacity.clamp(1, MAX_REQUEST_ID as usize);
        let free = (1..=capacity as u16).collect::<VecDeque<_>>();
        Self {
            inner: Arc::new(Inner {
                free: Mutex::new(free),
                capacity,
                gauge,
            }),
        }
    }

    /// Take the next free identifier, or `None` when exhausted.
    pub fn acquire(&self) -> Option<IdLease> {
        let id = self.free().pop_front()?;
        if let Some(gauge) = &self.inner.gauge {
            gauge.inc();
        }
        Some(IdLease {
            id: RequestId(id),
            pool: Arc::clone(&self.inner),
        })
    }

    /// Number of identifiers currently free.
    pub fn available(&self) -> usize {
        self.free().len()
    }

    /// Total number of identifiers.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Identifiers currently leased out.
    pub fn in_use(&self) -> usize {
        self.capacity() - self.available()
    }

    fn free(&self) -> MutexGuard<'_, VecDeque<u16>> {
        self.inner.lock()
    }
}

impl Inner {
    // Nothing panics while holding this lock, so a poisoned queue is still consistent.
    fn lock(&self) -> MutexGuard<'_, VecDeque<u16>> {
        self.free.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// An identifier on loan from an [`IdPool`]; released on drop.
pub struct IdLease {
    id: RequestId,
    pool: Arc<Inner>,
}

impl IdLease {
    #[inline]
    pub fn id(&self) -> RequestId {
        self.id
    }
}

impl fmt::Debug for IdLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IdLease").field(&self.id.0).finish()
    }
}

impl Drop for IdLease {
    fn drop(&mut self) {
        self.pool.lock().push_back(self.id.0);
        if let Some(gauge) = &self.pool.gauge {
            gauge.dec();
        }
        tracing::trace!(request_id = self.id.0, "request id released");
    }
}
