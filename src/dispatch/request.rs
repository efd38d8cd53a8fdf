//! Operations, the request envelope the coordinator consumes, and published results.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::oneshot;

use super::error::{panic_message, PoolError, PoolResult};
use super::ids::{IdLease, RequestId};
use super::lane::{CompletionTag, LaneUnit, UnitOutput};
use super::scatter::Scatter;

/// A scatter/gather operation submitted to the pool.
///
/// `split` and `package` run on the coordinator thread, one request at a
/// time; only the per-unit steps pushed onto the [`Scatter`] run in parallel.
pub trait Operation: Send + Sync + 'static {
    /// Input handed to `split`.
    type Payload: Send + 'static;
    /// Output of a single work unit.
    type UnitOutput: Send + 'static;
    /// Final result returned to the caller.
    type Packaged: Send + 'static;

    /// Fan `payload` out into work units.
    fn split(&self, payload: Self::Payload, lanes: &mut Scatter<Self::UnitOutput>);

    /// Combine unit outputs, ordered by sequence index, into one result.
    fn package(&self, results: Vec<Self::UnitOutput>) -> Self::Packaged;

    /// Number of unit results `package` expects, if fixed.
    ///
    /// When `Some`, a mismatch fails the request with
    /// [`PoolError::UnitCountMismatch`] instead of calling `package`.
    fn expected_units(&self) -> Option<usize> {
        None
    }
}

impl<T: Operation> Operation for Arc<T> {
    type Payload = T::Payload;
    type UnitOutput = T::UnitOutput;
    type Packaged = T::Packaged;

    fn split(&self, payload: Self::Payload, lanes: &mut Scatter<Self::UnitOutput>) {
        (**self).split(payload, lanes)
    }

    fn package(&self, results: Vec<Self::UnitOutput>) -> Self::Packaged {
        (**self).package(results)
    }

    fn expected_units(&self) -> Option<usize> {
        (**self).expected_units()
    }
}

/// A packaged result tagged with the identifier of the request it answers.
///
/// Holds the identifier lease; the id returns to the pool when this is
/// consumed or dropped.
#[derive(Debug)]
pub struct Published<T> {
    lease: IdLease,
    payload: T,
}

impl<T> Published<T> {
    #[inline]
    pub fn id(&self) -> RequestId {
        self.lease.id()
    }

    #[inline]
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Take the payload, releasing the request identifier.
    #[inline]
    pub fn into_payload(self) -> T {
        self.payload
    }
}

pub(crate) type Reply<T> = oneshot::Sender<PoolResult<Published<T>>>;

/// Type-erased request as seen by the coordinator.
pub(crate) trait Envelope: Send {
    fn id(&self) -> RequestId;

    fn expected_units(&self) -> Option<usize>;

    /// Run the operation's split step. Callable once.
    fn split(&mut self, lane_count: usize, tag: CompletionTag) -> PoolResult<Vec<Vec<LaneUnit>>>;

    /// Package gathered outputs (or forward the failure) and publish to the caller.
    ///
    /// `settle` sees the outcome after packaging and before the caller is
    /// woken. Delivery to a caller that already gave up is not an error.
    fn publish(
        self: Box<Self>,
        gathered: PoolResult<Vec<UnitOutput>>,
        settle: &dyn Fn(&PoolResult<()>),
    ) -> PoolResult<()>;
}

pub(crate) type Request = Box<dyn Envelope>;

pub(crate) struct TypedRequest<Op: Operation> {
    op: Op,
    payload: Option<Op::Payload>,
    lease: IdLease,
    reply: Reply<Op::Packaged>,
}

impl<Op: Operation> TypedRequest<Op> {
    pub fn new(op: Op, payload: Op::Payload, lease: IdLease, reply: Reply<Op::Packaged>) -> Self {
        Self {
            op,
            payload: Some(payload),
            lease,
            reply,
        }
    }

    fn package(&self, gathered: Vec<UnitOutput>) -> PoolResult<Op::Packaged> {
        let outputs = gathered
            .into_iter()
            .map(|output| {
                output.downcast::<Op::UnitOutput>().map(|b| *b).map_err(|_| {
                    PoolError::OperationPanic(format!(
                        "unit output is not {}",
                        std::any::type_name::<Op::UnitOutput>()
                    ))
                })
            })
            .collect::<PoolResult<Vec<_>>>()?;

        panic::catch_unwind(AssertUnwindSafe(|| self.op.package(outputs)))
            .map_err(|payload| PoolError::OperationPanic(panic_message(payload)))
    }
}

impl<Op: Operation> Envelope for TypedRequest<Op> {
    fn id(&self) -> RequestId {
        self.lease.id()
    }

    fn expected_units(&self) -> Option<usize> {
        self.op.expected_units()
    }

    fn split(&mut self, lane_count: usize, tag: CompletionTag) -> PoolResult<Vec<Vec<LaneUnit>>> {
        let payload = self
            .payload
            .take()
            .ok_or_else(|| PoolError::OperationPanic("request was split twice".into()))?;

        let op = &self.op;
        panic::catch_unwind(AssertUnwindSafe(move || {
            let mut scatter = Scatter::new(lane_count, tag);
            op.split(payload, &mut scatter);
            scatter.into_lanes()
        }))
        .map_err(|payload| PoolError::OperationPanic(panic_message(payload)))
    }

    fn publish(
        self: Box<Self>,
        gathered: PoolResult<Vec<UnitOutput>>,
        settle: &dyn Fn(&PoolResult<()>),
    ) -> PoolResult<()> {
        let id = self.id();
        let packaged = gathered.and_then(|outputs| self.package(outputs));
        let outcome = packaged.as_ref().map(|_| ()).map_err(Clone::clone);
        settle(&outcome);

        let TypedRequest { lease, reply, .. } = *self;
        let message = packaged.map(|payload| Published { lease, payload });
        if reply.send(message).is_err() {
            tracing::debug!(request_id = %id, "caller stopped waiting, result discarded");
        }
        outcome
    }
}
