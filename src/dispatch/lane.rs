//! Lanes: one inbound/outbound channel pair plus the drain loop that serves it.
//!
//! The coordinator holds a [`LaneHandle`] for every lane; the thread that
//! owns a lane holds its [`LaneDrain`]. A drain only ever touches its own
//! pair of channels.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;

use prometheus::IntCounter;

use super::error::panic_message;

/// Type-erased output of one work unit, recovered by downcast when gathered.
pub type UnitOutput = Box<dyn Any + Send>;

/// A unit's step with its input already captured.
pub(crate) type Step = Box<dyn FnOnce() -> UnitOutput + Send>;

/// Opaque token copied from a work unit onto its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompletionTag(u64);

impl CompletionTag {
    #[inline]
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CompletionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One piece of a request's work, bound to a single lane.
pub(crate) struct LaneUnit {
    pub tag: CompletionTag,
    pub seq: usize,
    pub step: Step,
}

impl fmt::Debug for LaneUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaneUnit")
            .field("tag", &self.tag)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

/// The result of executing a [`LaneUnit`]. `Err` carries a panic message.
pub(crate) struct LaneResult {
    pub tag: CompletionTag,
    pub seq: usize,
    pub output: Result<UnitOutput, String>,
}

/// Coordinator-side endpoints of a lane.
pub(crate) struct LaneHandle {
    pub index: usize,
    pub inbound: mpsc::Sender<LaneUnit>,
    pub outbound: mpsc::Receiver<LaneResult>,
}

/// Owner-side endpoints of a lane.
pub(crate) struct LaneDrain {
    index: usize,
    inbound: mpsc::Receiver<LaneUnit>,
    outbound: mpsc::Sender<LaneResult>,
    executed: IntCounter,
}

/// Create the two halves of lane `index`.
pub(crate) fn lane(index: usize, executed: IntCounter) -> (LaneHandle, LaneDrain) {
    let (unit_tx, unit_rx) = mpsc::channel();
    let (result_tx, result_rx) = mpsc::channel();

    let handle = LaneHandle {
        index,
        inbound: unit_tx,
        outbound: result_rx,
    };
    let drain = LaneDrain {
        index,
        inbound: unit_rx,
        outbound: result_tx,
        executed,
    };
    (handle, drain)
}

impl LaneDrain {
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Execute every unit queued right now without waiting for more.
    ///
    /// Returns the number of units executed.
    pub fn drain_pending(&self) -> usize {
        let batch: Vec<LaneUnit> = self.inbound.try_iter().collect();
        self.execute_batch(batch)
    }

    /// Worker thread main loop. Returns once the coordinator drops the lane.
    pub fn run(self) {
        tracing::debug!(lane = self.index, "lane worker started");

        while let Ok(first) = self.inbound.recv() {
            // Snapshot whatever else is queued so the batch runs without
            // touching the channel again.
            let mut batch = vec![first];
            batch.extend(self.inbound.try_iter());
            self.execute_batch(batch);
        }

        tracing::debug!(lane = self.index, "lane worker stopped");
    }

    fn execute_batch(&self, batch: Vec<LaneUnit>) -> usize {
        let count = batch.len();
        for unit in batch {
            let result = self.execute(unit);
            if self.outbound.send(result).is_err() {
                // Coordinator is gone; nobody is left to gather.
                tracing::debug!(lane = self.index, "outbound closed, dropping result");
            }
        }
        count
    }

    fn execute(&self, unit: LaneUnit) -> LaneResult {
        let LaneUnit { tag, seq, step } = unit;
        let output = panic::catch_unwind(AssertUnwindSafe(step)).map_err(|payload| {
            let message = panic_message(payload);
            tracing::warn!(lane = self.index, %tag, seq, %message, "work unit panicked");
            message
        });
        self.executed.inc();
        tracing::trace!(lane = self.index, %tag, seq, "work unit executed");
        LaneResult { tag, seq, output }
    }
}
