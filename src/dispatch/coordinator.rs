//! Coordinator thread: request intake, dispatch, lane 0 service and aggregation.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Instant;

use super::error::{PoolError, PoolResult};
use super::lane::{CompletionTag, LaneDrain, LaneHandle, LaneUnit, UnitOutput};
use super::metrics::PoolMetrics;
use super::request::Request;

pub(crate) struct Coordinator {
    intake: mpsc::Receiver<Request>,
    /// Handles for every lane, lane 0 first.
    lanes: Vec<LaneHandle>,
    /// Lane 0 is drained here rather than by a worker.
    own_lane: LaneDrain,
    next_tag: u64,
    metrics: Arc<PoolMetrics>,
}

impl Coordinator {
    pub fn new(
        intake: mpsc::Receiver<Request>,
        lanes: Vec<LaneHandle>,
        own_lane: LaneDrain,
        metrics: Arc<PoolMetrics>,
    ) -> Self {
        debug_assert_eq!(own_lane.index(), 0);
        Self {
            intake,
            lanes,
            own_lane,
            next_tag: 1,
            metrics,
        }
    }

    /// Service requests in submission order until intake closes.
    ///
    /// Requests already queued when intake closes are still serviced. The lane
    /// senders drop with `self`, which stops the workers.
    pub fn run(mut self) {
        tracing::debug!(lanes = self.lanes.len(), "coordinator started");

        while let Ok(request) = self.intake.recv() {
            self.service(request);
        }

        tracing::debug!("coordinator stopped");
    }

    /// Scatter one request, gather every unit result, publish.
    fn service(&mut self, mut request: Request) {
        let started = Instant::now();
        let id = request.id();
        let tag = CompletionTag::new(self.next_tag);
        self.next_tag += 1;

        let gathered = request
            .split(self.lanes.len(), tag)
            .and_then(|batches| {
                let (counts, dispatch_err) = self.dispatch(batches);
                self.own_lane.drain_pending();
                let gathered = self.gather(tag, &counts);
                match dispatch_err {
                    Some(err) => Err(err),
                    None => gathered,
                }
            })
            .and_then(|outputs| match request.expected_units() {
                Some(expected) if expected != outputs.len() => Err(PoolError::UnitCountMismatch {
                    expected,
                    actual: outputs.len(),
                }),
                _ => Ok(outputs),
            });

        // Recorded before the reply goes out, so a caller that reads stats
        // after `submit` returns sees its own request.
        let metrics = &self.metrics;
        let outcome = request.publish(gathered, &|outcome| {
            metrics.record_request(outcome, started.elapsed())
        });
        let elapsed = started.elapsed();

        match outcome {
            Ok(()) => tracing::debug!(
                request_id = %id,
                %tag,
                elapsed_us = elapsed.as_micros() as u64,
                "request published"
            ),
            Err(e) => tracing::warn!(request_id = %id, %tag, error = %e, "request failed"),
        }
    }

    /// Hand buffered units to their lanes, lowest lane index first.
    ///
    /// Returns how many units each lane accepted.
    fn dispatch(&self, batches: Vec<Vec<LaneUnit>>) -> (Vec<usize>, Option<PoolError>) {
        let mut counts = Vec::with_capacity(self.lanes.len());
        let mut failure = None;

        for (lane, units) in self.lanes.iter().zip(batches) {
            let mut sent = 0;
            for unit in units {
                if lane.inbound.send(unit).is_err() {
                    failure.get_or_insert(PoolError::WorkerPanic {
                        lane: lane.index,
                        message: "lane worker is gone".into(),
                    });
                    break;
                }
                sent += 1;
            }
            counts.push(sent);
        }

        tracing::trace!(?counts, "units dispatched");
        (counts, failure)
    }

    /// Collect `counts[i]` results from lane `i`, lowest lane index first,
    /// and return the outputs ordered by sequence index.
    fn gather(&self, tag: CompletionTag, counts: &[usize]) -> PoolResult<Vec<UnitOutput>> {
        let total = counts.iter().sum();
        let mut collected: Vec<(usize, UnitOutput)> = Vec::with_capacity(total);
        let mut failure = None;

        for (lane, &expected) in self.lanes.iter().zip(counts) {
            let mut received = 0;
            while received < expected {
                let result = match lane.outbound.recv() {
                    Ok(result) => result,
                    Err(_) => {
                        failure.get_or_insert(PoolError::WorkerPanic {
                            lane: lane.index,
                            message: "lane worker is gone".into(),
                        });
                        break;
                    }
                };

                if result.tag != tag {
                    tracing::warn!(
                        lane = lane.index,
                        expected = %tag,
                        found = %result.tag,
                        "discarding stale unit result"
                    );
                    continue;
                }
                received += 1;

                match result.output {
                    Ok(output) => collected.push((result.seq, output)),
                    Err(message) => {
                        failure.get_or_insert(PoolError::WorkerPanic {
                            lane: lane.index,
                            message,
                        });
                    }
                }
            }
        }

        if let Some(err) = failure {
            return Err(err);
        }

        collected.sort_unstable_by_key(|(seq, _)| *seq);
        Ok(collected.into_iter().map(|(_, output)| output).collect())
    }
}
