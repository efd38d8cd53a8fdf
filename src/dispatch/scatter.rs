//! Typed builder an operation uses to fan its payload out across lanes.

use std::marker::PhantomData;

use super::lane::{CompletionTag, LaneUnit, UnitOutput};

/// Per-lane work units produced by one `split` call.
///
/// Units are buffered here while `split` runs and handed to the lanes in
/// ascending lane order once it returns. Sequence indices follow push order.
pub struct Scatter<O> {
    tag: CompletionTag,
    lanes: Vec<Vec<LaneUnit>>,
    next_seq: usize,
    next_lane: usize,
    _output: PhantomData<fn() -> O>,
}

impl<O: Send + 'static> Scatter<O> {
    pub(crate) fn new(lane_count: usize, tag: CompletionTag) -> Self {
        Self {
            tag,
            lanes: (0..lane_count.max(1)).map(|_| Vec::new()).collect(),
            next_seq: 0,
            next_lane: 0,
            _output: PhantomData,
        }
    }

    /// Completion tag shared by every unit of this request.
    #[inline]
    pub fn tag(&self) -> CompletionTag {
        self.tag
    }

    /// Number of lanes units can be pushed to. Lane 0 is served by the
    /// coordinator thread itself.
    #[inline]
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Queue `step(input)` on `lane` (taken modulo [`lane_count`](Self::lane_count)).
    ///
    /// Returns the sequence index the result will be gathered under.
    pub fn push<I, F>(&mut self, lane: usize, input: I, step: F) -> usize
    where
        I: Send + 'static,
        F: FnOnce(I) -> O + Send + 'static,
    {
        let seq = self.next_seq;
        self.next_seq += 1;

        let lane = lane % self.lanes.len();
        self.lanes[lane].push(LaneUnit {
            tag: self.tag,
            seq,
            step: Box::new(move || Box::new(step(input)) as UnitOutput),
        });
        seq
    }

    /// Queue `step(input)` on the next lane in rotation, starting at lane 0.
    pub fn push_round_robin<I, F>(&mut self, input: I, step: F) -> usize
    where
        I: Send + 'static,
        F: FnOnce(I) -> O + Send + 'static,
    {
        let lane = self.next_lane;
        self.next_lane = (self.next_lane + 1) % self.lanes.len();
        self.push(lane, input, step)
    }

    /// Total units pushed so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.next_seq
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.next_seq == 0
    }

    /// Units pushed to `lane` so far.
    pub fn lane_len(&self, lane: usize) -> usize {
        self.lanes.get(lane).map_or(0, Vec::len)
    }

    pub(crate) fn into_lanes(self) -> Vec<Vec<LaneUnit>> {
        self.lanes
    }
}
