//! Test operations and pool builders

use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use lane_dispatch::config::PoolConfig;
use lane_dispatch::dispatch::{DispatchPool, Operation, Scatter};

/// Start a pool with the given parallelism and a test-specific name.
pub fn pool(name: &str, parallelism: usize) -> DispatchPool {
    DispatchPool::start(&PoolConfig::new(parallelism).with_name(name))
        .expect("Failed to start pool")
}

/// Start a pool with a custom identifier pool size.
pub fn pool_with_capacity(name: &str, parallelism: usize, max_in_flight: usize) -> DispatchPool {
    let config = PoolConfig::new(parallelism)
        .with_name(name)
        .with_max_in_flight(max_in_flight);
    DispatchPool::start(&config).expect("Failed to start pool")
}

/// Spin until `condition` holds, panicking after two seconds.
pub fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(1));
    }
}

/// `payload * k` for k in 1..=3, one unit per lane, each adding 1, summed.
pub struct Fanout;

impl Operation for Fanout {
    type Payload = i64;
    type UnitOutput = i64;
    type Packaged = i64;

    fn split(&self, payload: i64, lanes: &mut Scatter<i64>) {
        for k in 1..=3usize {
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

/// Doubles every element, spreading units round-robin, and returns them in order.
pub struct Double;

impl Operation for Double {
    type Payload = Vec<u64>;
    type UnitOutput = u64;
    type Packaged = Vec<u64>;

    fn split(&self, payload: Vec<u64>, lanes: &mut Scatter<u64>) {
        for value in payload {
            lanes.push_round_robin(value, |v| v * 2);
        }
    }

    fn package(&self, results: Vec<u64>) -> Vec<u64> {
        results
    }
}

/// Records the payload in `log` when split, then returns it unchanged.
pub struct Recorded {
    pub log: Arc<Mutex<Vec<u32>>>,
}

impl Operation for Recorded {
    type Payload = u32;
    type UnitOutput = u32;
    type Packaged = u32;

    fn split(&self, payload: u32, lanes: &mut Scatter<u32>) {
        self.log.lock().unwrap().push(payload);
        lanes.push_round_robin(payload, |v| v);
    }

    fn package(&self, results: Vec<u32>) -> u32 {
        results[0]
    }
}

/// `units` units returning their own sequence index. Lower indices sleep
/// longer, so later units finish first.
pub struct Staggered {
    pub units: usize,
}

impl Operation for Staggered {
    type Payload = ();
    type UnitOutput = usize;
    type Packaged = Vec<usize>;

    fn split(&self, _: (), lanes: &mut Scatter<usize>) {
        let lane_count = lanes.lane_count();
        for i in 0..self.units {
            let delay = Duration::from_millis(((self.units - i) * 3) as u64);
            lanes.push((lane_count - 1) - (i % lane_count), i, move |i| {
                thread::sleep(delay);
                i
            });
        }
    }

    fn package(&self, results: Vec<usize>) -> Vec<usize> {
        results
    }
}

/// One unit per lane, each reporting `(lane, thread name)`.
pub struct ThreadProbe {
    pub rounds: usize,
}

impl Operation for ThreadProbe {
    type Payload = ();
    type UnitOutput = (usize, String);
    type Packaged = Vec<(usize, String)>;

    fn split(&self, _: (), lanes: &mut Scatter<(usize, String)>) {
        for _ in 0..self.rounds {
            for lane in 0..lanes.lane_count() {
                lanes.push(lane, lane, |lane| {
                    let name = thread::current().name().unwrap_or("<unnamed>").to_string();
                    (lane, name)
                });
            }
        }
    }

    fn package(&self, results: Vec<(usize, String)>) -> Vec<(usize, String)> {
        results
    }
}

/// A single unit on lane 1 that waits on `barrier` before returning.
pub struct Gate {
    pub barrier: Arc<Barrier>,
}

impl Operation for Gate {
    type Payload = ();
    type UnitOutput = ();
    type Packaged = &'static str;

    fn split(&self, _: (), lanes: &mut Scatter<()>) {
        let barrier = Arc::clone(&self.barrier);
        lanes.push(1, (), move |_| {
            barrier.wait();
        });
    }

    fn package(&self, _: Vec<()>) -> &'static str {
        "opened"
    }
}

/// Panics inside the unit pushed to `lane`.
pub struct PanicsOnLane {
    pub lane: usize,
}

impl Operation for PanicsOnLane {
    type Payload = ();
    type UnitOutput = u8;
    type Packaged = u8;

    fn split(&self, _: (), lanes: &mut Scatter<u8>) {
        for lane in 0..lanes.lane_count() {
            if lane == self.lane {
                lanes.push(lane, (), |_| panic!("unit blew up"));
            } else {
                lanes.push(lane, (), |_| 1);
            }
        }
    }

    fn package(&self, results: Vec<u8>) -> u8 {
        results.into_iter().sum()
    }
}

/// Declares more units than it produces.
pub struct Miscounted;

impl Operation for Miscounted {
    type Payload = ();
    type UnitOutput = ();
    type Packaged = ();

    fn split(&self, _: (), lanes: &mut Scatter<()>) {
        lanes.push(0, (), |_| ());
        lanes.push(1, (), |_| ());
    }

    fn package(&self, _: Vec<()>) {}

    fn expected_units(&self) -> Option<usize> {
        Some(5)
    }
}
