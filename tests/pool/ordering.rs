//! Request FIFO order and result reassembly.

use std::sync::{Arc, Mutex};

use futures_util::future::join_all;

use crate::helpers::*;

/// Requests are split in the order they were enqueued
#[tokio::test]
async fn test_requests_are_serviced_fifo() {
    let pool = pool("order-fifo", 3);
    let log = Arc::new(Mutex::new(Vec::new()));

    // join_all polls in order, so request n is enqueued before n + 1
    let pending = (0..12u32).map(|n| {
        let op = Recorded {
            log: Arc::clone(&log),
        };
        pool.submit_async(op, n)
    });
    let results = join_all(pending).await;

    for (n, result) in results.into_iter().enumerate() {
        assert_eq!(result.unwrap(), Some(n as u32));
    }
    assert_eq!(*log.lock().unwrap(), (0..12).collect::<Vec<u32>>());
}

/// Results are ordered by sequence index even when later units finish first
#[test]
fn test_reassembly_ignores_completion_order() {
    let pool = pool("order-stagger", 5);

    let result = pool.submit(Staggered { units: 16 }, ()).unwrap();
    assert_eq!(result, Some((0..16).collect::<Vec<_>>()));
}

/// Same with a single lane, where every unit runs on the coordinator
#[test]
fn test_reassembly_on_single_lane() {
    let pool = pool("order-single", 2);

    let result = pool.submit(Staggered { units: 6 }, ()).unwrap();
    assert_eq!(result, Some((0..6).collect::<Vec<_>>()));
}
