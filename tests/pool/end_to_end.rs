//! End-to-end scatter/gather through a running pool.

use crate::helpers::*;

/// 10 fans out as 10, 20, 30 on three lanes; each adds 1; sum is 63
#[test]
fn test_fanout_sums_to_63() {
    let pool = pool("e2e-fanout", 4);
    assert_eq!(pool.lane_count(), 3);

    let total = pool.submit(Fanout, 10).unwrap();
    assert_eq!(total, Some(63));

    // One unit landed on each lane
    assert_eq!(pool.stats().units_per_lane, vec![1, 1, 1]);
}

/// Units pushed past the last lane wrap around
#[test]
fn test_fanout_with_fewer_lanes() {
    let pool = pool("e2e-wrap", 3);
    assert_eq!(pool.submit(Fanout, 10).unwrap(), Some(63));
    assert_eq!(pool.stats().units_per_lane, vec![2, 1]);
}

/// Round-robin results come back in push order
#[test]
fn test_round_robin_preserves_order() {
    let pool = pool("e2e-double", 5);
    let input: Vec<u64> = (0..100).collect();
    let expected: Vec<u64> = input.iter().map(|v| v * 2).collect();

    assert_eq!(pool.submit(Double, input).unwrap(), Some(expected));
}

/// A request that produces no units still gets packaged
#[test]
fn test_empty_request() {
    let pool = pool("e2e-empty", 4);
    assert_eq!(pool.submit(Double, Vec::new()).unwrap(), Some(Vec::new()));
}

/// Metrics reflect completed requests
#[test]
fn test_metrics_after_requests() {
    let pool = pool("e2e-metrics", 4);
    for n in 0..5 {
        pool.submit(Fanout, n).unwrap();
    }

    let metrics = pool.metrics();
    assert_eq!(metrics.requests_with_outcome("ok"), 5);

    let text = metrics.encode();
    assert!(text.contains("dispatch_requests_total"));
    assert!(text.contains("pool=\"e2e-metrics\""));
    assert!(text.contains("dispatch_lanes{pool=\"e2e-metrics\"} 3"));
}

/// A request is counted before its caller is woken
#[test]
fn test_stats_include_the_request_just_returned() {
    let pool = pool("e2e-settled", 3);

    for n in 1..=200u64 {
        assert_eq!(pool.submit(Fanout, 1).unwrap(), Some(9));
        let stats = pool.stats();
        assert_eq!(stats.requests_ok, n, "request {} not yet counted", n);
        assert_eq!(stats.in_flight, 0);
    }
}

/// The in-flight gauge is live in the registry without going through `stats`
#[test]
fn test_in_flight_gauge_in_encoded_metrics() {
    let pool = pool("e2e-gauge", 3);

    let held = pool.submit_published(Fanout, 1).unwrap().unwrap();
    assert!(pool
        .metrics()
        .encode()
        .contains("dispatch_requests_in_flight{pool=\"e2e-gauge\"} 1"));

    drop(held);
    assert!(pool
        .metrics()
        .encode()
        .contains("dispatch_requests_in_flight{pool=\"e2e-gauge\"} 0"));
}

/// The async gateway yields the same result as the blocking one
#[tokio::test]
async fn test_submit_async_fanout() {
    let pool = pool("e2e-async", 4);
    assert_eq!(pool.submit_async(Fanout, 10).await.unwrap(), Some(63));
}
