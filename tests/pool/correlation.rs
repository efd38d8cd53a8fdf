//! Request/result correlation and identifier reuse.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use futures_util::future::join_all;

use crate::helpers::*;

/// Concurrent callers each get the result computed from their own payload
#[test]
fn test_concurrent_callers_get_their_own_results() {
    let pool = Arc::new(pool("corr-threads", 4));

    let callers: Vec<_> = (0..16u64)
        .map(|caller| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for round in 0..25u64 {
                    let payload: Vec<u64> = (0..8).map(|i| caller * 1_000 + round * 10 + i).collect();
                    let expected: Vec<u64> = payload.iter().map(|v| v * 2).collect();

                    let result = pool.submit(Double, payload).unwrap();
                    assert_eq!(result, Some(expected), "caller {} round {}", caller, round);
                }
            })
        })
        .collect();

    for caller in callers {
        caller.join().unwrap();
    }

    assert_eq!(pool.in_flight(), 0);
    assert_eq!(pool.stats().requests_ok, 16 * 25);
}

/// Results held at the same time carry distinct identifiers
#[test]
fn test_live_results_have_distinct_ids() {
    let pool = pool_with_capacity("corr-distinct", 3, 128);

    let held: Vec<_> = (0..100)
        .map(|n| pool.submit_published(Fanout, n).unwrap().unwrap())
        .collect();

    let ids: HashSet<u16> = held.iter().map(|p| p.id().get()).collect();
    assert_eq!(ids.len(), 100);
    assert_eq!(pool.in_flight(), 100);

    for (n, published) in held.iter().enumerate() {
        assert_eq!(*published.payload(), n as i64 * 6 + 3);
    }

    drop(held);
    assert_eq!(pool.in_flight(), 0);
}

/// With a single identifier, back-to-back requests reuse it without mixing results
#[test]
fn test_identifier_reuse() {
    let pool = pool_with_capacity("corr-reuse", 4, 1);

    for n in 0..20 {
        let published = pool.submit_published(Fanout, n).unwrap().unwrap();
        assert_eq!(published.id().get(), 1);
        assert_eq!(published.into_payload(), n * 6 + 3);
    }

    assert_eq!(pool.in_flight(), 0);
}

/// Many async submissions in flight at once resolve to their own payloads
#[tokio::test]
async fn test_async_correlation() {
    let pool = pool("corr-async", 4);

    let pending = (0..20i64).map(|n| pool.submit_async(Fanout, n));
    let results = join_all(pending).await;

    for (n, result) in results.into_iter().enumerate() {
        assert_eq!(result.unwrap(), Some(n as i64 * 6 + 3));
    }
}
