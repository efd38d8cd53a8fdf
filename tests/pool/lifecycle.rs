//! Passthrough mode, shutdown and timeouts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use lane_dispatch::dispatch::{DispatchPool, PoolError};

use crate::helpers::*;

/// Parallelism below 2 starts nothing and answers every submission with None
#[test]
fn test_passthrough_mode() {
    for parallelism in [0, 1] {
        let pool = DispatchPool::with_parallelism(parallelism).unwrap();

        assert!(pool.is_passthrough());
        assert_eq!(pool.thread_count(), 0);
        assert_eq!(pool.lane_count(), 0);
        assert_eq!(pool.submit(Fanout, 10).unwrap(), None);
        assert!(pool.submit_published(Fanout, 10).unwrap().is_none());
        assert_eq!(pool.in_flight(), 0);
        assert!(pool.stats().units_per_lane.is_empty());
    }
}

#[tokio::test]
async fn test_passthrough_async() {
    let pool = DispatchPool::with_parallelism(1).unwrap();
    assert_eq!(pool.submit_async(Fanout, 10).await.unwrap(), None);
    assert_eq!(
        pool.submit_with_timeout(Fanout, 10, Duration::from_millis(10))
            .await
            .unwrap(),
        None
    );
}

/// Requests queued before stop are still serviced; later ones are refused
#[test]
fn test_stop_drains_queued_requests() {
    let pool = Arc::new(pool("life-drain", 3));
    let barrier = Arc::new(Barrier::new(2));

    // Hold the coordinator inside the first request
    let gated = {
        let pool = Arc::clone(&pool);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || pool.submit(Gate { barrier }, ()))
    };
    wait_until("gate to be queued", || pool.in_flight() == 1);

    let queued: Vec<_> = (1..=3i64)
        .map(|n| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || (n, pool.submit(Fanout, n)))
        })
        .collect();
    wait_until("requests to be queued", || pool.in_flight() == 4);
    thread::sleep(Duration::from_millis(20));

    let stopper = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.stop())
    };
    wait_until("pool to stop accepting", || pool.is_stopped());
    assert_eq!(pool.submit(Fanout, 99).unwrap_err(), PoolError::Shutdown);

    barrier.wait();

    assert_eq!(gated.join().unwrap().unwrap(), Some("opened"));
    for handle in queued {
        let (n, result) = handle.join().unwrap();
        assert_eq!(result.unwrap(), Some(n * 6 + 3));
    }
    stopper.join().unwrap();
    assert_eq!(pool.in_flight(), 0);
}

/// A second stop waits for the first to finish joining
#[test]
fn test_concurrent_stop_waits_for_join() {
    let pool = Arc::new(pool("life-stop-race", 3));
    assert_eq!(pool.thread_count(), 2);
    let barrier = Arc::new(Barrier::new(2));

    let gated = {
        let pool = Arc::clone(&pool);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || pool.submit(Gate { barrier }, ()))
    };
    wait_until("gate to be queued", || pool.in_flight() == 1);

    let first = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.stop())
    };
    wait_until("pool to stop accepting", || pool.is_stopped());

    let second_done = Arc::new(AtomicBool::new(false));
    let second = {
        let pool = Arc::clone(&pool);
        let done = Arc::clone(&second_done);
        thread::spawn(move || {
            pool.stop();
            done.store(true, Ordering::SeqCst);
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!second_done.load(Ordering::SeqCst));

    barrier.wait();
    second.join().unwrap();
    first.join().unwrap();
    assert_eq!(gated.join().unwrap().unwrap(), Some("opened"));
    assert_eq!(pool.thread_count(), 0);
}

/// Dropping a pool stops and joins its threads
#[test]
fn test_drop_joins_threads() {
    let pool = pool("life-drop", 6);
    assert_eq!(pool.thread_count(), 5);
    assert_eq!(pool.submit(Fanout, 2).unwrap(), Some(15));
    pool.stop();
    assert_eq!(pool.thread_count(), 0);
    drop(pool);
}

/// A caller that gives up gets a timeout; the identifier comes back once the request finishes
#[tokio::test]
async fn test_timeout_releases_identifier_later() {
    let pool = pool_with_capacity("life-timeout", 3, 4);
    let barrier = Arc::new(Barrier::new(2));

    let err = pool
        .submit_with_timeout(
            Gate {
                barrier: Arc::clone(&barrier),
            },
            (),
            Duration::from_millis(30),
        )
        .await
        .unwrap_err();
    assert_eq!(err, PoolError::Timeout(Duration::from_millis(30)));
    assert_eq!(pool.in_flight(), 1);

    barrier.wait();
    wait_until("identifier release", || pool.in_flight() == 0);
    assert_eq!(pool.submit_async(Fanout, 10).await.unwrap(), Some(63));
}
