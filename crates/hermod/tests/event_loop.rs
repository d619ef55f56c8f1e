// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Event loop, future and strand behavior across threads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use hermod::runtime::{CallbackMode, EventLoop, FutureState, Promise, Strand};

#[test]
fn completion_fires_callbacks_once_in_registration_order() {
    let event_loop = EventLoop::new(2);
    let order = Arc::new(Mutex::new(Vec::new()));

    let future = event_loop.schedule(Duration::from_millis(30), || "value");
    for i in 0..5 {
        let order = Arc::clone(&order);
        future.connect(CallbackMode::Sync, move |f| {
            assert_eq!(f.value(), Some("value"));
            order.lock().push(i);
        });
    }

    future.wait();
    // sync callbacks ran on the completing thread, in order
    assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    event_loop.shutdown();
}

#[test]
fn async_callbacks_run_on_the_pool() {
    let event_loop = EventLoop::new(2);
    let fired = Arc::new(AtomicUsize::new(0));
    let fired2 = Arc::clone(&fired);

    let future = event_loop.schedule(Duration::ZERO, || 9);
    future.connect(CallbackMode::Async, move |f| {
        assert_eq!(f.value(), Some(9));
        fired2.fetch_add(1, Ordering::SeqCst);
    });

    let deadline = Instant::now() + Duration::from_secs(2);
    while fired.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    event_loop.shutdown();
}

#[test]
fn promise_without_executor_completes_inline() {
    let promise: Promise<i32> = Promise::new();
    let future = promise.future();
    let fired = Arc::new(AtomicUsize::new(0));
    let fired2 = Arc::clone(&fired);
    future.connect(CallbackMode::Async, move |_| {
        fired2.fetch_add(1, Ordering::SeqCst);
    });

    promise.set_value(3);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn deadline_expiry_as_cancellation() {
    let event_loop = EventLoop::new(1);

    // a watchdog cancels the slow entry when its deadline passes
    let slow = event_loop.schedule(Duration::from_secs(30), || "too late");
    let watchdog = slow.clone();
    let timer = event_loop.schedule(Duration::from_millis(30), move || watchdog.cancel());

    timer.wait();
    slow.wait();
    assert_eq!(slow.state(), FutureState::Cancelled);
    event_loop.shutdown();
}

#[test]
fn strand_orders_work_from_many_threads() {
    let event_loop = EventLoop::new(4);
    let strand = Strand::new(event_loop.clone());
    let log = Arc::new(Mutex::new(Vec::new()));

    let submitters: Vec<_> = (0..4)
        .map(|t| {
            let strand = strand.clone();
            let log = Arc::clone(&log);
            std::thread::spawn(move || {
                let futures: Vec<_> = (0..10)
                    .map(|i| {
                        let log = Arc::clone(&log);
                        strand.schedule(Duration::ZERO, move || log.lock().push((t, i)))
                    })
                    .collect();
                for f in futures {
                    f.wait();
                }
            })
        })
        .collect();
    for s in submitters {
        s.join().unwrap();
    }

    // per-submitter order is preserved even though threads interleave
    let log = log.lock();
    for t in 0..4 {
        let seen: Vec<_> = log.iter().filter(|(thread, _)| *thread == t).collect();
        for (index, (_, i)) in seen.iter().enumerate() {
            assert_eq!(*i, index);
        }
    }
    assert_eq!(log.len(), 40);
    event_loop.shutdown();
}

#[test]
fn shutdown_drains_and_joins() {
    let event_loop = EventLoop::new(2);
    let pending = event_loop.schedule(Duration::from_secs(60), || "never");
    let running = event_loop.schedule(Duration::ZERO, || {
        std::thread::sleep(Duration::from_millis(50));
        "done"
    });

    std::thread::sleep(Duration::from_millis(10));
    event_loop.shutdown();

    // pending entries are cancelled, in-flight ones finish
    assert!(pending.is_cancelled());
    running.wait();
    assert_eq!(running.value(), Some("done"));
    assert!(event_loop.is_shut_down());
}
