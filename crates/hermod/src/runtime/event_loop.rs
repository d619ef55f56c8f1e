// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Thread-pool event loop with deadline dispatch.
//!
//! A pool of named worker threads drains a priority queue ordered by
//! dispatch deadline. [`EventLoop::schedule`] returns a [`Future`]
//! bound to the callback's return value; a panicking callback resolves
//! the future with an error instead of killing the worker.
//!
//! Cancellation goes through a per-entry token: cancelling a pending
//! entry resolves its future cancelled and the entry is skipped when it
//! reaches the front of the queue; an entry that already started runs
//! to completion with only the cancel-requested flag set.
//!
//! ```text
//! schedule(delay, f) --> +--------------------------+
//!                        |  deadline-ordered heap   |
//!                        +--------------------------+
//!                          |        |        |
//!                     hermod-loop-0 ... hermod-loop-N
//! ```

use std::collections::BinaryHeap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::runtime::future::{Future, Promise};

const TOKEN_PENDING: u8 = 0;
const TOKEN_RUNNING: u8 = 1;
const TOKEN_CANCELLED: u8 = 2;

/// Per-entry dispatch token. Exactly one of `try_begin` / `try_cancel`
/// wins; the loser backs off.
#[derive(Debug)]
pub(crate) struct TaskToken(AtomicU8);

impl TaskToken {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(TOKEN_PENDING))
    }

    /// Claim the entry for execution.
    pub(crate) fn try_begin(&self) -> bool {
        self.0
            .compare_exchange(
                TOKEN_PENDING,
                TOKEN_RUNNING,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// Claim the entry for cancellation.
    pub(crate) fn try_cancel(&self) -> bool {
        self.0
            .compare_exchange(
                TOKEN_PENDING,
                TOKEN_CANCELLED,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }
}

struct QueuedEntry {
    deadline: Instant,
    seq: u64,
    token: Arc<TaskToken>,
    job: Box<dyn FnOnce() + Send>,
    /// Resolves the entry's future cancelled; only called after the
    /// token was claimed for cancellation (shutdown drain).
    resolve_cancelled: Box<dyn FnOnce() + Send>,
}

impl PartialEq for QueuedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for QueuedEntry {}

impl PartialOrd for QueuedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEntry {
    // Reversed so the BinaryHeap (a max-heap) pops the earliest
    // deadline first; seq breaks ties in submission order.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct LoopShared {
    queue: Mutex<BinaryHeap<QueuedEntry>>,
    wakeup: Condvar,
    shutdown: AtomicBool,
    next_seq: AtomicU64,
}

/// Thread-pool executor with delayed dispatch. Cheap to clone; all
/// clones share the same pool.
pub struct EventLoop {
    shared: Arc<LoopShared>,
    workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl Clone for EventLoop {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            workers: Arc::clone(&self.workers),
        }
    }
}

impl EventLoop {
    /// Pool with `threads` workers (minimum one).
    #[must_use]
    pub fn new(threads: usize) -> Self {
        let shared = Arc::new(LoopShared {
            queue: Mutex::new(BinaryHeap::new()),
            wakeup: Condvar::new(),
            shutdown: AtomicBool::new(false),
            next_seq: AtomicU64::new(0),
        });

        let count = threads.max(1);
        let mut workers = Vec::with_capacity(count);
        for i in 0..count {
            let shared = Arc::clone(&shared);
            let handle = std::thread::Builder::new()
                .name(format!("hermod-loop-{i}"))
                .spawn(move || worker_loop(&shared))
                .expect("failed to spawn event loop worker");
            workers.push(handle);
        }

        Self {
            shared,
            workers: Arc::new(Mutex::new(workers)),
        }
    }

    /// Pool sized to the hardware concurrency.
    #[must_use]
    pub fn default_pool() -> Self {
        let threads = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(4);
        Self::new(threads)
    }

    /// Schedule `f` to run after `delay` (zero = as soon as a worker is
    /// free). The returned future resolves with `f`'s return value, an
    /// error if `f` panics, or cancelled.
    pub fn schedule<T, F>(&self, delay: Duration, f: F) -> Future<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let promise = Promise::new();
        promise.bind_executor(self);
        let future = promise.future();

        let token = Arc::new(TaskToken::new());

        // cooperative cancel: claim the token, resolve cancelled
        {
            let token = Arc::clone(&token);
            let promise = promise.clone();
            promise.clone().set_cancel_hook(move || {
                if token.try_cancel() {
                    promise.set_cancelled();
                }
            });
        }

        let job_promise = promise.clone();
        let job = Box::new(move || match catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => job_promise.set_value(value),
            Err(payload) => {
                let message = panic_message(&payload);
                log::warn!("scheduled callback panicked: {message}");
                job_promise.set_error(message);
            }
        });

        let entry = QueuedEntry {
            deadline: Instant::now() + delay,
            seq: self.shared.next_seq.fetch_add(1, Ordering::Relaxed),
            token: Arc::clone(&token),
            job,
            resolve_cancelled: Box::new(move || promise.set_cancelled()),
        };

        {
            let mut queue = self.shared.queue.lock();
            if self.shared.shutdown.load(Ordering::SeqCst) {
                drop(queue);
                if token.try_cancel() {
                    (entry.resolve_cancelled)();
                }
                return future;
            }
            queue.push(entry);
        }
        self.shared.wakeup.notify_one();

        future
    }

    /// Drain the queue (pending entries resolve cancelled), wait for
    /// in-flight callbacks, and join the workers. Idempotent.
    pub fn shutdown(&self) {
        if self.shared.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }

        let drained: Vec<QueuedEntry> = {
            let mut queue = self.shared.queue.lock();
            queue.drain().collect()
        };
        for entry in drained {
            if entry.token.try_cancel() {
                (entry.resolve_cancelled)();
            }
        }

        self.shared.wakeup.notify_all();

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }
    }

    /// True once `shutdown()` has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shared.shutdown.load(Ordering::SeqCst)
    }
}

fn worker_loop(shared: &LoopShared) {
    loop {
        let entry = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(front) = queue.peek() {
                    let now = Instant::now();
                    if front.deadline <= now {
                        break queue.pop();
                    }
                    let deadline = front.deadline;
                    shared.wakeup.wait_until(&mut queue, deadline);
                } else {
                    if shared.shutdown.load(Ordering::SeqCst) {
                        return;
                    }
                    shared.wakeup.wait(&mut queue);
                }
            }
        };

        if let Some(entry) = entry {
            if entry.token.try_begin() {
                (entry.job)();
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "callback panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::future::FutureState;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn schedule_runs_and_resolves() {
        let event_loop = EventLoop::new(2);
        let future = event_loop.schedule(Duration::ZERO, || 41 + 1);
        assert_eq!(future.wait_value(), Some(42));
        event_loop.shutdown();
    }

    #[test]
    fn delay_orders_dispatch() {
        let event_loop = EventLoop::new(1);
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = Arc::clone(&order);
        let slow = event_loop.schedule(Duration::from_millis(80), move || o1.lock().push("slow"));
        let o2 = Arc::clone(&order);
        let fast = event_loop.schedule(Duration::from_millis(10), move || o2.lock().push("fast"));

        slow.wait();
        fast.wait();
        assert_eq!(*order.lock(), vec!["fast", "slow"]);
        event_loop.shutdown();
    }

    #[test]
    fn zero_delay_preserves_submission_order_single_worker() {
        let event_loop = EventLoop::new(1);
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut futures = Vec::new();
        for i in 0..8 {
            let order = Arc::clone(&order);
            futures.push(event_loop.schedule(Duration::ZERO, move || order.lock().push(i)));
        }
        for f in &futures {
            f.wait();
        }
        assert_eq!(*order.lock(), (0..8).collect::<Vec<_>>());
        event_loop.shutdown();
    }

    #[test]
    fn cancel_pending_entry_skips_callback() {
        let event_loop = EventLoop::new(1);
        let ran = Arc::new(AtomicUsize::new(0));
        let ran2 = Arc::clone(&ran);
        let future = event_loop.schedule(Duration::from_millis(200), move || {
            ran2.fetch_add(1, Ordering::SeqCst);
        });

        future.cancel();
        assert!(future.is_cancelled());

        std::thread::sleep(Duration::from_millis(250));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        event_loop.shutdown();
    }

    #[test]
    fn cancel_running_entry_has_no_preemptive_effect() {
        let event_loop = EventLoop::new(1);
        let release = Arc::new(AtomicBool::new(false));
        let release2 = Arc::clone(&release);
        let future = event_loop.schedule(Duration::ZERO, move || {
            while !release2.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(1));
            }
            "finished"
        });

        // let the callback start, then cancel mid-run
        std::thread::sleep(Duration::from_millis(30));
        future.cancel();
        assert!(future.is_cancel_requested());
        release.store(true, Ordering::SeqCst);

        future.wait();
        assert_eq!(future.state(), FutureState::Ready);
        assert_eq!(future.value(), Some("finished"));
        event_loop.shutdown();
    }

    #[test]
    fn panic_resolves_error_and_worker_survives() {
        let event_loop = EventLoop::new(1);
        let bad = event_loop.schedule(Duration::ZERO, || panic!("kaboom"));
        bad.wait();
        assert!(bad.has_error());
        assert!(bad.error().unwrap().contains("kaboom"));

        // the single worker is still alive
        let good = event_loop.schedule(Duration::ZERO, || 1);
        assert_eq!(good.wait_value(), Some(1));
        event_loop.shutdown();
    }

    #[test]
    fn shutdown_cancels_pending_entries() {
        let event_loop = EventLoop::new(2);
        let far = event_loop.schedule(Duration::from_secs(60), || ());
        event_loop.shutdown();
        far.wait();
        assert!(far.is_cancelled());

        // scheduling after shutdown resolves cancelled immediately
        let late = event_loop.schedule(Duration::ZERO, || ());
        assert!(late.is_cancelled());
    }
}
