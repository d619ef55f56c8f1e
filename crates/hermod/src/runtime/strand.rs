// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Serial executor layered on the event loop.
//!
//! A [`Strand`] guarantees that at most one of its callbacks runs at a
//! time and that callbacks run in the order they became ready, while
//! callbacks of different strands still run in parallel on the pool.
//!
//! Internally a strand owns a FIFO of ready jobs and a single "active"
//! flag. When a delayed submission fires on the event loop it enqueues
//! its job and, if no drain step is in flight, dispatches one. Each
//! drain step runs exactly one job and re-dispatches itself while the
//! queue is non-empty.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::runtime::event_loop::{EventLoop, TaskToken};
use crate::runtime::future::{Future, Promise};

struct StrandJob {
    token: Arc<TaskToken>,
    run: Box<dyn FnOnce() + Send>,
}

struct StrandInner {
    event_loop: EventLoop,
    queue: Mutex<VecDeque<StrandJob>>,
    active: AtomicBool,
}

/// Serial executor handle. Cheap to clone; clones share the queue.
pub struct Strand {
    inner: Arc<StrandInner>,
}

impl Clone for Strand {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Strand {
    /// New strand submitting through `event_loop`.
    #[must_use]
    pub fn new(event_loop: EventLoop) -> Self {
        Self {
            inner: Arc::new(StrandInner {
                event_loop,
                queue: Mutex::new(VecDeque::new()),
                active: AtomicBool::new(false),
            }),
        }
    }

    /// Schedule `f` on the strand after `delay`. Same future semantics
    /// as [`EventLoop::schedule`], plus the serial guarantee.
    pub fn schedule<T, F>(&self, delay: Duration, f: F) -> Future<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let promise = Promise::new();
        promise.bind_executor(&self.inner.event_loop);
        let future = promise.future();

        let token = Arc::new(TaskToken::new());
        let job_promise = promise.clone();
        let job = StrandJob {
            token: Arc::clone(&token),
            run: Box::new(move || match catch_unwind(AssertUnwindSafe(f)) {
                Ok(value) => job_promise.set_value(value),
                Err(payload) => {
                    let message = match payload.downcast_ref::<&str>() {
                        Some(s) => (*s).to_string(),
                        None => payload
                            .downcast_ref::<String>()
                            .cloned()
                            .unwrap_or_else(|| "strand callback panicked".to_string()),
                    };
                    log::warn!("strand callback panicked: {message}");
                    job_promise.set_error(message);
                }
            }),
        };

        // timer stage: when the delay elapses the job becomes ready
        let inner = Arc::clone(&self.inner);
        let timer = self.inner.event_loop.schedule(delay, move || {
            inner.queue.lock().push_back(job);
            StrandInner::pump(&inner);
        });

        // cancelling the strand future cancels the timer stage too
        {
            let token = Arc::clone(&token);
            let promise = promise.clone();
            promise.clone().set_cancel_hook(move || {
                timer.cancel();
                if token.try_cancel() {
                    promise.set_cancelled();
                }
            });
        }

        future
    }
}

impl StrandInner {
    /// Dispatch a drain step unless one is already in flight.
    fn pump(inner: &Arc<StrandInner>) {
        if inner.active.swap(true, Ordering::SeqCst) {
            return;
        }
        Self::dispatch_drain(inner);
    }

    fn dispatch_drain(inner: &Arc<StrandInner>) {
        let next = Arc::clone(inner);
        inner
            .event_loop
            .schedule(Duration::ZERO, move || Self::drain_one(&next));
    }

    /// Run exactly one ready job, then either continue or go idle.
    fn drain_one(inner: &Arc<StrandInner>) {
        let job = inner.queue.lock().pop_front();
        if let Some(job) = job {
            if job.token.try_begin() {
                (job.run)();
            }
        }

        if !inner.queue.lock().is_empty() {
            Self::dispatch_drain(inner);
            return;
        }

        inner.active.store(false, Ordering::SeqCst);
        // a job may have been enqueued between the emptiness check and
        // clearing the flag; reclaim and keep draining if so
        if !inner.queue.lock().is_empty() && !inner.active.swap(true, Ordering::SeqCst) {
            Self::dispatch_drain(inner);
        }
    }
}
