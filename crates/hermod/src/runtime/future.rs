// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Single-assignment futures with cooperative cancellation.
//!
//! A [`Promise`] is the producer half, a [`Future`] the consumer half
//! of one shared completion cell. The cell resolves exactly once to a
//! value, an error string, or cancelled; later completions are ignored.
//!
//! Completion callbacks registered with [`Future::connect`] fire once,
//! in registration order for [`CallbackMode::Sync`].
//! [`CallbackMode::Async`] callbacks are re-dispatched through the
//! event loop the future is bound to (futures produced by
//! [`crate::runtime::EventLoop::schedule`] are always bound).
//!
//! Cancellation is cooperative: `cancel()` runs the producer-installed
//! cancel hook outside the cell lock. For event-loop entries the hook
//! removes the pending entry and resolves the future cancelled; an
//! entry that already started only sees the cancel-requested flag.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::runtime::event_loop::EventLoop;

/// How a completion callback is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackMode {
    /// Inline on the thread that completes the future.
    Sync,
    /// Dispatched through the bound event loop (inline when unbound).
    Async,
}

/// Observable lifecycle of a future.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FutureState {
    Pending,
    Ready,
    Error,
    Cancelled,
}

enum Outcome<T> {
    Ready(T),
    Error(String),
    Cancelled,
}

type Callback<T> = Box<dyn FnOnce(Future<T>) + Send>;
type CancelHook = Box<dyn FnOnce() + Send>;

struct Inner<T> {
    outcome: Option<Outcome<T>>,
    callbacks: Vec<(CallbackMode, Callback<T>)>,
    cancel_requested: bool,
    cancel_hook: Option<CancelHook>,
    executor: Option<EventLoop>,
}

struct Shared<T> {
    inner: Mutex<Inner<T>>,
    done: Condvar,
}

/// Producer half of a completion cell.
pub struct Promise<T> {
    shared: Arc<Shared<T>>,
}

/// Consumer half of a completion cell.
pub struct Future<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + 'static> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Promise<T> {
    /// Fresh, unbound promise.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    outcome: None,
                    callbacks: Vec::new(),
                    cancel_requested: false,
                    cancel_hook: None,
                    executor: None,
                }),
                done: Condvar::new(),
            }),
        }
    }

    /// The consumer half.
    #[must_use]
    pub fn future(&self) -> Future<T> {
        Future {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Bind the executor used for `CallbackMode::Async` callbacks.
    pub fn bind_executor(&self, event_loop: &EventLoop) {
        self.shared.inner.lock().executor = Some(event_loop.clone());
    }

    /// Install the cooperative-cancel hook. If a cancel was already
    /// requested (and the cell is still pending) the hook runs now.
    pub fn set_cancel_hook<F: FnOnce() + Send + 'static>(&self, hook: F) {
        let run_now = {
            let mut inner = self.shared.inner.lock();
            if inner.outcome.is_some() {
                false
            } else if inner.cancel_requested {
                true
            } else {
                inner.cancel_hook = Some(Box::new(hook));
                return;
            }
        };
        if run_now {
            hook();
        }
    }

    /// Resolve with a value. Ignored after the first completion.
    pub fn set_value(&self, value: T) {
        self.complete(Outcome::Ready(value));
    }

    /// Resolve with an error. Ignored after the first completion.
    pub fn set_error(&self, message: impl Into<String>) {
        self.complete(Outcome::Error(message.into()));
    }

    /// Resolve cancelled. Ignored after the first completion.
    pub fn set_cancelled(&self) {
        self.complete(Outcome::Cancelled);
    }

    fn complete(&self, outcome: Outcome<T>) {
        let (callbacks, executor) = {
            let mut inner = self.shared.inner.lock();
            if inner.outcome.is_some() {
                log::debug!("promise completed twice, later result dropped");
                return;
            }
            inner.outcome = Some(outcome);
            inner.cancel_hook = None;
            (std::mem::take(&mut inner.callbacks), inner.executor.clone())
        };
        self.shared.done.notify_all();
        for (mode, callback) in callbacks {
            dispatch_callback(&self.shared, mode, callback, executor.as_ref());
        }
    }
}

fn dispatch_callback<T: Send + 'static>(
    shared: &Arc<Shared<T>>,
    mode: CallbackMode,
    callback: Callback<T>,
    executor: Option<&EventLoop>,
) {
    let future = Future {
        shared: Arc::clone(shared),
    };
    match (mode, executor) {
        (CallbackMode::Async, Some(event_loop)) => {
            event_loop.schedule(Duration::ZERO, move || callback(future));
        }
        _ => callback(future),
    }
}

impl<T: Send + 'static> Future<T> {
    /// Current state.
    #[must_use]
    pub fn state(&self) -> FutureState {
        match &self.shared.inner.lock().outcome {
            None => FutureState::Pending,
            Some(Outcome::Ready(_)) => FutureState::Ready,
            Some(Outcome::Error(_)) => FutureState::Error,
            Some(Outcome::Cancelled) => FutureState::Cancelled,
        }
    }

    /// True once resolved (any outcome).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.shared.inner.lock().outcome.is_some()
    }

    /// True if the future resolved cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state() == FutureState::Cancelled
    }

    /// True if the future resolved with an error.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.state() == FutureState::Error
    }

    /// True if `cancel()` was called, whether or not it took effect.
    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.shared.inner.lock().cancel_requested
    }

    /// Error message, if the future resolved with one.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        match &self.shared.inner.lock().outcome {
            Some(Outcome::Error(message)) => Some(message.clone()),
            _ => None,
        }
    }

    /// Block until resolved.
    pub fn wait(&self) {
        let mut inner = self.shared.inner.lock();
        while inner.outcome.is_none() {
            self.shared.done.wait(&mut inner);
        }
    }

    /// Block until resolved or `timeout` elapses. Returns true if the
    /// future resolved in time.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        let mut inner = self.shared.inner.lock();
        while inner.outcome.is_none() {
            if self.shared.done.wait_until(&mut inner, deadline).timed_out() {
                return inner.outcome.is_some();
            }
        }
        true
    }

    /// Request cooperative cancellation. Runs the producer's cancel
    /// hook (outside the cell lock); a no-op once resolved.
    pub fn cancel(&self) {
        let hook = {
            let mut inner = self.shared.inner.lock();
            if inner.outcome.is_some() {
                return;
            }
            inner.cancel_requested = true;
            inner.cancel_hook.take()
        };
        if let Some(hook) = hook {
            hook();
        }
    }

    /// Register a completion callback. Fires immediately if the future
    /// is already resolved. Sync callbacks registered before completion
    /// fire in registration order on the completing thread.
    pub fn connect<F: FnOnce(Future<T>) + Send + 'static>(&self, mode: CallbackMode, callback: F) {
        let executor = {
            let mut inner = self.shared.inner.lock();
            if inner.outcome.is_none() {
                inner.callbacks.push((mode, Box::new(callback)));
                return;
            }
            inner.executor.clone()
        };
        dispatch_callback(&self.shared, mode, Box::new(callback), executor.as_ref());
    }
}

impl<T: Clone + Send + 'static> Future<T> {
    /// The resolved value, if any.
    #[must_use]
    pub fn value(&self) -> Option<T> {
        match &self.shared.inner.lock().outcome {
            Some(Outcome::Ready(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Block until resolved and return the value (None for error or
    /// cancelled outcomes).
    pub fn wait_value(&self) -> Option<T> {
        self.wait();
        self.value()
    }
}
