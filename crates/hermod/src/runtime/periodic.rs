// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cancellable, restartable periodic task.
//!
//! A [`PeriodicTask`] repeatedly runs a callback on the event loop (or
//! on a strand), coordinated by a single atomic state cell. All state
//! transitions go through compare-and-set; a thread that must perform a
//! transition persists until it does. `trigger()` is a pure CAS ladder
//! and never blocks.
//!
//! Transition matrix (the only legal moves):
//!
//! ```text
//! Stopped      -> Starting       [start]
//! Starting     -> Rescheduling   [start]
//! Rescheduling -> Scheduled      [reschedule, once the future is stored]
//! Scheduled    -> Running        [callback begins]
//! Running      -> Rescheduling   [callback ended, not stopped]
//! Scheduled    -> Stopping       [stop]
//! Running      -> Stopping       [stop]
//! Stopping     -> Stopped        [callback observes stop, or stop joins]
//! Scheduled    -> Triggering     [trigger]
//! Triggering   -> TriggerReady   [trigger, handler attached]
//! Triggering   -> Running        [callback begins]
//! TriggerReady -> Running        [callback begins]
//! Triggering   -> Rescheduling   [cancel observed, reschedule now]
//! TriggerReady -> Rescheduling   [cancel observed, reschedule now]
//! ```
//!
//! `Rescheduling` doubles as a lock on the task-future slot: only the
//! thread that owns the `Rescheduling` (or `Triggering`) state may
//! touch `task`, so the slot's mutex is never contended.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;

use crate::runtime::clock;
use crate::runtime::event_loop::EventLoop;
use crate::runtime::future::{CallbackMode, Future};
use crate::runtime::state_cell::StateCell;
use crate::runtime::stats::{thread_cpu_times_us, CallStats};
use crate::runtime::strand::Strand;

/// How often aggregated call statistics are logged.
const STATS_WINDOW: Duration = Duration::from_secs(20);

/// CAS attempts per spin round before backing off.
const SPIN_ROUNDS: u32 = 1000;

/// Back-off between attempts once the fast spin failed.
const SPIN_BACKOFF: Duration = Duration::from_millis(1);

/// Periodic-task lifecycle states. Stored in the atomic state cell.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Stopped = 0,
    /// Scheduled in the event loop, waiting for its deadline.
    Scheduled = 1,
    /// Callback executing.
    Running = 2,
    /// Being rescheduled (guards the task-future slot).
    Rescheduling = 3,
    /// `start()` in progress.
    Starting = 4,
    /// Stop requested.
    Stopping = 5,
    /// `trigger()` claimed the scheduled run.
    Triggering = 6,
    /// `trigger()` finished attaching its completion handler.
    TriggerReady = 7,
}

impl TaskState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => TaskState::Scheduled,
            2 => TaskState::Running,
            3 => TaskState::Rescheduling,
            4 => TaskState::Starting,
            5 => TaskState::Stopping,
            6 => TaskState::Triggering,
            7 => TaskState::TriggerReady,
            _ => TaskState::Stopped,
        }
    }
}

/// Configuration and state errors for [`PeriodicTask`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// Invalid configuration value.
    #[error("invalid periodic task configuration: {0}")]
    Config(String),
    /// Operation illegal in the current state.
    #[error("periodic task state error: {0}")]
    State(String),
}

type Callback = Arc<dyn Fn() + Send + Sync>;

struct PeriodicInner {
    state: StateCell,
    name: Mutex<String>,
    callback: Mutex<Option<Callback>>,
    period: Mutex<Option<Duration>>,
    event_loop: EventLoop,
    strand: Mutex<Option<Strand>>,
    compensate: AtomicBool,
    /// Slot for the currently scheduled future. Serialized by the
    /// Rescheduling/Triggering states; the mutex is uncontended.
    task: Mutex<Option<Future<()>>>,
    /// Thread currently inside the callback (reentrancy detection).
    callback_tid: Mutex<Option<ThreadId>>,
    stats: Mutex<CallStats>,
}

/// Repeating callback driven by the event loop. Cheap to clone; all
/// clones control the same task.
pub struct PeriodicTask {
    inner: Arc<PeriodicInner>,
}

impl Clone for PeriodicTask {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl PeriodicTask {
    /// New stopped task scheduling through `event_loop`.
    #[must_use]
    pub fn new(event_loop: &EventLoop) -> Self {
        let inner = Arc::new(PeriodicInner {
            state: StateCell::new(TaskState::Stopped as u8),
            name: Mutex::new(String::from("periodic-task")),
            callback: Mutex::new(None),
            period: Mutex::new(None),
            event_loop: event_loop.clone(),
            strand: Mutex::new(None),
            compensate: AtomicBool::new(false),
            task: Mutex::new(None),
            callback_tid: Mutex::new(None),
            stats: Mutex::new(CallStats::new(clock::steady_now())),
        });
        Self { inner }
    }

    /// Name used in log lines. Only legal while stopped.
    pub fn set_name(&self, name: impl Into<String>) -> Result<(), TaskError> {
        self.ensure_stopped("set_name")?;
        *self.inner.name.lock() = name.into();
        Ok(())
    }

    /// Install the callback. May only be set once, while stopped.
    pub fn set_callback<F: Fn() + Send + Sync + 'static>(&self, callback: F) -> Result<(), TaskError> {
        self.ensure_stopped("set_callback")?;
        let mut slot = self.inner.callback.lock();
        if slot.is_some() {
            return Err(TaskError::State("callback already set".into()));
        }
        *slot = Some(Arc::new(callback));
        Ok(())
    }

    /// Set the period. Only legal while stopped.
    pub fn set_period(&self, period: Duration) -> Result<(), TaskError> {
        self.ensure_stopped("set_period")?;
        *self.inner.period.lock() = Some(period);
        Ok(())
    }

    /// Set the period in signed microseconds; negatives are rejected.
    pub fn set_period_us(&self, us: i64) -> Result<(), TaskError> {
        let period = clock::duration_from_us(us).map_err(|e| TaskError::Config(e.to_string()))?;
        self.set_period(period)
    }

    /// Route callback dispatch through `strand` (None restores the
    /// plain event loop). Only legal while stopped.
    pub fn set_strand(&self, strand: Option<Strand>) -> Result<(), TaskError> {
        self.ensure_stopped("set_strand")?;
        *self.inner.strand.lock() = strand;
        Ok(())
    }

    /// Subtract the callback's own run time from the next delay.
    /// Only legal while stopped.
    pub fn set_compensate_callback_time(&self, enable: bool) -> Result<(), TaskError> {
        self.ensure_stopped("set_compensate_callback_time")?;
        self.inner.compensate.store(enable, Ordering::SeqCst);
        Ok(())
    }

    /// Start the task. First run after the period, or immediately when
    /// `immediate`. No-op if already running or called from inside the
    /// callback itself.
    pub fn start(&self, immediate: bool) -> Result<(), TaskError> {
        if self.inner.callback.lock().is_none() {
            return Err(TaskError::State(
                "periodic task cannot start without a callback".into(),
            ));
        }
        let Some(period) = *self.inner.period.lock() else {
            return Err(TaskError::State(
                "periodic task cannot start without a period".into(),
            ));
        };

        // called from inside our own callback: just return
        if self.called_from_callback() {
            return Ok(());
        }

        // finish a pending async stop so the task can restart; a task
        // that is actually running stays untouched
        if self.inner.current() == TaskState::Stopping {
            self.stop();
        }

        if !self.inner.cas(TaskState::Stopped, TaskState::Starting) {
            log::debug!("periodic task '{}' already started", self.inner.name.lock());
            return Ok(());
        }
        if !self.inner.cas(TaskState::Starting, TaskState::Rescheduling) {
            log::error!(
                "periodic task '{}' internal error while starting",
                self.inner.name.lock()
            );
        }
        PeriodicInner::reschedule(&self.inner, if immediate { Duration::ZERO } else { period });
        Ok(())
    }

    /// Request stop without waiting for the callback to finish.
    pub fn async_stop(&self) {
        if self.inner.cas(TaskState::Stopped, TaskState::Stopped) {
            return;
        }
        // only Scheduled and Running may move to Stopping; other states
        // are transient and resolve shortly
        loop {
            if self.inner.cas(TaskState::Scheduled, TaskState::Stopping)
                || self.inner.cas(TaskState::Running, TaskState::Stopping)
                || self.inner.cas(TaskState::Stopped, TaskState::Stopped)
                || self.inner.cas(TaskState::Stopping, TaskState::Stopping)
            {
                break;
            }
            std::thread::yield_now();
        }
        // the callback is no longer allowed to touch the slot, so the
        // pending future (if any) can simply be cancelled
        let task = self.inner.task.lock().clone();
        if let Some(task) = task {
            task.cancel();
        }
    }

    /// Stop and wait until the task is fully stopped. Returns without
    /// waiting when called from inside the callback itself. The task
    /// can be started again afterwards.
    pub fn stop(&self) {
        self.async_stop();
        if self.called_from_callback() {
            return;
        }
        let task = self.inner.task.lock().clone();
        if let Some(task) = task {
            task.wait();
        }

        // state is Stopping (callback aborted) or already Stopped;
        // normalize so the task is restartable
        if !self.inner.cas(TaskState::Stopping, TaskState::Stopped)
            && !self.inner.cas(TaskState::Stopped, TaskState::Stopped)
        {
            log::error!(
                "periodic task '{}' inconsistency: expected stopped, got {:?}",
                self.inner.name.lock(),
                self.inner.current()
            );
        }
    }

    /// Make the next scheduled run fire now. Only acts when the task is
    /// currently `Scheduled`; in every other state this is a no-op.
    /// Lock-free: nothing here blocks.
    pub fn trigger(&self) {
        loop {
            let state = self.inner.current();
            match state {
                TaskState::Stopped
                | TaskState::Stopping
                | TaskState::Starting
                | TaskState::Running
                | TaskState::Rescheduling
                | TaskState::Triggering
                | TaskState::TriggerReady => return,
                TaskState::Scheduled => {
                    if !self.inner.cas(TaskState::Scheduled, TaskState::Triggering) {
                        continue;
                    }
                    // Triggering grants exclusive access to the slot
                    let task = self.inner.task.lock().clone();
                    if let Some(task) = task {
                        task.cancel();
                        let inner = Arc::clone(&self.inner);
                        task.connect(CallbackMode::Sync, move |future| {
                            PeriodicInner::on_trigger_complete(&inner, &future);
                        });
                    }
                    self.inner.cas(TaskState::Triggering, TaskState::TriggerReady);
                    return;
                }
            }
        }
    }

    /// True unless the task is stopped or stopping.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !matches!(
            self.inner.current(),
            TaskState::Stopped | TaskState::Stopping
        )
    }

    /// True while the task is stopped or stopping.
    #[must_use]
    pub fn is_stopping(&self) -> bool {
        matches!(
            self.inner.current(),
            TaskState::Stopped | TaskState::Stopping
        )
    }

    fn called_from_callback(&self) -> bool {
        *self.inner.callback_tid.lock() == Some(std::thread::current().id())
    }

    fn ensure_stopped(&self, op: &str) -> Result<(), TaskError> {
        if self.inner.current() == TaskState::Stopped {
            Ok(())
        } else {
            Err(TaskError::State(format!("{op} requires a stopped task")))
        }
    }
}

impl PeriodicInner {
    fn current(&self) -> TaskState {
        TaskState::from_u8(self.state.get())
    }

    fn cas(&self, from: TaskState, to: TaskState) -> bool {
        self.state.set_if_equals(from as u8, to as u8)
    }

    /// Persist until one of the transitions applies: a bounded spin,
    /// then 1 ms back-off rounds with a warning. Never gives up.
    fn force_transition(&self, pairs: &[(TaskState, TaskState)]) {
        let try_all = || pairs.iter().any(|(from, to)| self.cas(*from, *to));

        for _ in 0..SPIN_ROUNDS {
            if try_all() {
                return;
            }
        }
        loop {
            for _ in 0..SPIN_ROUNDS {
                if try_all() {
                    return;
                }
                std::thread::sleep(SPIN_BACKOFF);
            }
            log::warn!(
                "periodic task '{}' is stuck transitioning {:?}, state {:?}",
                self.name.lock(),
                pairs,
                self.current()
            );
        }
    }

    /// Schedule the next run. Caller must own the `Rescheduling` state.
    fn reschedule(inner: &Arc<PeriodicInner>, delay: Duration) {
        log::debug!(
            "periodic task '{}' rescheduling in {:?}",
            inner.name.lock(),
            delay
        );
        let strand = inner.strand.lock().clone();
        let wrap_inner = Arc::clone(inner);
        let run = move || PeriodicInner::run_once(&wrap_inner);
        let future = match strand {
            Some(strand) => strand.schedule(delay, run),
            None => inner.event_loop.schedule(delay, run),
        };
        *inner.task.lock() = Some(future);
        if !inner.cas(TaskState::Rescheduling, TaskState::Scheduled) {
            log::error!(
                "periodic task '{}' forbidden state change while rescheduling: {:?}",
                inner.name.lock(),
                inner.current()
            );
        }
    }

    /// Completion handler installed by `trigger()` on the cancelled
    /// scheduled future.
    fn on_trigger_complete(inner: &Arc<PeriodicInner>, future: &Future<()>) {
        // not cancelled: the run already happened, nothing to re-fire
        if !future.is_cancelled() {
            return;
        }
        if inner.cas(TaskState::Triggering, TaskState::Rescheduling)
            || inner.cas(TaskState::TriggerReady, TaskState::Rescheduling)
        {
            Self::reschedule(inner, Duration::ZERO);
        }
    }

    /// One callback invocation plus the follow-up transition dance.
    fn run_once(inner: &Arc<PeriodicInner>) {
        if inner.current() == TaskState::Stopped {
            log::error!(
                "periodic task '{}' inconsistency: stopped from callback",
                inner.name.lock()
            );
        }
        // any other thread touching our state may only be stopping us
        if inner.cas(TaskState::Stopping, TaskState::Stopped) {
            return;
        }
        // reschedule() may still be finishing; the slot is protected
        // until the state leaves Rescheduling
        while inner.current() == TaskState::Rescheduling {
            std::thread::yield_now();
        }
        // check Scheduled first: the state can leave Triggering for
        // Running but never the other way around
        let claimed = inner.cas(TaskState::Scheduled, TaskState::Running)
            || matches!(
                inner.current(),
                TaskState::Triggering | TaskState::TriggerReady
            );
        if !claimed {
            inner.force_transition(&[(TaskState::Stopping, TaskState::Stopped)]);
            return;
        }

        let compensate = inner.compensate.load(Ordering::SeqCst);
        let callback = inner.callback.lock().clone();
        let Some(callback) = callback else {
            // unreachable through the public API; treat as a fault
            inner.force_transition(&[
                (TaskState::Stopping, TaskState::Stopped),
                (TaskState::Running, TaskState::Stopped),
                (TaskState::TriggerReady, TaskState::Stopped),
            ]);
            return;
        };

        let start = Instant::now();
        let (user_before, sys_before) = thread_cpu_times_us();
        *inner.callback_tid.lock() = Some(std::thread::current().id());
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback()));
        *inner.callback_tid.lock() = None;
        let delta = start.elapsed();
        let (user_after, sys_after) = thread_cpu_times_us();

        if let Err(payload) = outcome {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::info!(
                "panic in periodic task '{}': {message}",
                inner.name.lock()
            );
            inner.force_transition(&[
                (TaskState::Stopping, TaskState::Stopped),
                (TaskState::Running, TaskState::Stopped),
                (TaskState::TriggerReady, TaskState::Stopped),
            ]);
            return;
        }

        inner.record_run(delta, user_after - user_before, sys_after - sys_before);

        // trigger() is mid-ladder; wait for it to release the slot
        while inner.current() == TaskState::Triggering {
            std::thread::yield_now();
        }

        if !inner.cas(TaskState::Running, TaskState::Rescheduling)
            && !inner.cas(TaskState::TriggerReady, TaskState::Rescheduling)
        {
            // someone switched us to stopping
            inner.force_transition(&[(TaskState::Stopping, TaskState::Stopped)]);
            return;
        }

        let period = inner.period.lock().unwrap_or(Duration::ZERO);
        let next = if compensate {
            period.saturating_sub(delta)
        } else {
            period
        };
        Self::reschedule(inner, next);
    }

    fn record_run(&self, wall: Duration, user_us: i64, sys_us: i64) {
        let now = clock::steady_now();
        let mut stats = self.stats.lock();
        stats.push(
            wall.as_secs_f32(),
            user_us as f32 / 1e6,
            sys_us as f32 / 1e6,
        );
        if stats.window_elapsed(now, STATS_WINDOW) {
            log::info!("stats.{}: {}", self.name.lock(), stats.report_line(now));
            stats.reset(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_task(event_loop: &EventLoop, period: Duration) -> (PeriodicTask, Arc<AtomicUsize>) {
        let task = PeriodicTask::new(event_loop);
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);
        task.set_name("counting").unwrap();
        task.set_callback(move || {
            count2.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        task.set_period(period).unwrap();
        (task, count)
    }

    #[test]
    fn immediate_start_runs_repeatedly() {
        let event_loop = EventLoop::new(2);
        let (task, count) = counting_task(&event_loop, Duration::from_millis(20));

        task.start(true).unwrap();
        assert!(task.is_running());
        std::thread::sleep(Duration::from_millis(150));
        task.stop();

        assert!(count.load(Ordering::SeqCst) >= 3);
        event_loop.shutdown();
    }

    #[test]
    fn non_immediate_start_waits_one_period() {
        let event_loop = EventLoop::new(2);
        let (task, count) = counting_task(&event_loop, Duration::from_millis(120));

        task.start(false).unwrap();
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        std::thread::sleep(Duration::from_millis(150));
        assert!(count.load(Ordering::SeqCst) >= 1);

        task.stop();
        event_loop.shutdown();
    }

    #[test]
    fn stop_halts_callbacks_and_restart_resumes() {
        let event_loop = EventLoop::new(2);
        let (task, count) = counting_task(&event_loop, Duration::from_millis(15));

        task.start(true).unwrap();
        std::thread::sleep(Duration::from_millis(80));
        task.stop();
        assert!(!task.is_running());

        let frozen = count.load(Ordering::SeqCst);
        assert!(frozen >= 1);
        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(count.load(Ordering::SeqCst), frozen);

        // restartable after stop
        task.start(true).unwrap();
        std::thread::sleep(Duration::from_millis(60));
        task.stop();
        assert!(count.load(Ordering::SeqCst) > frozen);
        event_loop.shutdown();
    }

    #[test]
    fn double_start_is_noop() {
        let event_loop = EventLoop::new(2);
        let (task, count) = counting_task(&event_loop, Duration::from_millis(20));

        task.start(true).unwrap();
        task.start(true).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        task.stop();

        // a second start must not double the cadence
        let seen = count.load(Ordering::SeqCst);
        assert!(seen >= 1 && seen <= 4, "unexpected count {seen}");
        event_loop.shutdown();
    }

    #[test]
    fn trigger_fires_scheduled_run_early() {
        let event_loop = EventLoop::new(2);
        let (task, count) = counting_task(&event_loop, Duration::from_secs(10));

        task.start(false).unwrap();
        std::thread::sleep(Duration::from_millis(30));
        task.trigger();

        // triggered run lands well before the 10s period
        let deadline = Instant::now() + Duration::from_secs(1);
        while count.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // and the follow-up run is back on the period, not immediate
        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        task.stop();
        event_loop.shutdown();
    }

    #[test]
    fn trigger_before_start_is_noop() {
        let event_loop = EventLoop::new(2);
        let (task, count) = counting_task(&event_loop, Duration::from_secs(10));
        task.trigger();
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        event_loop.shutdown();
    }

    #[test]
    fn panicking_callback_aborts_to_stopped() {
        let event_loop = EventLoop::new(2);
        let task = PeriodicTask::new(&event_loop);
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);
        task.set_callback(move || {
            if count2.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                panic!("third run fails");
            }
        })
        .unwrap();
        task.set_period(Duration::from_millis(10)).unwrap();

        task.start(true).unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while task.is_running() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(!task.is_running());
        assert_eq!(count.load(Ordering::SeqCst), 3);

        // subsequent start succeeds
        task.start(true).unwrap();
        std::thread::sleep(Duration::from_millis(40));
        assert!(count.load(Ordering::SeqCst) > 3);
        task.stop();
        event_loop.shutdown();
    }

    #[test]
    fn stop_from_inside_callback_does_not_deadlock() {
        let event_loop = EventLoop::new(2);
        let task = PeriodicTask::new(&event_loop);
        let handle = task.clone();
        let stopped_inside = Arc::new(AtomicBool::new(false));
        let stopped_inside2 = Arc::clone(&stopped_inside);
        task.set_callback(move || {
            handle.stop();
            stopped_inside2.store(true, Ordering::SeqCst);
        })
        .unwrap();
        task.set_period(Duration::from_millis(10)).unwrap();

        task.start(true).unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while !stopped_inside.load(Ordering::SeqCst) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(stopped_inside.load(Ordering::SeqCst));

        // the self-stop took effect
        let deadline = Instant::now() + Duration::from_secs(2);
        while task.is_running() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(!task.is_running());
        event_loop.shutdown();
    }

    #[test]
    fn configuration_requires_stopped_state() {
        let event_loop = EventLoop::new(2);
        let (task, _count) = counting_task(&event_loop, Duration::from_millis(50));

        task.start(true).unwrap();
        assert!(task.set_period(Duration::from_millis(10)).is_err());
        assert!(task.set_name("renamed").is_err());
        assert!(task.set_compensate_callback_time(true).is_err());
        task.stop();
        assert!(task.set_period(Duration::from_millis(10)).is_ok());
        event_loop.shutdown();
    }

    #[test]
    fn callback_is_set_once() {
        let event_loop = EventLoop::new(1);
        let task = PeriodicTask::new(&event_loop);
        task.set_callback(|| {}).unwrap();
        assert!(task.set_callback(|| {}).is_err());
        event_loop.shutdown();
    }

    #[test]
    fn negative_period_rejected() {
        let event_loop = EventLoop::new(1);
        let task = PeriodicTask::new(&event_loop);
        assert!(matches!(task.set_period_us(-5), Err(TaskError::Config(_))));
        assert!(task.set_period_us(5000).is_ok());
        event_loop.shutdown();
    }

    #[test]
    fn start_without_configuration_fails() {
        let event_loop = EventLoop::new(1);
        let task = PeriodicTask::new(&event_loop);
        assert!(matches!(task.start(true), Err(TaskError::State(_))));
        task.set_callback(|| {}).unwrap();
        assert!(matches!(task.start(true), Err(TaskError::State(_))));
        event_loop.shutdown();
    }

    #[test]
    fn runs_on_strand_when_configured() {
        let event_loop = EventLoop::new(4);
        let strand = Strand::new(event_loop.clone());
        let (task, count) = counting_task(&event_loop, Duration::from_millis(15));
        task.set_strand(Some(strand)).unwrap();

        task.start(true).unwrap();
        std::thread::sleep(Duration::from_millis(80));
        task.stop();
        assert!(count.load(Ordering::SeqCst) >= 2);
        event_loop.shutdown();
    }

    #[test]
    fn concurrent_start_stop_trigger_ends_stopped() {
        let event_loop = EventLoop::new(4);
        let (task, _count) = counting_task(&event_loop, Duration::from_millis(5));

        let mut handles = Vec::new();
        for i in 0..4 {
            let task = task.clone();
            handles.push(std::thread::spawn(move || {
                for j in 0..25 {
                    match (i + j) % 3 {
                        0 => {
                            let _ = task.start(j % 2 == 0);
                        }
                        1 => task.trigger(),
                        _ => task.async_stop(),
                    }
                    std::thread::sleep(Duration::from_millis(1));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        task.stop();
        assert!(!task.is_running());
        event_loop.shutdown();
    }
}
