// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Running call-time statistics for periodic tasks.
//!
//! Each callback run pushes one (wall, user, sys) sample, in seconds.
//! The aggregate is reported and reset on a fixed window (20 s by
//! default, matching the periodic-task report cadence).

use std::time::{Duration, Instant};

/// Min/max/sum over one series of samples.
#[derive(Debug, Clone, Copy)]
pub struct ValueStats {
    min: f32,
    max: f32,
    sum: f32,
}

impl ValueStats {
    fn new() -> Self {
        Self {
            min: f32::MAX,
            max: 0.0,
            sum: 0.0,
        }
    }

    fn push(&mut self, value: f32) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value;
    }

    /// Cumulated value of all samples in the window.
    #[must_use]
    pub fn cumulated(&self) -> f32 {
        self.sum
    }

    /// `avg [min, max]` rendering for the report line.
    #[must_use]
    pub fn summary(&self, count: u32) -> String {
        if count == 0 {
            return "0 [0, 0]".to_string();
        }
        format!(
            "{:.6} [{:.6}, {:.6}]",
            self.sum / count as f32,
            self.min,
            self.max
        )
    }
}

/// Aggregated wall/user/sys call statistics for one task.
#[derive(Debug, Clone)]
pub struct CallStats {
    wall: ValueStats,
    user: ValueStats,
    system: ValueStats,
    count: u32,
    window_start: Instant,
}

impl CallStats {
    #[must_use]
    pub fn new(now: Instant) -> Self {
        Self {
            wall: ValueStats::new(),
            user: ValueStats::new(),
            system: ValueStats::new(),
            count: 0,
            window_start: now,
        }
    }

    /// Record one callback run (all values in seconds).
    pub fn push(&mut self, wall: f32, user: f32, system: f32) {
        self.wall.push(wall);
        self.user.push(user);
        self.system.push(system);
        self.count += 1;
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// True once the report window has elapsed.
    #[must_use]
    pub fn window_elapsed(&self, now: Instant, window: Duration) -> bool {
        now.duration_since(self.window_start) >= window
    }

    /// One-line aggregate: cpu%, count, then wall/user/sys summaries.
    #[must_use]
    pub fn report_line(&self, now: Instant) -> String {
        let window_secs = now.duration_since(self.window_start).as_secs_f32().max(f32::MIN_POSITIVE);
        format!(
            "{:.1}%  {}  {}  {}  {}",
            self.user.cumulated() * 100.0 / window_secs,
            self.count,
            self.wall.summary(self.count),
            self.user.summary(self.count),
            self.system.summary(self.count),
        )
    }

    /// Start a fresh window.
    pub fn reset(&mut self, now: Instant) {
        *self = Self::new(now);
    }
}

/// Per-thread (user, sys) CPU time in microseconds.
#[cfg(target_os = "linux")]
#[must_use]
pub fn thread_cpu_times_us() -> (i64, i64) {
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::getrusage(libc::RUSAGE_THREAD, &mut usage) };
    if rc != 0 {
        return (0, 0);
    }
    let user = usage.ru_utime.tv_sec as i64 * 1_000_000 + usage.ru_utime.tv_usec as i64;
    let system = usage.ru_stime.tv_sec as i64 * 1_000_000 + usage.ru_stime.tv_usec as i64;
    (user, system)
}

/// Fallback for platforms without per-thread rusage.
#[cfg(not(target_os = "linux"))]
#[must_use]
pub fn thread_cpu_times_us() -> (i64, i64) {
    (0, 0)
}
