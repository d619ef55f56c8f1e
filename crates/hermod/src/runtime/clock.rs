// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Monotonic time helpers.
//!
//! All scheduling in hermod is done against the steady clock; wall
//! clock time never enters deadline arithmetic. Durations cross API
//! boundaries as signed microseconds so callers in other languages can
//! express them, and negative values are rejected at the boundary.

use std::time::{Duration, Instant};

use thiserror::Error;

/// Error for out-of-range duration values at API boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClockError {
    /// A negative duration was supplied where only >= 0 makes sense.
    #[error("duration cannot be negative: {0}us")]
    Negative(i64),
}

/// Current instant on the monotonic steady clock.
#[must_use]
pub fn steady_now() -> Instant {
    Instant::now()
}

/// Convert signed microseconds into a `Duration`, rejecting negatives.
pub fn duration_from_us(us: i64) -> Result<Duration, ClockError> {
    if us < 0 {
        return Err(ClockError::Negative(us));
    }
    Ok(Duration::from_micros(us as u64))
}

/// Convert a `Duration` to signed microseconds (saturating at `i64::MAX`).
#[must_use]
pub fn duration_as_us(d: Duration) -> i64 {
    i64::try_from(d.as_micros()).unwrap_or(i64::MAX)
}
