// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scheduling substrate: clock, event loop, futures, strands and the
//! periodic-task state machine.
//!
//! Everything here runs on plain OS threads. The [`EventLoop`] is the
//! only scheduler in the system; higher layers (the directory server,
//! housekeeping tasks) submit work to it instead of spawning their own
//! timers.

pub mod clock;
pub mod event_loop;
pub mod future;
pub mod periodic;
pub mod state_cell;
pub mod stats;
pub mod strand;

pub use event_loop::EventLoop;
pub use future::{CallbackMode, Future, FutureState, Promise};
pub use periodic::{PeriodicTask, TaskError, TaskState};
pub use state_cell::StateCell;
pub use strand::Strand;
