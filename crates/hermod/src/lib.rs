// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Hermod - service directory and periodic-task runtime for socket RPC.
//!
//! Hermod is the coordination layer of a distributed messaging system:
//! processes ("endpoints") register themselves with a central directory
//! (the "master"), advertise services and topics, and ask the directory
//! for the best transport address to reach one another.
//!
//! The crate has three layers:
//!
//! - [`runtime`] - the scheduling substrate: a thread-pool event loop
//!   with deadline dispatch, single-assignment futures with cooperative
//!   cancellation, serial strands, and the [`runtime::PeriodicTask`]
//!   state machine that drives all recurring work.
//! - [`directory`] - the registries (machines, endpoints, services,
//!   topics), transport-address negotiation, and the self-hosting
//!   service directory itself.
//! - [`transport`] / [`rpc`] - length-prefixed framed messaging over
//!   `tcp://`, `ipc://` and `inproc://`, and the signature-keyed
//!   dispatcher that turns inbound frames into method calls.
//!
//! The directory server binary lives in the `hermod-master` crate.

pub mod config;
pub mod directory;
pub mod rpc;
pub mod runtime;
pub mod transport;

pub use config::MasterConfig;
pub use directory::{EndpointContext, EndpointKind, MachineContext, ServiceDirectory};
pub use runtime::{CallbackMode, EventLoop, Future, PeriodicTask, Promise, Strand};
pub use transport::{Scheme, Url};
