// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Signature-keyed RPC over framed messages.
//!
//! A request frame carries a method signature and a JSON argument
//! array; the reply carries either a result value or an error message.
//! The [`Dispatcher`] maps signatures to handlers and validates the
//! argument kinds encoded in the signature before invoking one.

pub mod dispatch;
pub mod protocol;

pub use dispatch::{DispatchError, Dispatcher, MethodHandler};
pub use protocol::{decode_message, encode_message, CodecError, RpcMessage};
