// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Signature-keyed method dispatch.
//!
//! Handlers implement [`MethodHandler`]; closures taking `&[Value]`
//! get a blanket implementation. Signatures carry their parameter
//! kinds in a trailing `(...)` group (`s` = string, `i` = integer,
//! `b` = bool), which the dispatcher checks before invoking the
//! handler so that handlers can index arguments without re-validating.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use thiserror::Error;

/// Dispatch failures, converted to wire errors by the listener.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    #[error("unknown method: {0}")]
    UnknownMethod(String),
    #[error("bad arguments: {0}")]
    BadArguments(String),
    #[error("{0}")]
    Handler(String),
}

/// A callable bound under a method signature.
pub trait MethodHandler: Send + Sync {
    fn call(&self, args: &[Value]) -> Result<Value, DispatchError>;
}

impl<F> MethodHandler for F
where
    F: Fn(&[Value]) -> Result<Value, DispatchError> + Send + Sync,
{
    fn call(&self, args: &[Value]) -> Result<Value, DispatchError> {
        self(args)
    }
}

/// Thread-safe signature -> handler table.
#[derive(Default)]
pub struct Dispatcher {
    handlers: RwLock<HashMap<String, Arc<dyn MethodHandler>>>,
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a handler. First binding wins; a duplicate is logged and
    /// ignored.
    pub fn register<H: MethodHandler + 'static>(&self, signature: &str, handler: H) {
        let mut handlers = self.handlers.write();
        if handlers.contains_key(signature) {
            log::warn!("dispatch: '{signature}' already bound, keeping existing handler");
            return;
        }
        log::debug!("dispatch: bound '{signature}'");
        handlers.insert(signature.to_string(), Arc::new(handler));
    }

    /// Look up and invoke the handler for `signature`. The handler
    /// runs outside the table lock.
    pub fn dispatch(&self, signature: &str, args: &[Value]) -> Result<Value, DispatchError> {
        let handler = self
            .handlers
            .read()
            .get(signature)
            .cloned()
            .ok_or_else(|| DispatchError::UnknownMethod(signature.to_string()))?;

        check_args(signature, args)?;
        handler.call(args)
    }

    /// Bound signatures, sorted.
    #[must_use]
    pub fn signatures(&self) -> Vec<String> {
        let mut signatures: Vec<String> = self.handlers.read().keys().cloned().collect();
        signatures.sort();
        signatures
    }
}

/// Validate `args` against the parameter kinds declared in the
/// signature's trailing `(...)` group. Signatures without one skip
/// the check.
fn check_args(signature: &str, args: &[Value]) -> Result<(), DispatchError> {
    let Some(spec) = parameter_spec(signature) else {
        return Ok(());
    };

    if spec.len() != args.len() {
        return Err(DispatchError::BadArguments(format!(
            "{signature} expects {} arguments, got {}",
            spec.len(),
            args.len()
        )));
    }
    for (index, (kind, value)) in spec.chars().zip(args).enumerate() {
        let ok = match kind {
            's' => value.is_string(),
            'i' => value.is_i64() || value.is_u64(),
            'b' => value.is_boolean(),
            _ => true,
        };
        if !ok {
            return Err(DispatchError::BadArguments(format!(
                "{signature} argument {index} is not of kind '{kind}'"
            )));
        }
    }
    Ok(())
}

fn parameter_spec(signature: &str) -> Option<&str> {
    let open = signature.rfind('(')?;
    let close = signature.rfind(')')?;
    (close > open).then(|| &signature[open + 1..close])
}

/// Fetch a string argument (already kind-checked by the dispatcher).
pub fn arg_str(args: &[Value], index: usize) -> Result<&str, DispatchError> {
    args.get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| DispatchError::BadArguments(format!("argument {index} must be a string")))
}

/// Fetch an integer argument as i32.
pub fn arg_i32(args: &[Value], index: usize) -> Result<i32, DispatchError> {
    args.get(index)
        .and_then(Value::as_i64)
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| DispatchError::BadArguments(format!("argument {index} must be an i32")))
}

/// Fetch an integer argument as a port number.
pub fn arg_port(args: &[Value], index: usize) -> Result<u16, DispatchError> {
    args.get(index)
        .and_then(Value::as_i64)
        .and_then(|v| u16::try_from(v).ok())
        .ok_or_else(|| DispatchError::BadArguments(format!("argument {index} must be a port")))
}
