// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Blocking client for the master's wire methods.
//!
//! One framed connection, one outstanding call at a time. Endpoints
//! use this to register themselves and resolve services; the
//! integration tests drive the whole server through it.

use std::collections::BTreeMap;
use std::io;

use parking_lot::Mutex;
use serde_json::{json, Value};
use thiserror::Error;

use crate::directory::signatures;
use crate::rpc::{decode_message, encode_message, RpcMessage};
use crate::transport::{self, FrameStream, Url};

/// Client-side call failures.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("remote error: {0}")]
    Remote(String),
}

/// Connection to a service directory.
pub struct MasterClient {
    stream: Mutex<Box<dyn FrameStream>>,
}

impl MasterClient {
    /// Connect to the master at `url`.
    pub fn connect(url: &Url) -> Result<Self, ClientError> {
        let stream = transport::connect(url)?;
        Ok(Self {
            stream: Mutex::new(stream),
        })
    }

    /// Raw call: send one framed request, wait for the framed reply.
    pub fn call(&self, signature: &str, args: Vec<Value>) -> Result<Value, ClientError> {
        let request = RpcMessage::Call {
            signature: signature.to_string(),
            args,
        };
        let frame = encode_message(&request).map_err(|e| ClientError::Protocol(e.to_string()))?;

        let mut stream = self.stream.lock();
        stream.send_frame(&frame)?;
        let payload = stream
            .recv_frame()?
            .ok_or_else(|| ClientError::Protocol("connection closed mid-call".to_string()))?;
        drop(stream);

        match decode_message(&payload).map_err(|e| ClientError::Protocol(e.to_string()))? {
            RpcMessage::Reply { result } => Ok(result),
            RpcMessage::Error { message } => Err(ClientError::Remote(message)),
            RpcMessage::Call { .. } => {
                Err(ClientError::Protocol("unexpected call on reply stream".to_string()))
            }
        }
    }

    pub fn register_machine(
        &self,
        host_name: &str,
        machine_id: &str,
        public_ip: &str,
        platform_id: i32,
    ) -> Result<(), ClientError> {
        self.call(
            signatures::REGISTER_MACHINE,
            vec![
                json!(host_name),
                json!(machine_id),
                json!(public_ip),
                json!(platform_id),
            ],
        )
        .map(|_| ())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn register_endpoint(
        &self,
        kind: i32,
        name: &str,
        endpoint_id: &str,
        context_id: &str,
        machine_id: &str,
        process_id: i32,
        port: u16,
    ) -> Result<(), ClientError> {
        self.call(
            signatures::REGISTER_ENDPOINT,
            vec![
                json!(kind),
                json!(name),
                json!(endpoint_id),
                json!(context_id),
                json!(machine_id),
                json!(process_id),
                json!(port),
            ],
        )
        .map(|_| ())
    }

    pub fn unregister_endpoint(&self, endpoint_id: &str) -> Result<(), ClientError> {
        self.call(signatures::UNREGISTER_ENDPOINT, vec![json!(endpoint_id)])
            .map(|_| ())
    }

    pub fn register_service(
        &self,
        method_signature: &str,
        endpoint_id: &str,
    ) -> Result<(), ClientError> {
        self.call(
            signatures::REGISTER_SERVICE,
            vec![json!(method_signature), json!(endpoint_id)],
        )
        .map(|_| ())
    }

    pub fn register_topic(&self, topic_name: &str, endpoint_id: &str) -> Result<(), ClientError> {
        self.call(
            signatures::REGISTER_TOPIC,
            vec![json!(topic_name), json!(endpoint_id)],
        )
        .map(|_| ())
    }

    /// Empty string means "not found or no routable address".
    pub fn locate_service(
        &self,
        method_signature: &str,
        client_endpoint_id: &str,
    ) -> Result<String, ClientError> {
        let result = self.call(
            signatures::LOCATE_SERVICE,
            vec![json!(method_signature), json!(client_endpoint_id)],
        )?;
        expect_string(result)
    }

    pub fn locate_topic(
        &self,
        topic_name: &str,
        client_endpoint_id: &str,
    ) -> Result<String, ClientError> {
        let result = self.call(
            signatures::LOCATE_TOPIC,
            vec![json!(topic_name), json!(client_endpoint_id)],
        )?;
        expect_string(result)
    }

    pub fn list_services(&self) -> Result<BTreeMap<String, String>, ClientError> {
        let result = self.call(signatures::LIST_SERVICES, vec![])?;
        expect_map(result)
    }

    pub fn list_topics(&self) -> Result<BTreeMap<String, String>, ClientError> {
        let result = self.call(signatures::LIST_TOPICS, vec![])?;
        expect_map(result)
    }

    pub fn list_machines(&self) -> Result<Vec<String>, ClientError> {
        let result = self.call(signatures::LIST_MACHINES, vec![])?;
        expect_list(result)
    }

    pub fn list_endpoints(&self) -> Result<Vec<String>, ClientError> {
        let result = self.call(signatures::LIST_ENDPOINTS, vec![])?;
        expect_list(result)
    }

    pub fn list_machine(&self, machine_id: &str) -> Result<BTreeMap<String, String>, ClientError> {
        let result = self.call(signatures::LIST_MACHINE, vec![json!(machine_id)])?;
        expect_map(result)
    }

    pub fn list_endpoint(
        &self,
        endpoint_id: &str,
    ) -> Result<BTreeMap<String, String>, ClientError> {
        let result = self.call(signatures::LIST_ENDPOINT, vec![json!(endpoint_id)])?;
        expect_map(result)
    }

    pub fn topic_exists(&self, topic_name: &str) -> Result<bool, ClientError> {
        let result = self.call(signatures::TOPIC_EXISTS, vec![json!(topic_name)])?;
        expect_bool(result)
    }

    pub fn is_initialized(&self) -> Result<bool, ClientError> {
        let result = self.call(signatures::IS_INITIALIZED, vec![])?;
        expect_bool(result)
    }
}

fn expect_string(value: Value) -> Result<String, ClientError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(ClientError::Protocol(format!(
            "expected string reply, got {other}"
        ))),
    }
}

fn expect_bool(value: Value) -> Result<bool, ClientError> {
    value
        .as_bool()
        .ok_or_else(|| ClientError::Protocol("expected boolean reply".to_string()))
}

fn expect_map(value: Value) -> Result<BTreeMap<String, String>, ClientError> {
    serde_json::from_value(value).map_err(|e| ClientError::Protocol(e.to_string()))
}

fn expect_list(value: Value) -> Result<Vec<String>, ClientError> {
    serde_json::from_value(value).map_err(|e| ClientError::Protocol(e.to_string()))
}
