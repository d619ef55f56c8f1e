// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Machine and endpoint records held by the directory.

use std::collections::BTreeMap;

use crate::transport::Url;

/// A registered host.
///
/// Identity is `machine_id` (an opaque unique string, typically a
/// UUID). Re-registration from the same id is last-writer-wins on the
/// other fields. Machines are never expired by the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineContext {
    pub machine_id: String,
    pub host_name: String,
    /// Address used when endpoints on this machine are reached from
    /// elsewhere.
    pub public_ip: String,
    pub platform_id: i32,
}

impl MachineContext {
    /// Flatten to string attributes for the wire (`listMachine`).
    #[must_use]
    pub fn attributes(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("machineID".to_string(), self.machine_id.clone()),
            ("hostName".to_string(), self.host_name.clone()),
            ("publicIP".to_string(), self.public_ip.clone()),
            ("platformID".to_string(), self.platform_id.to_string()),
        ])
    }
}

/// Role of an endpoint, with an i32 wire representation.
///
/// Unknown wire values map conservatively to `Server`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum EndpointKind {
    Server = 0,
    Client = 1,
    Publisher = 2,
    Subscriber = 3,
    Forwarder = 4,
    Master = 5,
}

impl EndpointKind {
    #[must_use]
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => EndpointKind::Client,
            2 => EndpointKind::Publisher,
            3 => EndpointKind::Subscriber,
            4 => EndpointKind::Forwarder,
            5 => EndpointKind::Master,
            _ => EndpointKind::Server,
        }
    }

    #[must_use]
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointKind::Server => "server",
            EndpointKind::Client => "client",
            EndpointKind::Publisher => "publisher",
            EndpointKind::Subscriber => "subscriber",
            EndpointKind::Forwarder => "forwarder",
            EndpointKind::Master => "master",
        }
    }
}

/// A registered process, addressable over some transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointContext {
    pub endpoint_id: String,
    pub name: String,
    pub kind: EndpointKind,
    /// Finer grouping than a machine (e.g. a shared address space);
    /// two endpoints with the same context can talk over `inproc://`.
    pub context_id: String,
    pub machine_id: String,
    pub process_id: i32,
    pub port: u16,
    /// Candidate addresses in registration order (see
    /// [`crate::directory::address`]).
    pub addresses: Vec<Url>,
}

impl EndpointContext {
    /// Flatten to string attributes for the wire (`listEndpoint`).
    #[must_use]
    pub fn attributes(&self) -> BTreeMap<String, String> {
        let addresses = self
            .addresses
            .iter()
            .map(Url::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        BTreeMap::from([
            ("endpointID".to_string(), self.endpoint_id.clone()),
            ("name".to_string(), self.name.clone()),
            ("type".to_string(), self.kind.as_str().to_string()),
            ("contextID".to_string(), self.context_id.clone()),
            ("machineID".to_string(), self.machine_id.clone()),
            ("processID".to_string(), self.process_id.to_string()),
            ("port".to_string(), self.port.to_string()),
            ("addresses".to_string(), addresses),
        ])
    }
}
