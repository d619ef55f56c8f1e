// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The service directory ("master").
//!
//! The authoritative, in-memory registry of machines, endpoints,
//! services and topics, plus the negotiation logic that picks the best
//! transport between a calling client and a serving endpoint. The
//! directory is self-hosting: on construction it registers an endpoint
//! record for itself and binds its own methods as services, so clients
//! can discover the master the same way they discover anything else.
//!
//! Registry state is ephemeral; nothing survives a restart. There is
//! deliberately no liveness tracking (no TTL, no heartbeat) - a stale
//! endpoint stays registered until it unregisters.

pub mod address;
pub mod client;
pub mod context;
pub mod lookup;

pub use client::{ClientError, MasterClient};
pub use context::{EndpointContext, EndpointKind, MachineContext};
pub use lookup::MutexedLookup;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::rpc::dispatch::{arg_i32, arg_port, arg_str};
use crate::rpc::{DispatchError, Dispatcher};
use crate::transport::{Scheme, Url};

/// Canonical signatures of the master's remotely callable methods.
///
/// The parenthesized group encodes parameter kinds (`s` string,
/// `i` integer) and is validated by the dispatcher.
pub mod signatures {
    pub const REGISTER_MACHINE: &str = "master.registerMachine::(sssi)";
    pub const REGISTER_ENDPOINT: &str = "master.registerEndpoint::(issssii)";
    pub const UNREGISTER_ENDPOINT: &str = "master.unregisterEndpoint::(s)";
    pub const REGISTER_SERVICE: &str = "master.registerService::(ss)";
    pub const REGISTER_TOPIC: &str = "master.registerTopic::(ss)";
    pub const LOCATE_SERVICE: &str = "master.locateService::(ss)";
    pub const LOCATE_TOPIC: &str = "master.locateTopic::(ss)";
    pub const LIST_SERVICES: &str = "master.listServices::()";
    pub const LIST_TOPICS: &str = "master.listTopics::()";
    pub const LIST_MACHINES: &str = "master.listMachines::()";
    pub const LIST_ENDPOINTS: &str = "master.listEndpoints::()";
    pub const LIST_MACHINE: &str = "master.listMachine::(s)";
    pub const LIST_ENDPOINT: &str = "master.listEndpoint::(s)";
    pub const TOPIC_EXISTS: &str = "master.topicExists::(s)";
    pub const IS_INITIALIZED: &str = "master.isInitialized::()";
}

/// Registry operation failures, surfaced as tagged results.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("unknown machine: {0}")]
    UnknownMachine(String),
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),
    #[error("'{name}' is already registered to endpoint {owner}")]
    DuplicateRegistration { name: String, owner: String },
}

struct DirectoryInner {
    // lock order for multi-registry operations:
    // machines -> endpoints -> services -> topics
    machines: MutexedLookup<MachineContext>,
    endpoints: MutexedLookup<EndpointContext>,
    /// method signature -> owning endpoint id
    services: MutexedLookup<String>,
    /// topic name -> owning endpoint id
    topics: MutexedLookup<String>,
    endpoint_id: String,
    initialized: AtomicBool,
}

/// The service directory. Cheap to clone; clones share the registries.
pub struct ServiceDirectory {
    inner: Arc<DirectoryInner>,
}

impl Clone for ServiceDirectory {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ServiceDirectory {
    /// Build the directory, register the local machine and the
    /// directory's own endpoint record.
    #[must_use]
    pub fn new(listen_url: &Url) -> Self {
        let inner = Arc::new(DirectoryInner {
            machines: MutexedLookup::new(),
            endpoints: MutexedLookup::new(),
            services: MutexedLookup::new(),
            topics: MutexedLookup::new(),
            endpoint_id: Uuid::new_v4().to_string(),
            initialized: AtomicBool::new(false),
        });
        let directory = Self { inner };

        let machine_id = Uuid::new_v4().to_string();
        let public_ip = match listen_url.scheme() {
            Scheme::Tcp if listen_url.host() != "0.0.0.0" => listen_url.host().to_string(),
            _ => "127.0.0.1".to_string(),
        };
        directory.register_machine(
            &local_host_name(),
            &machine_id,
            &public_ip,
            local_platform_id(),
        );

        let endpoint_id = directory.inner.endpoint_id.clone();
        if let Err(e) = directory.register_endpoint(
            EndpointKind::Master.as_i32(),
            "master",
            &endpoint_id,
            &Uuid::new_v4().to_string(),
            &machine_id,
            std::process::id() as i32,
            listen_url.port(),
        ) {
            log::error!("master self-registration failed: {e}");
        }

        directory.inner.initialized.store(true, Ordering::SeqCst);
        log::info!("service directory up, endpoint id {endpoint_id}");
        directory
    }

    /// The directory's own endpoint id.
    #[must_use]
    pub fn endpoint_id(&self) -> &str {
        &self.inner.endpoint_id
    }

    /// Upsert a machine record (last writer wins).
    pub fn register_machine(
        &self,
        host_name: &str,
        machine_id: &str,
        public_ip: &str,
        platform_id: i32,
    ) {
        let machine = MachineContext {
            machine_id: machine_id.to_string(),
            host_name: host_name.to_string(),
            public_ip: public_ip.to_string(),
            platform_id,
        };
        let replaced = self.inner.machines.set(machine_id, machine).is_some();
        log::info!(
            "{} machine {machine_id} ({host_name}, {public_ip})",
            if replaced { "updated" } else { "registered" }
        );
    }

    /// Register an endpoint. Its candidate addresses are synthesized
    /// from the machine's public IP. Fails when the machine is unknown.
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
    ) -> Result<(), DirectoryError> {
        let Some(machine) = self.inner.machines.get(machine_id) else {
            log::warn!("endpoint {endpoint_id} references unknown machine {machine_id}");
            return Err(DirectoryError::UnknownMachine(machine_id.to_string()));
        };

        let endpoint = EndpointContext {
            endpoint_id: endpoint_id.to_string(),
            name: name.to_string(),
            kind: EndpointKind::from_i32(kind),
            context_id: context_id.to_string(),
            machine_id: machine_id.to_string(),
            process_id,
            port,
            addresses: address::candidate_addresses(endpoint_id, port, &machine.public_ip),
        };
        self.inner.endpoints.set(endpoint_id, endpoint);
        log::info!("registered endpoint {endpoint_id} ('{name}') on machine {machine_id}");
        Ok(())
    }

    /// Remove an endpoint and everything bound to it.
    pub fn unregister_endpoint(&self, endpoint_id: &str) -> Result<(), DirectoryError> {
        if self.inner.endpoints.remove(endpoint_id).is_none() {
            log::warn!("unregister of unknown endpoint {endpoint_id}");
            return Err(DirectoryError::UnknownEndpoint(endpoint_id.to_string()));
        }
        let services = self
            .inner
            .services
            .filter_remove(|_, owner| owner == endpoint_id);
        let topics = self
            .inner
            .topics
            .filter_remove(|_, owner| owner == endpoint_id);
        log::info!(
            "unregistered endpoint {endpoint_id} ({} services, {} topics dropped)",
            services.len(),
            topics.len()
        );
        Ok(())
    }

    /// Bind a service signature to its serving endpoint. First
    /// registration wins; re-registration by the same endpoint is
    /// idempotent success.
    pub fn register_service(
        &self,
        method_signature: &str,
        endpoint_id: &str,
    ) -> Result<(), DirectoryError> {
        self.register_named(&self.inner.services, "service", method_signature, endpoint_id)
    }

    /// Bind a topic name to its publishing endpoint. Same policy as
    /// services.
    pub fn register_topic(
        &self,
        topic_name: &str,
        endpoint_id: &str,
    ) -> Result<(), DirectoryError> {
        self.register_named(&self.inner.topics, "topic", topic_name, endpoint_id)
    }

    fn register_named(
        &self,
        registry: &MutexedLookup<String>,
        what: &str,
        name: &str,
        endpoint_id: &str,
    ) -> Result<(), DirectoryError> {
        if !self.inner.endpoints.contains(endpoint_id) {
            log::warn!("{what} '{name}' rejected: unknown endpoint {endpoint_id}");
            return Err(DirectoryError::UnknownEndpoint(endpoint_id.to_string()));
        }
        match registry.try_insert(name, endpoint_id.to_string()) {
            None => {
                log::debug!("registered {what} '{name}' -> {endpoint_id}");
                Ok(())
            }
            Some(owner) if owner == endpoint_id => Ok(()),
            Some(owner) => {
                log::warn!(
                    "{what} '{name}' already registered to {owner}, keeping existing owner"
                );
                Err(DirectoryError::DuplicateRegistration {
                    name: name.to_string(),
                    owner,
                })
            }
        }
    }

    /// Best address for `client_endpoint_id` to reach the service.
    /// Empty string means unknown service or no routable address.
    #[must_use]
    pub fn locate_service(&self, method_signature: &str, client_endpoint_id: &str) -> String {
        self.locate_named(&self.inner.services, "service", method_signature, client_endpoint_id)
    }

    /// Best address to reach a topic's publisher. Same contract as
    /// [`Self::locate_service`].
    #[must_use]
    pub fn locate_topic(&self, topic_name: &str, client_endpoint_id: &str) -> String {
        self.locate_named(&self.inner.topics, "topic", topic_name, client_endpoint_id)
    }

    fn locate_named(
        &self,
        registry: &MutexedLookup<String>,
        what: &str,
        name: &str,
        client_endpoint_id: &str,
    ) -> String {
        let Some(owner) = registry.get(name) else {
            log::debug!("locate {what} '{name}': not registered");
            return String::new();
        };
        let Some(server) = self.inner.endpoints.get(&owner) else {
            log::warn!("{what} '{name}' owned by unknown endpoint {owner}");
            return String::new();
        };
        let client = self.inner.endpoints.get(client_endpoint_id);
        match address::negotiate(client.as_ref(), &server) {
            Some(url) => {
                log::debug!("locate {what} '{name}' for {client_endpoint_id}: {url}");
                url.to_string()
            }
            None => {
                log::debug!("locate {what} '{name}': no routable address on {owner}");
                String::new()
            }
        }
    }

    /// Snapshot of signature -> endpoint id.
    #[must_use]
    pub fn list_services(&self) -> BTreeMap<String, String> {
        self.inner.services.snapshot()
    }

    /// Snapshot of topic -> endpoint id.
    #[must_use]
    pub fn list_topics(&self) -> BTreeMap<String, String> {
        self.inner.topics.snapshot()
    }

    /// Registered machine ids.
    #[must_use]
    pub fn list_machines(&self) -> Vec<String> {
        self.inner.machines.snapshot_keys()
    }

    /// Registered endpoint ids.
    #[must_use]
    pub fn list_endpoints(&self) -> Vec<String> {
        self.inner.endpoints.snapshot_keys()
    }

    /// One machine record, flattened to string attributes (empty when
    /// unknown).
    #[must_use]
    pub fn list_machine(&self, machine_id: &str) -> BTreeMap<String, String> {
        self.inner
            .machines
            .get(machine_id)
            .map(|machine| machine.attributes())
            .unwrap_or_default()
    }

    /// One endpoint record, flattened to string attributes (empty when
    /// unknown).
    #[must_use]
    pub fn list_endpoint(&self, endpoint_id: &str) -> BTreeMap<String, String> {
        self.inner
            .endpoints
            .get(endpoint_id)
            .map(|endpoint| endpoint.attributes())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn topic_exists(&self, topic_name: &str) -> bool {
        self.inner.topics.contains(topic_name)
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst)
    }

    /// One-line registry summary for the housekeeping log.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} machines, {} endpoints, {} services, {} topics",
            self.inner.machines.len(),
            self.inner.endpoints.len(),
            self.inner.services.len(),
            self.inner.topics.len()
        )
    }

    /// Bind every public method on `dispatcher` and record each one in
    /// the service registry against the directory's own endpoint.
    pub fn bind(&self, dispatcher: &Dispatcher) {
        let this = self.clone();
        self.bind_method(dispatcher, signatures::REGISTER_MACHINE, move |args| {
            this.register_machine(
                arg_str(args, 0)?,
                arg_str(args, 1)?,
                arg_str(args, 2)?,
                arg_i32(args, 3)?,
            );
            Ok(Value::Null)
        });

        let this = self.clone();
        self.bind_method(dispatcher, signatures::REGISTER_ENDPOINT, move |args| {
            this.register_endpoint(
                arg_i32(args, 0)?,
                arg_str(args, 1)?,
                arg_str(args, 2)?,
                arg_str(args, 3)?,
                arg_str(args, 4)?,
                arg_i32(args, 5)?,
                arg_port(args, 6)?,
            )
            .map_err(|e| DispatchError::Handler(e.to_string()))?;
            Ok(Value::Null)
        });

        let this = self.clone();
        self.bind_method(dispatcher, signatures::UNREGISTER_ENDPOINT, move |args| {
            this.unregister_endpoint(arg_str(args, 0)?)
                .map_err(|e| DispatchError::Handler(e.to_string()))?;
            Ok(Value::Null)
        });

        let this = self.clone();
        self.bind_method(dispatcher, signatures::REGISTER_SERVICE, move |args| {
            // rejections are logged and kept out of the wire: the
            // existing registration simply stays authoritative
            let _ = this.register_service(arg_str(args, 0)?, arg_str(args, 1)?);
            Ok(Value::Null)
        });

        let this = self.clone();
        self.bind_method(dispatcher, signatures::REGISTER_TOPIC, move |args| {
            let _ = this.register_topic(arg_str(args, 0)?, arg_str(args, 1)?);
            Ok(Value::Null)
        });

        let this = self.clone();
        self.bind_method(dispatcher, signatures::LOCATE_SERVICE, move |args| {
            Ok(Value::String(
                this.locate_service(arg_str(args, 0)?, arg_str(args, 1)?),
            ))
        });

        let this = self.clone();
        self.bind_method(dispatcher, signatures::LOCATE_TOPIC, move |args| {
            Ok(Value::String(
                this.locate_topic(arg_str(args, 0)?, arg_str(args, 1)?),
            ))
        });

        let this = self.clone();
        self.bind_method(dispatcher, signatures::LIST_SERVICES, move |_args| {
            Ok(serde_json::to_value(this.list_services()).unwrap_or_default())
        });

        let this = self.clone();
        self.bind_method(dispatcher, signatures::LIST_TOPICS, move |_args| {
            Ok(serde_json::to_value(this.list_topics()).unwrap_or_default())
        });

        let this = self.clone();
        self.bind_method(dispatcher, signatures::LIST_MACHINES, move |_args| {
            Ok(serde_json::to_value(this.list_machines()).unwrap_or_default())
        });

        let this = self.clone();
        self.bind_method(dispatcher, signatures::LIST_ENDPOINTS, move |_args| {
            Ok(serde_json::to_value(this.list_endpoints()).unwrap_or_default())
        });

        let this = self.clone();
        self.bind_method(dispatcher, signatures::LIST_MACHINE, move |args| {
            Ok(serde_json::to_value(this.list_machine(arg_str(args, 0)?)).unwrap_or_default())
        });

        let this = self.clone();
        self.bind_method(dispatcher, signatures::LIST_ENDPOINT, move |args| {
            Ok(serde_json::to_value(this.list_endpoint(arg_str(args, 0)?)).unwrap_or_default())
        });

        let this = self.clone();
        self.bind_method(dispatcher, signatures::TOPIC_EXISTS, move |args| {
            Ok(Value::Bool(this.topic_exists(arg_str(args, 0)?)))
        });

        let this = self.clone();
        self.bind_method(dispatcher, signatures::IS_INITIALIZED, move |_args| {
            Ok(Value::Bool(this.is_initialized()))
        });
    }

    fn bind_method<H>(&self, dispatcher: &Dispatcher, signature: &str, handler: H)
    where
        H: Fn(&[Value]) -> Result<Value, DispatchError> + Send + Sync + 'static,
    {
        dispatcher.register(signature, handler);
        if let Err(e) = self.register_service(signature, &self.inner.endpoint_id) {
            log::error!("failed to self-register '{signature}': {e}");
        }
    }
}

fn local_host_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

fn local_platform_id() -> i32 {
    if cfg!(target_os = "linux") {
        0
    } else if cfg!(target_os = "macos") {
        1
    } else if cfg!(target_os = "windows") {
        2
    } else {
        -1
    }
}
