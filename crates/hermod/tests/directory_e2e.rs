// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end directory scenarios over a real listener.
//!
//! Boots a master on an ephemeral TCP port and drives it through the
//! wire client, the way external endpoints do.

use std::sync::Arc;

use hermod::directory::{MasterClient, ServiceDirectory};
use hermod::rpc::Dispatcher;
use hermod::transport::{listen, ListenOptions, TransportServer, Url};

struct Master {
    server: TransportServer,
    directory: ServiceDirectory,
}

impl Master {
    fn boot() -> Self {
        let url: Url = "tcp://127.0.0.1:0".parse().unwrap();
        let directory = ServiceDirectory::new(&url);
        let dispatcher = Arc::new(Dispatcher::new());
        directory.bind(&dispatcher);
        let server = listen(&url, dispatcher, ListenOptions::default()).unwrap();
        Self { server, directory }
    }

    fn client(&self) -> MasterClient {
        MasterClient::connect(self.server.local_url()).unwrap()
    }
}

impl Drop for Master {
    fn drop(&mut self) {
        self.server.shutdown();
    }
}

#[test]
fn master_is_initialized_and_self_registered() {
    let master = Master::boot();
    let client = master.client();

    assert!(client.is_initialized().unwrap());

    // the master's own methods are discoverable like any service
    let services = client.list_services().unwrap();
    assert!(services.contains_key("master.locateService::(ss)"));
    assert!(services
        .values()
        .all(|owner| owner == master.directory.endpoint_id()));
}

#[test]
fn two_endpoints_same_machine_prefer_ipc() {
    let master = Master::boot();
    let client = master.client();

    client.register_machine("host-a", "m1", "1.2.3.4", 0).unwrap();
    client
        .register_endpoint(0, "e1", "e1", "ctx-1", "m1", 10, 1000)
        .unwrap();
    client
        .register_endpoint(0, "e2", "e2", "ctx-2", "m1", 11, 2000)
        .unwrap();
    client.register_service("svc1::f()", "e2").unwrap();

    let address = client.locate_service("svc1::f()", "e1").unwrap();
    assert_eq!(address, "ipc:///tmp/e2");
}

#[test]
fn different_machines_use_public_tcp() {
    let master = Master::boot();
    let client = master.client();

    client.register_machine("host-a", "m1", "1.2.3.4", 0).unwrap();
    client.register_machine("host-b", "m2", "5.6.7.8", 0).unwrap();
    client
        .register_endpoint(0, "e1", "e1", "ctx-1", "m1", 10, 1000)
        .unwrap();
    client
        .register_endpoint(0, "e2", "e2", "ctx-2", "m2", 11, 3000)
        .unwrap();
    client.register_service("svc::f()", "e2").unwrap();

    let address = client.locate_service("svc::f()", "e1").unwrap();
    assert_eq!(address, "tcp://5.6.7.8:3000");
}

#[test]
fn shared_context_prefers_inproc() {
    let master = Master::boot();
    let client = master.client();

    client.register_machine("host-a", "m1", "1.2.3.4", 0).unwrap();
    client
        .register_endpoint(0, "e1", "e1", "shared-ctx", "m1", 10, 1000)
        .unwrap();
    client
        .register_endpoint(0, "e2", "e2", "shared-ctx", "m1", 11, 2000)
        .unwrap();
    client.register_service("svc::f()", "e2").unwrap();

    let address = client.locate_service("svc::f()", "e1").unwrap();
    assert_eq!(address, "inproc://e2");
}

#[test]
fn cascading_unregister_removes_bindings() {
    let master = Master::boot();
    let client = master.client();

    client.register_machine("host-a", "m1", "1.2.3.4", 0).unwrap();
    let endpoints_before = client.list_endpoints().unwrap();

    client
        .register_endpoint(0, "e1", "e1", "ctx", "m1", 10, 1000)
        .unwrap();
    client.register_service("s1::f()", "e1").unwrap();
    client.register_topic("t1", "e1").unwrap();
    assert!(client.topic_exists("t1").unwrap());

    client.unregister_endpoint("e1").unwrap();

    assert_eq!(client.list_endpoints().unwrap(), endpoints_before);
    assert!(!client.list_services().unwrap().contains_key("s1::f()"));
    assert!(!client.topic_exists("t1").unwrap());
}

#[test]
fn duplicate_service_keeps_first_owner() {
    let master = Master::boot();
    let client = master.client();

    client.register_machine("host-a", "m1", "1.2.3.4", 0).unwrap();
    client.register_machine("host-b", "m2", "5.6.7.8", 0).unwrap();
    client
        .register_endpoint(0, "a", "a", "ctx-a", "m1", 10, 1111)
        .unwrap();
    client
        .register_endpoint(0, "b", "b", "ctx-b", "m1", 11, 2222)
        .unwrap();
    client
        .register_endpoint(0, "viewer", "viewer", "ctx-v", "m2", 12, 3333)
        .unwrap();

    client.register_service("svc::f()", "a").unwrap();
    // second registration is rejected but not raised across the wire
    client.register_service("svc::f()", "b").unwrap();
    // same-owner re-registration is idempotent success
    client.register_service("svc::f()", "a").unwrap();

    assert_eq!(client.list_services().unwrap()["svc::f()"], "a");
    // viewer is on another machine: route goes to a's public tcp
    let address = client.locate_service("svc::f()", "viewer").unwrap();
    assert_eq!(address, "tcp://1.2.3.4:1111");
}

#[test]
fn locate_unknown_service_returns_empty_without_error() {
    let master = Master::boot();
    let client = master.client();

    assert_eq!(client.locate_service("nope", "anyid").unwrap(), "");
    assert_eq!(client.locate_topic("nope", "anyid").unwrap(), "");
}

#[test]
fn register_endpoint_with_unknown_machine_is_an_error_value() {
    let master = Master::boot();
    let client = master.client();

    let result = client.register_endpoint(0, "e1", "e1", "ctx", "no-such-machine", 10, 1000);
    match result {
        Err(hermod::directory::ClientError::Remote(message)) => {
            assert!(message.contains("unknown machine"));
        }
        other => panic!("expected remote error, got {other:?}"),
    }

    // the connection survives the error
    assert!(client.is_initialized().unwrap());
}

#[test]
fn list_machine_and_endpoint_flatten_records() {
    let master = Master::boot();
    let client = master.client();

    client.register_machine("host-a", "m1", "1.2.3.4", 7).unwrap();
    client
        .register_endpoint(2, "sensor", "e1", "ctx", "m1", 42, 9000)
        .unwrap();

    let machine = client.list_machine("m1").unwrap();
    assert_eq!(machine["hostName"], "host-a");
    assert_eq!(machine["publicIP"], "1.2.3.4");
    assert_eq!(machine["platformID"], "7");

    let endpoint = client.list_endpoint("e1").unwrap();
    assert_eq!(endpoint["name"], "sensor");
    assert_eq!(endpoint["type"], "publisher");
    assert_eq!(endpoint["machineID"], "m1");
    assert!(endpoint["addresses"].contains("tcp://1.2.3.4:9000"));

    // unknown ids flatten to empty records
    assert!(client.list_machine("ghost").unwrap().is_empty());
    assert!(client.list_endpoint("ghost").unwrap().is_empty());
}

#[test]
fn machines_are_listed_after_upsert() {
    let master = Master::boot();
    let client = master.client();

    client.register_machine("host-a", "m1", "1.2.3.4", 0).unwrap();
    client.register_machine("host-a2", "m1", "4.3.2.1", 0).unwrap();

    let machines = client.list_machines().unwrap();
    assert_eq!(machines.iter().filter(|id| *id == "m1").count(), 1);
    assert_eq!(client.list_machine("m1").unwrap()["publicIP"], "4.3.2.1");
}

#[test]
fn several_clients_share_one_master() {
    let master = Master::boot();
    let registrar = master.client();
    let resolver = master.client();

    registrar
        .register_machine("host-a", "m1", "1.2.3.4", 0)
        .unwrap();
    registrar
        .register_endpoint(0, "e1", "e1", "ctx", "m1", 10, 1000)
        .unwrap();
    registrar.register_service("svc::f()", "e1").unwrap();

    // a second connection observes the registration
    let services = resolver.list_services().unwrap();
    assert_eq!(services["svc::f()"], "e1");
}

#[test]
fn inproc_master_serves_in_process_clients() {
    let url: Url = "inproc://master-e2e".parse().unwrap();
    let directory = ServiceDirectory::new(&url);
    let dispatcher = Arc::new(Dispatcher::new());
    directory.bind(&dispatcher);
    let server = listen(&url, dispatcher, ListenOptions::default()).unwrap();

    let client = MasterClient::connect(&url).unwrap();
    assert!(client.is_initialized().unwrap());
    client.register_machine("here", "m1", "1.2.3.4", 0).unwrap();
    assert!(client.list_machines().unwrap().contains(&"m1".to_string()));

    server.shutdown();
}
