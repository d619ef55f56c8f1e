// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport-address synthesis and negotiation.
//!
//! When an endpoint registers, the directory synthesizes its candidate
//! address list; when a client asks where a service lives, the two
//! endpoint records are ranked deterministically:
//!
//! 1. shared `context_id` -> prefer `inproc://`
//! 2. shared `machine_id` -> prefer `ipc://`, else loopback `tcp://`
//! 3. otherwise -> `tcp://` on the server machine's public IP
//!
//! Ties break on the order the server's addresses were registered.

use crate::directory::context::EndpointContext;
use crate::transport::{Scheme, Url};

/// Candidate addresses for a registering endpoint, most local first.
#[must_use]
pub fn candidate_addresses(endpoint_id: &str, port: u16, public_ip: &str) -> Vec<Url> {
    vec![
        Url::inproc(endpoint_id),
        Url::ipc(format!("/tmp/{endpoint_id}")),
        Url::tcp(public_ip, port),
    ]
}

/// Best address on `server` for `client` to use. `None` when nothing
/// is routable. An unknown client is treated as remote.
#[must_use]
pub fn negotiate(client: Option<&EndpointContext>, server: &EndpointContext) -> Option<Url> {
    if let Some(client) = client {
        if !client.context_id.is_empty() && client.context_id == server.context_id {
            if let Some(url) = first_with_scheme(server, Scheme::Inproc) {
                return Some(url);
            }
        }
        if client.machine_id == server.machine_id {
            if let Some(url) = first_with_scheme(server, Scheme::Ipc) {
                return Some(url);
            }
            return Some(Url::tcp("127.0.0.1", server.port));
        }
    }
    first_with_scheme(server, Scheme::Tcp)
}

fn first_with_scheme(endpoint: &EndpointContext, scheme: Scheme) -> Option<Url> {
    endpoint
        .addresses
        .iter()
        .find(|url| url.scheme() == scheme)
        .cloned()
}
