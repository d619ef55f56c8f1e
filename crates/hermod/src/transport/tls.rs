// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TLS wrapping for accepted TCP sockets.
//!
//! The listener only needs "wrap this socket in a server-side
//! handshake"; certificate content is opaque here. Certificates and
//! keys are loaded from PEM files named in the master configuration.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};

use crate::transport::ListenError;

/// Build a rustls server config from PEM cert chain and private key.
pub fn load_server_config(
    cert_path: &str,
    key_path: &str,
) -> Result<Arc<rustls::ServerConfig>, ListenError> {
    let certs = load_certs(cert_path)?;
    let key = load_key(key_path)?;

    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| ListenError::Tls(format!("invalid certificate/key pair: {e}")))?;

    Ok(Arc::new(config))
}

fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>, ListenError> {
    let file = File::open(path)
        .map_err(|e| ListenError::Tls(format!("cannot open certificate {path}: {e}")))?;
    let mut reader = BufReader::new(file);
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut reader)
        .collect::<Result<_, _>>()
        .map_err(|e| ListenError::Tls(format!("cannot parse certificate {path}: {e}")))?;
    if certs.is_empty() {
        return Err(ListenError::Tls(format!("no certificates in {path}")));
    }
    Ok(certs)
}

fn load_key(path: &str) -> Result<PrivateKeyDer<'static>, ListenError> {
    let file =
        File::open(path).map_err(|e| ListenError::Tls(format!("cannot open key {path}: {e}")))?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| ListenError::Tls(format!("cannot parse key {path}: {e}")))?
        .ok_or_else(|| ListenError::Tls(format!("no private key in {path}")))
}
