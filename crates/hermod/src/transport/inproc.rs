// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process transport: named, in-memory duplex frame pipes.
//!
//! `inproc://name` connects endpoints living in the same process
//! without touching a socket. A process-wide registry maps names to
//! listeners; connecting creates a pair of channel-backed streams and
//! hands the server half to the listener's accept queue.

use std::io;

use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::transport::FrameStream;

/// One half of an in-memory duplex pipe.
#[derive(Debug)]
pub struct InprocStream {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

impl FrameStream for InprocStream {
    fn send_frame(&mut self, payload: &[u8]) -> io::Result<()> {
        self.tx
            .send(payload.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "inproc peer closed"))
    }

    fn recv_frame(&mut self) -> io::Result<Option<Vec<u8>>> {
        match self.rx.recv() {
            Ok(payload) => Ok(Some(payload)),
            // peer dropped its sender: clean end-of-stream
            Err(_) => Ok(None),
        }
    }
}

/// Accept side of a bound inproc name.
#[derive(Debug)]
pub struct InprocListener {
    name: String,
    incoming: Receiver<InprocStream>,
}

impl InprocListener {
    /// Block until a peer connects. `None` once the name was unbound
    /// and the backlog drained.
    pub fn accept(&self) -> Option<InprocStream> {
        self.incoming.recv().ok()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for InprocListener {
    fn drop(&mut self) {
        unbind(&self.name);
    }
}

// Process-wide name registry; the whole point of inproc:// is that
// every endpoint in the process can find the listener.
static REGISTRY: Mutex<Vec<(String, Sender<InprocStream>)>> = Mutex::new(Vec::new());

/// Bind `name` and start accepting in-process connections.
pub fn bind(name: &str) -> io::Result<InprocListener> {
    let mut registry = REGISTRY.lock();
    if registry.iter().any(|(bound, _)| bound == name) {
        return Err(io::Error::new(
            io::ErrorKind::AddrInUse,
            format!("inproc://{name} already bound"),
        ));
    }
    let (tx, rx) = unbounded();
    registry.push((name.to_string(), tx));
    log::debug!("inproc: bound '{name}'");
    Ok(InprocListener {
        name: name.to_string(),
        incoming: rx,
    })
}

/// Connect to a bound inproc name.
pub fn connect(name: &str) -> io::Result<InprocStream> {
    let acceptor = {
        let registry = REGISTRY.lock();
        registry
            .iter()
            .find(|(bound, _)| bound == name)
            .map(|(_, tx)| tx.clone())
    };
    let Some(acceptor) = acceptor else {
        return Err(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            format!("inproc://{name} is not bound"),
        ));
    };

    let (client_tx, server_rx) = unbounded();
    let (server_tx, client_rx) = unbounded();
    let server = InprocStream {
        tx: server_tx,
        rx: server_rx,
    };
    acceptor.send(server).map_err(|_| {
        io::Error::new(
            io::ErrorKind::ConnectionRefused,
            format!("inproc://{name} listener is gone"),
        )
    })?;

    Ok(InprocStream {
        tx: client_tx,
        rx: client_rx,
    })
}

fn unbind(name: &str) {
    let mut registry = REGISTRY.lock();
    let before = registry.len();
    registry.retain(|(bound, _)| bound != name);
    if registry.len() < before {
        log::debug!("inproc: unbound '{name}'");
    }
}
