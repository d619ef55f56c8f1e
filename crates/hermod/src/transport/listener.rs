// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multi-connection transport listener.
//!
//! Accepts connections on a `tcp://`, `ipc://` or `inproc://` URL and
//! serves each one on its own thread: read a framed call, dispatch it,
//! write the framed reply. Dispatch and protocol failures become wire
//! `error` messages; I/O failures close the offending connection and
//! are logged - neither ever tears down the listener.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use thiserror::Error;

use crate::rpc::{decode_message, encode_message, Dispatcher, RpcMessage};
use crate::transport::frame_codec::DEFAULT_MAX_MESSAGE_SIZE;
use crate::transport::{inproc, FrameStream, Scheme, SocketFrameStream, Url};

/// Listener startup failures.
#[derive(Debug, Error)]
pub enum ListenError {
    #[error("bind failed on {url}: {reason}")]
    Bind { url: String, reason: String },
    #[error("unsupported listen scheme on this platform: {0}")]
    Unsupported(String),
    #[cfg(feature = "tls")]
    #[error("tls setup failed: {0}")]
    Tls(String),
}

/// Listener tuning knobs.
pub struct ListenOptions {
    /// Reject frames larger than this (anti-OOM guard).
    pub max_message_size: usize,
    /// Wrap accepted TCP sockets in a TLS server session.
    #[cfg(feature = "tls")]
    pub tls: Option<Arc<rustls::ServerConfig>>,
}

impl Default for ListenOptions {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            #[cfg(feature = "tls")]
            tls: None,
        }
    }
}

/// Call counters for one listener.
#[derive(Debug, Default)]
pub struct ListenerMetrics {
    connections_accepted: AtomicU64,
    calls_dispatched: AtomicU64,
    wire_errors: AtomicU64,
}

impl ListenerMetrics {
    fn record_connection(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    fn record_call(&self) {
        self.calls_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    fn record_error(&self) {
        self.wire_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn connections_accepted(&self) -> u64 {
        self.connections_accepted.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn calls_dispatched(&self) -> u64 {
        self.calls_dispatched.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn wire_errors(&self) -> u64 {
        self.wire_errors.load(Ordering::Relaxed)
    }
}

/// A running listener.
#[derive(Debug)]
pub struct TransportServer {
    local: Url,
    running: Arc<AtomicBool>,
    accept_thread: Mutex<Option<JoinHandle<()>>>,
    metrics: Arc<ListenerMetrics>,
}

impl TransportServer {
    /// The bound address; ephemeral TCP ports are resolved here.
    #[must_use]
    pub fn local_url(&self) -> &Url {
        &self.local
    }

    #[must_use]
    pub fn metrics(&self) -> &ListenerMetrics {
        &self.metrics
    }

    /// Shared handle to the counters, for reporters that outlive a
    /// borrow of the server.
    #[must_use]
    pub fn metrics_handle(&self) -> Arc<ListenerMetrics> {
        Arc::clone(&self.metrics)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Block until the accept loop exits.
    pub fn join(&self) {
        let handle = self.accept_thread.lock().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    /// Stop accepting and join the accept loop. Existing connections
    /// drain on their own threads.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        // poke the blocking accept so the loop observes the flag
        let _ = crate::transport::connect(&self.local);
        self.join();
        if self.local.scheme() == Scheme::Ipc {
            let _ = std::fs::remove_file(self.local.host());
        }
        log::info!("listener on {} stopped", self.local);
    }
}

/// Bind `url` and serve `dispatcher` on it.
pub fn listen(
    url: &Url,
    dispatcher: Arc<Dispatcher>,
    options: ListenOptions,
) -> Result<TransportServer, ListenError> {
    let running = Arc::new(AtomicBool::new(true));
    let metrics = Arc::new(ListenerMetrics::default());

    match url.scheme() {
        Scheme::Tcp => {
            let listener = std::net::TcpListener::bind((url.host(), url.port())).map_err(|e| {
                ListenError::Bind {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            })?;
            let local = match listener.local_addr() {
                Ok(addr) => url.with_port(addr.port()),
                Err(_) => url.clone(),
            };
            log::info!("listening on {local}");

            #[cfg(feature = "tls")]
            let tls = options.tls.clone();
            let max = options.max_message_size;
            let accept_running = Arc::clone(&running);
            let accept_metrics = Arc::clone(&metrics);
            let handle = spawn_accept_thread(move || {
                for incoming in listener.incoming() {
                    if !accept_running.load(Ordering::SeqCst) {
                        break;
                    }
                    match incoming {
                        Ok(stream) => {
                            let peer = stream
                                .peer_addr()
                                .map(|a| a.to_string())
                                .unwrap_or_else(|_| "unknown".to_string());
                            let _ = stream.set_nodelay(true);

                            #[cfg(feature = "tls")]
                            let framed: Box<dyn FrameStream> = if let Some(config) = &tls {
                                match rustls::ServerConnection::new(Arc::clone(config)) {
                                    Ok(session) => Box::new(SocketFrameStream::new(
                                        rustls::StreamOwned::new(session, stream),
                                        max,
                                    )),
                                    Err(e) => {
                                        log::warn!("tls session setup failed for {peer}: {e}");
                                        continue;
                                    }
                                }
                            } else {
                                Box::new(SocketFrameStream::new(stream, max))
                            };
                            #[cfg(not(feature = "tls"))]
                            let framed: Box<dyn FrameStream> =
                                Box::new(SocketFrameStream::new(stream, max));

                            spawn_connection(
                                framed,
                                peer,
                                Arc::clone(&dispatcher),
                                Arc::clone(&accept_metrics),
                                Arc::clone(&accept_running),
                            );
                        }
                        Err(e) => {
                            log::error!("accept error: {e}");
                        }
                    }
                }
            });

            Ok(TransportServer {
                local,
                running,
                accept_thread: Mutex::new(Some(handle)),
                metrics,
            })
        }

        Scheme::Ipc => {
            #[cfg(unix)]
            {
                // a stale socket file from a crashed run blocks bind
                let _ = std::fs::remove_file(url.host());
                let listener =
                    std::os::unix::net::UnixListener::bind(url.host()).map_err(|e| {
                        ListenError::Bind {
                            url: url.to_string(),
                            reason: e.to_string(),
                        }
                    })?;
                log::info!("listening on {url}");

                let max = options.max_message_size;
                let accept_running = Arc::clone(&running);
                let accept_metrics = Arc::clone(&metrics);
                let handle = spawn_accept_thread(move || {
                    for incoming in listener.incoming() {
                        if !accept_running.load(Ordering::SeqCst) {
                            break;
                        }
                        match incoming {
                            Ok(stream) => spawn_connection(
                                Box::new(SocketFrameStream::new(stream, max)),
                                "ipc-peer".to_string(),
                                Arc::clone(&dispatcher),
                                Arc::clone(&accept_metrics),
                                Arc::clone(&accept_running),
                            ),
                            Err(e) => log::error!("accept error: {e}"),
                        }
                    }
                });

                Ok(TransportServer {
                    local: url.clone(),
                    running,
                    accept_thread: Mutex::new(Some(handle)),
                    metrics,
                })
            }
            #[cfg(not(unix))]
            {
                Err(ListenError::Unsupported(url.to_string()))
            }
        }

        Scheme::Inproc => {
            let listener = inproc::bind(url.host()).map_err(|e| ListenError::Bind {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            log::info!("listening on {url}");

            let accept_running = Arc::clone(&running);
            let accept_metrics = Arc::clone(&metrics);
            let handle = spawn_accept_thread(move || {
                while let Some(stream) = listener.accept() {
                    if !accept_running.load(Ordering::SeqCst) {
                        break;
                    }
                    spawn_connection(
                        Box::new(stream),
                        format!("inproc://{}", listener.name()),
                        Arc::clone(&dispatcher),
                        Arc::clone(&accept_metrics),
                        Arc::clone(&accept_running),
                    );
                }
            });

            Ok(TransportServer {
                local: url.clone(),
                running,
                accept_thread: Mutex::new(Some(handle)),
                metrics,
            })
        }
    }
}

fn spawn_accept_thread(run: impl FnOnce() + Send + 'static) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("hermod-accept".to_string())
        .spawn(run)
        .expect("failed to spawn accept thread")
}

fn spawn_connection(
    stream: Box<dyn FrameStream>,
    peer: String,
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<ListenerMetrics>,
    running: Arc<AtomicBool>,
) {
    metrics.record_connection();
    let result = std::thread::Builder::new()
        .name("hermod-conn".to_string())
        .spawn(move || serve_connection(stream, &peer, &dispatcher, &metrics, &running));
    if let Err(e) = result {
        log::error!("failed to spawn connection thread: {e}");
    }
}

fn serve_connection(
    mut stream: Box<dyn FrameStream>,
    peer: &str,
    dispatcher: &Dispatcher,
    metrics: &ListenerMetrics,
    running: &AtomicBool,
) {
    log::debug!("connection from {peer}");
    while running.load(Ordering::SeqCst) {
        match stream.recv_frame() {
            Ok(Some(payload)) => {
                let reply = handle_payload(&payload, dispatcher, metrics);
                let bytes = match encode_message(&reply) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        log::error!("reply encode failed for {peer}: {e}");
                        break;
                    }
                };
                if let Err(e) = stream.send_frame(&bytes) {
                    log::warn!("write to {peer} failed: {e}");
                    break;
                }
            }
            Ok(None) => {
                log::debug!("connection closed: {peer}");
                break;
            }
            Err(e) => {
                log::warn!("read from {peer} failed: {e}");
                break;
            }
        }
    }
}

fn handle_payload(
    payload: &[u8],
    dispatcher: &Dispatcher,
    metrics: &ListenerMetrics,
) -> RpcMessage {
    match decode_message(payload) {
        Ok(RpcMessage::Call { signature, args }) => {
            metrics.record_call();
            match dispatcher.dispatch(&signature, &args) {
                Ok(result) => RpcMessage::Reply { result },
                Err(e) => {
                    metrics.record_error();
                    log::warn!("call '{signature}' failed: {e}");
                    RpcMessage::Error {
                        message: e.to_string(),
                    }
                }
            }
        }
        Ok(other) => {
            metrics.record_error();
            log::warn!("unexpected message on request stream: {other:?}");
            RpcMessage::Error {
                message: "expected a call".to_string(),
            }
        }
        Err(e) => {
            metrics.record_error();
            RpcMessage::Error {
                message: e.to_string(),
            }
        }
    }
}
