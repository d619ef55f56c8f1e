// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Socket transports and the directory's listener.
//!
//! Three schemes are supported, all carrying the same length-prefixed
//! frames: `tcp://host:port` over TCP, `ipc://path` over unix-domain
//! sockets, and `inproc://name` over in-memory pipes for endpoints
//! sharing the process.

pub mod frame_codec;
pub mod inproc;
pub mod listener;
#[cfg(feature = "tls")]
pub mod tls;
pub mod url;

pub use listener::{listen, ListenError, ListenOptions, ListenerMetrics, TransportServer};
pub use url::{Scheme, Url, UrlError};

use std::io;

use crate::transport::frame_codec::{read_frame, write_frame, DEFAULT_MAX_MESSAGE_SIZE};

/// A duplex, message-framed byte stream.
///
/// `recv_frame` returns `Ok(None)` on clean end-of-stream.
pub trait FrameStream: Send {
    fn send_frame(&mut self, payload: &[u8]) -> io::Result<()>;
    fn recv_frame(&mut self) -> io::Result<Option<Vec<u8>>>;
}

/// Frame stream over any blocking byte stream (TCP, unix, TLS).
pub struct SocketFrameStream<S> {
    stream: S,
    max_frame: usize,
}

impl<S: io::Read + io::Write + Send> SocketFrameStream<S> {
    pub fn new(stream: S, max_frame: usize) -> Self {
        Self { stream, max_frame }
    }
}

impl<S: io::Read + io::Write + Send> FrameStream for SocketFrameStream<S> {
    fn send_frame(&mut self, payload: &[u8]) -> io::Result<()> {
        write_frame(&mut self.stream, payload)
    }

    fn recv_frame(&mut self) -> io::Result<Option<Vec<u8>>> {
        read_frame(&mut self.stream, self.max_frame)
    }
}

/// Open a client frame stream to `url`.
///
/// `tcp://0.0.0.0:p` connects to loopback (the wildcard address is a
/// listen address, not a destination).
pub fn connect(url: &Url) -> io::Result<Box<dyn FrameStream>> {
    connect_with_max(url, DEFAULT_MAX_MESSAGE_SIZE)
}

/// [`connect`] with an explicit frame-size limit.
pub fn connect_with_max(url: &Url, max_frame: usize) -> io::Result<Box<dyn FrameStream>> {
    match url.scheme() {
        Scheme::Tcp => {
            let host = if url.host() == "0.0.0.0" {
                "127.0.0.1"
            } else {
                url.host()
            };
            let stream = std::net::TcpStream::connect((host, url.port()))?;
            stream.set_nodelay(true)?;
            Ok(Box::new(SocketFrameStream::new(stream, max_frame)))
        }
        Scheme::Ipc => {
            #[cfg(unix)]
            {
                let stream = std::os::unix::net::UnixStream::connect(url.host())?;
                Ok(Box::new(SocketFrameStream::new(stream, max_frame)))
            }
            #[cfg(not(unix))]
            {
                Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "ipc:// requires unix-domain sockets",
                ))
            }
        }
        Scheme::Inproc => {
            let stream = inproc::connect(url.host())?;
            Ok(Box::new(stream))
        }
    }
}
