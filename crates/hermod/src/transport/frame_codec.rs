// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Length-prefix framing for message transports.
//!
//! The stream protocols carry no message boundaries, so every payload
//! is framed as:
//!
//! ```text
//! +----------------+-------------------+
//! | Length (4B BE) | payload           |
//! +----------------+-------------------+
//! ```
//!
//! The length field is a 32-bit big-endian integer counting payload
//! bytes only. Oversized frames are rejected before allocation.

use std::io::{self, Read, Write};

/// Frame header size (4 bytes for length).
pub const FRAME_HEADER_SIZE: usize = 4;

/// Default maximum message size (16 MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Encode a payload into a fresh framed buffer.
#[must_use]
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    encode_into(payload, &mut frame);
    frame
}

/// Append `[length][payload]` to `buf`.
pub fn encode_into(payload: &[u8], buf: &mut Vec<u8>) {
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(payload);
}

/// Write one framed payload to a blocking stream.
pub fn write_frame<W: Write + ?Sized>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    writer.write_all(&(payload.len() as u32).to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()
}

/// Read one framed payload from a blocking stream.
///
/// Returns `Ok(None)` on clean end-of-stream at a frame boundary;
/// end-of-stream inside a frame is an `UnexpectedEof` error.
pub fn read_frame<R: Read + ?Sized>(reader: &mut R, max_size: usize) -> io::Result<Option<Vec<u8>>> {
    let mut header = [0u8; FRAME_HEADER_SIZE];
    match read_exact_or_eof(reader, &mut header)? {
        ReadOutcome::Eof => return Ok(None),
        ReadOutcome::Full => {}
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > max_size {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {len} bytes (max {max_size})"),
        ));
    }
    if len == 0 {
        return Ok(Some(Vec::new()));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Ok(Some(payload))
}

enum ReadOutcome {
    Full,
    Eof,
}

/// `read_exact` that distinguishes "nothing at all" from a short read.
fn read_exact_or_eof<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<ReadOutcome> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                if filled == 0 {
                    return Ok(ReadOutcome::Eof);
                }
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "incomplete frame header",
                ));
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(ReadOutcome::Full)
}
