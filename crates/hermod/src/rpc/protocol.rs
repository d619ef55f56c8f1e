// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RPC wire protocol: length-prefixed JSON messages.
//!
//! The framing layer (see [`crate::transport::frame_codec`]) delimits
//! messages; each payload is one JSON document:
//!
//! ```text
//! {"type":"call","signature":"master.locateService::(ss)","args":[...]}
//! {"type":"reply","result":...}
//! {"type":"error","message":"..."}
//! ```
//!
//! JSON values are self-describing, so the signature string rides
//! along for dispatch and argument-kind checking rather than driving
//! the decoder.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// One RPC message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RpcMessage {
    /// Invoke the method bound under `signature`.
    #[serde(rename = "call")]
    Call {
        signature: String,
        #[serde(default)]
        args: Vec<Value>,
    },

    /// Successful completion.
    #[serde(rename = "reply")]
    Reply { result: Value },

    /// Failed completion; the connection stays up.
    #[serde(rename = "error")]
    Error { message: String },
}

/// Serialization failures at the wire boundary.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    #[error("encode error: {0}")]
    Encode(String),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Serialize a message for the wire.
pub fn encode_message(message: &RpcMessage) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(message).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Parse a wire payload.
pub fn decode_message(payload: &[u8]) -> Result<RpcMessage, CodecError> {
    serde_json::from_slice(payload).map_err(|e| CodecError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn call_roundtrip() {
        let message = RpcMessage::Call {
            signature: "master.registerService::(ss)".into(),
            args: vec![json!("svc1::f()"), json!("e2")],
        };
        let bytes = encode_message(&message).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("\"call\""));
        assert!(text.contains("registerService"));

        match decode_message(&bytes).unwrap() {
            RpcMessage::Call { signature, args } => {
                assert_eq!(signature, "master.registerService::(ss)");
                assert_eq!(args.len(), 2);
            }
            other => panic!("wrong message: {other:?}"),
        }
    }

    #[test]
    fn call_without_args_defaults_empty() {
        let bytes = br#"{"type":"call","signature":"master.listServices::()"}"#;
        match decode_message(bytes).unwrap() {
            RpcMessage::Call { args, .. } => assert!(args.is_empty()),
            other => panic!("wrong message: {other:?}"),
        }
    }

    #[test]
    fn reply_roundtrip() {
        let message = RpcMessage::Reply {
            result: json!({"k": "v"}),
        };
        let bytes = encode_message(&message).unwrap();
        match decode_message(&bytes).unwrap() {
            RpcMessage::Reply { result } => assert_eq!(result["k"], "v"),
            other => panic!("wrong message: {other:?}"),
        }
    }

    #[test]
    fn error_roundtrip() {
        let message = RpcMessage::Error {
            message: "unknown method".into(),
        };
        let bytes = encode_message(&message).unwrap();
        match decode_message(&bytes).unwrap() {
            RpcMessage::Error { message } => assert!(message.contains("unknown")),
            other => panic!("wrong message: {other:?}"),
        }
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            decode_message(b"not json at all"),
            Err(CodecError::Decode(_))
        ));
    }
}
