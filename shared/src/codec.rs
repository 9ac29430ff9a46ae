//! JSON codec for heartbeat and server messages
//!
//! Every transport speaks JSON: text frames on the socket, request and
//! response bodies on the HTTP transports. Inbound payloads larger than
//! [`MAX_MESSAGE_SIZE`] are rejected before parsing.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::{PollResponse, SocketMessage};

/// Maximum message size (1 MB) to prevent memory exhaustion
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Message too large: {0} bytes (max: {MAX_MESSAGE_SIZE})")]
    MessageTooLarge(usize),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode a message into a JSON body
pub fn encode<T: Serialize>(message: &T) -> Result<Bytes, CodecError> {
    let buf = serde_json::to_vec(message)?;
    if buf.len() > MAX_MESSAGE_SIZE {
        return Err(CodecError::MessageTooLarge(buf.len()));
    }
    Ok(Bytes::from(buf))
}

/// Encode a message into a JSON text frame
pub fn encode_text<T: Serialize>(message: &T) -> Result<String, CodecError> {
    let text = serde_json::to_string(message)?;
    if text.len() > MAX_MESSAGE_SIZE {
        return Err(CodecError::MessageTooLarge(text.len()));
    }
    Ok(text)
}

/// Decode a JSON message from raw bytes
pub fn decode<T: DeserializeOwned>(buf: &[u8]) -> Result<T, CodecError> {
    if buf.len() > MAX_MESSAGE_SIZE {
        return Err(CodecError::MessageTooLarge(buf.len()));
    }
    Ok(serde_json::from_slice(buf)?)
}

/// Decode a text frame received on the socket
pub fn decode_socket_message(text: &str) -> Result<SocketMessage, CodecError> {
    decode(text.as_bytes())
}

/// Decode a long-poll response body. An empty body is an empty response.
pub fn decode_poll_response(buf: &[u8]) -> Result<PollResponse, CodecError> {
    if buf.iter().all(u8::is_ascii_whitespace) {
        return Ok(PollResponse::default());
    }
    decode(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeviceCredential, HeartbeatPayload, ServerCommand, SocketPing};

    #[test]
    fn test_heartbeat_roundtrip() {
        let original = HeartbeatPayload::new(57, 1200, 1_700_000_000_000);

        let encoded = encode(&original).expect("encode failed");
        let decoded: HeartbeatPayload = decode(&encoded).expect("decode failed");

        assert_eq!(decoded, original);
        assert_eq!(decoded.battery_level, 57);
        assert_eq!(decoded.link_speed_kbps, 1200);
        assert_eq!(decoded.timestamp_ms, 1_700_000_000_000);
    }

    #[test]
    fn test_heartbeat_wire_names() {
        let encoded = encode(&HeartbeatPayload::new(57, 1200, 1_700_000_000_000)).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&encoded).unwrap();

        assert_eq!(value["batteryLevel"], 57);
        assert_eq!(value["linkSpeedKbps"], 1200);
        assert_eq!(value["timestampMs"], 1_700_000_000_000u64);
    }

    #[test]
    fn test_socket_ping_carries_credential() {
        let ping = SocketPing::new(
            &DeviceCredential::new("tok-1"),
            HeartbeatPayload::new(80, 54000, 42),
        );
        let text = encode_text(&ping).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["type"], "ping");
        assert_eq!(value["deviceToken"], "tok-1");
        assert_eq!(value["batteryLevel"], 80);
        assert_eq!(value["timestampMs"], 42);
    }

    #[test]
    fn test_decode_socket_messages() {
        assert_eq!(
            decode_socket_message(r#"{"type":"pong","timestamp":5}"#).unwrap(),
            SocketMessage::Pong
        );
        assert_eq!(
            decode_socket_message(r#"{"type":"error","message":"Invalid device token"}"#).unwrap(),
            SocketMessage::Error {
                message: "Invalid device token".into()
            }
        );
        assert_eq!(
            decode_socket_message(r#"{"type":"command","command":"sync","data":{"full":true}}"#)
                .unwrap(),
            SocketMessage::Command(ServerCommand {
                name: "sync".into(),
                data: serde_json::json!({"full": true}),
            })
        );
    }

    #[test]
    fn test_decode_socket_rejects_garbage() {
        assert!(matches!(
            decode_socket_message(r#"{"type":"bogus"}"#),
            Err(CodecError::Json(_))
        ));
        assert!(decode_socket_message("not json").is_err());
    }

    #[test]
    fn test_decode_poll_response() {
        let resp = decode_poll_response(br#"{"status":"timeout","keepAlive":true}"#).unwrap();
        assert_eq!(resp.status.as_deref(), Some("timeout"));
        assert!(resp.command.is_none());

        let resp = decode_poll_response(br#"{"status":"command","command":"lock","data":{"id":3}}"#)
            .unwrap();
        let cmd = resp.into_command().unwrap();
        assert_eq!(cmd.name, "lock");
        assert_eq!(cmd.data["id"], 3);

        assert_eq!(decode_poll_response(b"  ").unwrap(), PollResponse::default());
    }

    #[test]
    fn test_message_too_large() {
        let buf = vec![b' '; MAX_MESSAGE_SIZE + 1];
        let result: Result<HeartbeatPayload, _> = decode(&buf);
        assert!(matches!(result, Err(CodecError::MessageTooLarge(_))));
    }
}
