//! devlink shared protocol types
//!
//! This crate provides the wire types, codec and failover policy shared by
//! the devlink runtime. Nothing in here performs I/O.

pub mod codec;
pub mod failover;

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub use failover::{ConnectionState, FailoverDecision};

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Default cadences for the connectivity subsystem
pub mod timing {
    /// Monitor loop wake-up interval
    pub const MONITOR_INTERVAL_MS: u64 = 5000;

    /// No success for longer than this means the active transport is stalled
    pub const STALL_THRESHOLD_MS: u64 = 10000;

    /// Heartbeat ticker on an open socket
    pub const SOCKET_HEARTBEAT_MS: u64 = 1000;

    /// Fixed delay before the socket reopens after a close or failure
    pub const SOCKET_RECONNECT_MS: u64 = 5000;

    /// Pause after a failed long-poll request
    pub const LONG_POLL_RETRY_MS: u64 = 2000;

    /// Client-side bound on a held long-poll request (server holds ~25s)
    pub const LONG_POLL_TIMEOUT_MS: u64 = 30000;

    /// Period of the fast-fail health check
    pub const PING_PERIOD_MS: u64 = 3000;

    /// Socket restarts tolerated before falling back to long-poll
    pub const SOCKET_FAILURE_LIMIT: u32 = 3;
}

/// Transport strategy currently carrying heartbeats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Socket,
    LongPoll,
    PeriodicPing,
}

impl Mode {
    /// Next rung of the escalation ladder. Always cycles back to `Socket`.
    pub fn next(self) -> Mode {
        match self {
            Mode::Socket => Mode::LongPoll,
            Mode::LongPoll => Mode::PeriodicPing,
            Mode::PeriodicPing => Mode::Socket,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Socket => write!(f, "Socket"),
            Mode::LongPoll => write!(f, "LongPoll"),
            Mode::PeriodicPing => write!(f, "PeriodicPing"),
        }
    }
}

/// Opaque bearer token identifying the device to the server
#[derive(Clone, Default, PartialEq, Eq)]
pub struct DeviceCredential(String);

impl DeviceCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Blank tokens count as absent
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for DeviceCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DeviceCredential(<{} bytes>)", self.0.len())
    }
}

/// Liveness message sent by every transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatPayload {
    /// Battery percentage, 0..=100
    pub battery_level: u8,
    pub link_speed_kbps: u32,
    pub timestamp_ms: u64,
}

impl HeartbeatPayload {
    /// Create a heartbeat, clamping the battery level to 100
    pub fn new(battery_level: u8, link_speed_kbps: u32, timestamp_ms: u64) -> Self {
        Self {
            battery_level: battery_level.min(100),
            link_speed_kbps,
            timestamp_ms,
        }
    }
}

/// Heartbeat frame on the socket transport; the credential rides in-band
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocketPing {
    #[serde(rename = "type")]
    pub kind: String,
    pub device_token: String,
    #[serde(flatten)]
    pub payload: HeartbeatPayload,
}

impl SocketPing {
    pub fn new(credential: &DeviceCredential, payload: HeartbeatPayload) -> Self {
        Self {
            kind: "ping".into(),
            device_token: credential.as_str().to_string(),
            payload,
        }
    }
}

/// Command pushed by the server over a bidirectional transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerCommand {
    #[serde(rename = "command")]
    pub name: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Messages the server sends down the socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SocketMessage {
    /// Acknowledgment of a ping, informational only
    Pong,
    /// Server-side rejection; the client must reconnect
    Error {
        #[serde(default)]
        message: String,
    },
    Command(ServerCommand),
}

/// Body of a long-poll response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PollResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl PollResponse {
    /// Extract the piggybacked command, if the server sent one
    pub fn into_command(self) -> Option<ServerCommand> {
        self.command.map(|name| ServerCommand {
            name,
            data: self.data.unwrap_or(serde_json::Value::Null),
        })
    }
}

/// Latest published client version, as reported by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppVersion {
    pub version: String,
    pub version_code: u32,
    #[serde(default)]
    pub force_update: bool,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub release_notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_cycle() {
        assert_eq!(Mode::Socket.next(), Mode::LongPoll);
        assert_eq!(Mode::LongPoll.next(), Mode::PeriodicPing);
        assert_eq!(Mode::PeriodicPing.next(), Mode::Socket);
    }

    #[test]
    fn test_heartbeat_clamps_battery() {
        let hb = HeartbeatPayload::new(140, 0, 1);
        assert_eq!(hb.battery_level, 100);
    }

    #[test]
    fn test_credential_redacted_and_blank() {
        let cred = DeviceCredential::new("secret-token");
        assert!(!format!("{:?}", cred).contains("secret"));
        assert!(DeviceCredential::new("   ").is_empty());
        assert!(DeviceCredential::default().is_empty());
    }

    #[test]
    fn test_poll_response_command() {
        let resp = PollResponse {
            status: Some("command".into()),
            command: Some("restart".into()),
            data: None,
        };
        let cmd = resp.into_command().unwrap();
        assert_eq!(cmd.name, "restart");
        assert!(cmd.data.is_null());

        assert!(PollResponse::default().into_command().is_none());
    }
}
