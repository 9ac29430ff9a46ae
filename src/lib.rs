//! Adaptive device connectivity
//!
//! Keeps one device reachable by a server over whichever transport currently
//! works: a persistent WebSocket, a held long-poll request, or a periodic
//! health check. [`ConnectionManager`] owns the session and fails over
//! between them when heartbeats stop succeeding.

pub mod clock;
pub mod command;
pub mod config;
pub mod connection;
pub mod diagnostics;
pub mod error;
pub mod telemetry;
pub mod transport;
pub mod version;

pub use clock::{Clock, ManualClock, SystemClock};
pub use command::CommandRouter;
pub use config::{ConnectionConfig, Timings};
pub use connection::{ConnectionEvent, ConnectionManager};
pub use diagnostics::{DiagnosticEntry, DiagnosticLog};
pub use error::ConnectivityError;
pub use telemetry::{CredentialSource, TelemetrySource};
pub use version::VersionChecker;

pub use devlink_shared::{ConnectionState, DeviceCredential, HeartbeatPayload, Mode, ServerCommand};
