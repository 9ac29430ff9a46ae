//! Connection management for keeping the device reachable
//!
//! This module handles:
//! - Session lifecycle (start / stop) and the connection state
//! - The monitor loop that detects a stalled transport
//! - Failover between socket, long-poll and periodic health check
//! - Discarding outcomes reported by retired transports

mod manager;
mod monitor;

pub use manager::{ConnectionEvent, ConnectionManager};
