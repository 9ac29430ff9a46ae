//! Connection configuration

use devlink_shared::timing;
use std::time::Duration;

/// Cadences and timeouts used by the manager and the transports
#[derive(Debug, Clone)]
pub struct Timings {
    /// Monitor loop wake-up interval
    pub monitor_interval: Duration,
    /// Time without success after which the active transport is stalled
    pub stall_threshold: Duration,
    /// Heartbeat ticker on an open socket
    pub socket_heartbeat: Duration,
    /// Delay before the socket reopens after a close or failure
    pub socket_reconnect: Duration,
    /// Socket handshake bound
    pub connect_timeout: Duration,
    /// Client-side bound on a held long-poll request
    pub long_poll_timeout: Duration,
    /// Pause after a failed long-poll request
    pub long_poll_retry: Duration,
    /// Period of the health-check transport
    pub ping_period: Duration,
    /// Per-request bound for the health check
    pub ping_timeout: Duration,
    /// How long a retired transport may take to exit before being aborted
    pub teardown_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            monitor_interval: Duration::from_millis(timing::MONITOR_INTERVAL_MS),
            stall_threshold: Duration::from_millis(timing::STALL_THRESHOLD_MS),
            socket_heartbeat: Duration::from_millis(timing::SOCKET_HEARTBEAT_MS),
            socket_reconnect: Duration::from_millis(timing::SOCKET_RECONNECT_MS),
            connect_timeout: Duration::from_secs(10),
            long_poll_timeout: Duration::from_millis(timing::LONG_POLL_TIMEOUT_MS),
            long_poll_retry: Duration::from_millis(timing::LONG_POLL_RETRY_MS),
            ping_period: Duration::from_millis(timing::PING_PERIOD_MS),
            ping_timeout: Duration::from_secs(10),
            teardown_timeout: Duration::from_secs(2),
        }
    }
}

/// Configuration for connection manager
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// HTTP(S) base URL of the server
    pub base_url: String,
    /// Socket path, appended to the ws(s) form of `base_url`
    pub socket_path: String,
    /// Long-poll endpoint (tolerates long hold times)
    pub long_poll_path: String,
    /// Health-check endpoint (fast fail)
    pub health_check_path: String,
    /// Latest-version endpoint
    pub version_path: String,
    /// Socket restarts tolerated before falling back to long-poll
    pub socket_failure_limit: u32,
    /// Entries kept by the diagnostic log
    pub diagnostic_capacity: usize,
    pub timings: Timings,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".into(),
            socket_path: "/device-ping".into(),
            long_poll_path: "/api/device/long-poll".into(),
            health_check_path: "/api/device/health-check".into(),
            version_path: "/api/app/version/latest".into(),
            socket_failure_limit: timing::SOCKET_FAILURE_LIMIT,
            diagnostic_capacity: crate::diagnostics::DEFAULT_CAPACITY,
            timings: Timings::default(),
        }
    }
}

impl ConnectionConfig {
    /// Defaults overlaid with `DEVLINK_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("DEVLINK_BASE_URL") {
            if !url.trim().is_empty() {
                config.base_url = url.trim().to_string();
            }
        }

        if let Some(capacity) = std::env::var("DEVLINK_DIAGNOSTIC_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|c| *c > 0)
        {
            config.diagnostic_capacity = capacity;
        }

        config
    }

    fn http_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub fn long_poll_url(&self) -> String {
        self.http_url(&self.long_poll_path)
    }

    pub fn health_check_url(&self) -> String {
        self.http_url(&self.health_check_path)
    }

    pub fn version_url(&self) -> String {
        self.http_url(&self.version_path)
    }

    /// Socket URL: `base_url` with its scheme swapped to ws(s)
    pub fn socket_url(&self) -> String {
        http_to_ws_scheme(&self.http_url(&self.socket_path))
    }
}

/// Convert an HTTP(S) URL to WS(S) scheme. ws:// and wss:// pass through.
pub fn http_to_ws_scheme(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        url.to_string()
    }
}
