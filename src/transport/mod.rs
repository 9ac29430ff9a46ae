//! Connectivity transports
//!
//! Three strategies share one [`Transport`] trait:
//! - [`SocketTransport`]: persistent WebSocket with a 1-unit heartbeat
//! - [`LongPollTransport`]: held HTTP request, one at a time
//! - [`PeriodicPingTransport`]: fast-fail health check on a fixed period

pub mod http;
pub mod long_poll;
pub mod periodic_ping;
pub mod reconnect;
pub mod socket;
pub mod traits;

pub use long_poll::LongPollTransport;
pub use periodic_ping::PeriodicPingTransport;
pub use reconnect::ReconnectScheduler;
pub use socket::SocketTransport;
pub use traits::{OutcomeReporter, OutcomeSink, Transport, TransportContext, TransportFactory};

use crate::config::ConnectionConfig;
use devlink_shared::Mode;

/// Builds the real transports from configuration, sharing one HTTP client
#[derive(Debug, Clone)]
pub struct DefaultTransportFactory {
    config: ConnectionConfig,
    client: reqwest::Client,
}

impl DefaultTransportFactory {
    pub fn new(config: ConnectionConfig) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(config.timings.connect_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }
}

impl TransportFactory for DefaultTransportFactory {
    fn create(&self, mode: Mode) -> Box<dyn Transport> {
        let timings = &self.config.timings;
        match mode {
            Mode::Socket => Box::new(SocketTransport::new(
                self.config.socket_url(),
                timings.socket_heartbeat,
                timings.connect_timeout,
                ReconnectScheduler::fixed(timings.socket_reconnect),
            )),
            Mode::LongPoll => Box::new(LongPollTransport::new(
                self.client.clone(),
                self.config.long_poll_url(),
                timings.long_poll_timeout,
                timings.long_poll_retry,
            )),
            Mode::PeriodicPing => Box::new(PeriodicPingTransport::new(
                self.client.clone(),
                self.config.health_check_url(),
                timings.ping_period,
                timings.ping_timeout,
            )),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Context and outcome recorder for driving a transport in isolation

    use super::*;
    use crate::clock::SystemClock;
    use crate::command::CommandRouter;
    use crate::diagnostics::DiagnosticLog;
    use crate::telemetry::{StaticTelemetry, Telemetry};
    use async_trait::async_trait;
    use devlink_shared::DeviceCredential;
    use std::sync::{Arc, Mutex};
    use tokio_util::sync::CancellationToken;

    pub const TOKEN: &str = "test-device-token";

    /// Records every reported outcome
    #[derive(Default)]
    pub struct RecordingSink {
        outcomes: Mutex<Vec<bool>>,
    }

    impl RecordingSink {
        pub fn outcomes(&self) -> Vec<bool> {
            self.outcomes.lock().unwrap().clone()
        }

        pub fn successes(&self) -> usize {
            self.outcomes().iter().filter(|o| **o).count()
        }

        pub fn failures(&self) -> usize {
            self.outcomes().iter().filter(|o| !**o).count()
        }
    }

    #[async_trait]
    impl OutcomeSink for RecordingSink {
        async fn report(&self, _epoch: u64, success: bool) -> bool {
            self.outcomes.lock().unwrap().push(success);
            true
        }
    }

    pub fn context(sink: &Arc<RecordingSink>) -> TransportContext {
        let weak: std::sync::Weak<RecordingSink> = Arc::downgrade(sink);
        TransportContext {
            credential: DeviceCredential::new(TOKEN),
            reporter: OutcomeReporter::new(1, weak),
            cancel: CancellationToken::new(),
            telemetry: Arc::new(StaticTelemetry(Telemetry {
                battery_level: 57,
                link_speed_kbps: 1200,
            })),
            clock: Arc::new(SystemClock),
            commands: CommandRouter::new(),
            diagnostics: DiagnosticLog::new(50),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_modes() {
        let factory = DefaultTransportFactory::new(ConnectionConfig::default());
        for mode in [Mode::Socket, Mode::LongPoll, Mode::PeriodicPing] {
            assert_eq!(factory.create(mode).mode(), mode);
        }
    }
}
