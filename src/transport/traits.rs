//! Transport trait abstraction for pluggable connectivity strategies

use crate::clock::Clock;
use crate::command::CommandRouter;
use crate::diagnostics::DiagnosticLog;
use crate::telemetry::TelemetrySource;
use async_trait::async_trait;
use devlink_shared::{DeviceCredential, HeartbeatPayload, Mode};
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;

/// Receiver of heartbeat outcomes, tagged with the activation epoch
#[async_trait]
pub trait OutcomeSink: Send + Sync {
    /// Apply an outcome. Returns false when the epoch is stale or the
    /// session has stopped, in which case nothing was recorded.
    async fn report(&self, epoch: u64, success: bool) -> bool;
}

/// Narrow callback surface handed to one activation of a transport
#[derive(Clone)]
pub struct OutcomeReporter {
    epoch: u64,
    sink: Weak<dyn OutcomeSink>,
}

impl OutcomeReporter {
    pub fn new(epoch: u64, sink: Weak<dyn OutcomeSink>) -> Self {
        Self { epoch, sink }
    }

    /// Report one heartbeat attempt
    pub async fn report(&self, success: bool) -> bool {
        match self.sink.upgrade() {
            Some(sink) => sink.report(self.epoch, success).await,
            None => false,
        }
    }
}

impl std::fmt::Debug for OutcomeReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutcomeReporter")
            .field("epoch", &self.epoch)
            .finish()
    }
}

/// Everything a transport needs for one activation
#[derive(Clone)]
pub struct TransportContext {
    pub credential: DeviceCredential,
    pub reporter: OutcomeReporter,
    /// Fires when the manager deactivates this transport
    pub cancel: CancellationToken,
    pub telemetry: Arc<dyn TelemetrySource>,
    pub clock: Arc<dyn Clock>,
    pub commands: CommandRouter,
    pub diagnostics: DiagnosticLog,
}

impl TransportContext {
    /// Build a fresh heartbeat from current telemetry
    pub fn heartbeat(&self) -> HeartbeatPayload {
        let telemetry = self.telemetry.telemetry();
        HeartbeatPayload::new(
            telemetry.battery_level,
            telemetry.link_speed_kbps,
            self.clock.now_ms(),
        )
    }

    /// Whether the manager still considers this activation current
    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}

/// One strategy for maintaining connectivity and delivering heartbeats
#[async_trait]
pub trait Transport: Send + Sync {
    /// Mode this transport implements
    fn mode(&self) -> Mode;

    /// Run until `ctx.cancel` fires, reporting every heartbeat attempt
    /// through `ctx.reporter`. Must return promptly once cancelled.
    async fn run(&mut self, ctx: TransportContext);
}

/// Factory for creating transports
pub trait TransportFactory: Send + Sync {
    fn create(&self, mode: Mode) -> Box<dyn Transport>;
}
