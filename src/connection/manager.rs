//! Connection manager with transport failover
//!
//! Owns the session's [`ConnectionState`], the active transport task and the
//! monitor loop. Every write to the state happens under one async mutex;
//! transports only reach it through an [`OutcomeReporter`] tagged with the
//! epoch they were activated under, so a retired transport can never touch
//! the state of its successor.

use super::monitor::{self, MonitorHandle};
use crate::clock::{Clock, SystemClock};
use crate::command::CommandRouter;
use crate::config::ConnectionConfig;
use crate::diagnostics::DiagnosticLog;
use crate::error::{ConnectivityError, Result};
use crate::telemetry::TelemetrySource;
use crate::transport::{
    DefaultTransportFactory, OutcomeReporter, OutcomeSink, TransportContext, TransportFactory,
};
use async_trait::async_trait;
use devlink_shared::{ConnectionState, DeviceCredential, FailoverDecision, Mode, ServerCommand};
use std::sync::{Arc, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Events emitted by the connection manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Session started on the socket transport
    Started,
    /// Session stopped, no transport active
    Stopped,
    /// Stalled transport replaced by a fresh instance of the same mode
    Restarted { mode: Mode },
    /// Stalled transport replaced by the next mode on the ladder
    Switched { from: Mode, to: Mode },
}

/// Transport task owned by the current epoch
struct ActiveTransport {
    mode: Mode,
    epoch: u64,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct Session {
    state: ConnectionState,
    /// Bumped on every activation and on stop
    epoch: u64,
    credential: DeviceCredential,
    active: Option<ActiveTransport>,
    monitor: Option<MonitorHandle>,
}

pub(crate) struct Inner {
    config: ConnectionConfig,
    factory: Arc<dyn TransportFactory>,
    telemetry: Arc<dyn TelemetrySource>,
    clock: Arc<dyn Clock>,
    commands: CommandRouter,
    diagnostics: DiagnosticLog,
    /// Held for the whole of start() and stop() so their events never interleave
    lifecycle: Mutex<()>,
    session: Mutex<Session>,
    event_tx: mpsc::UnboundedSender<ConnectionEvent>,
    event_rx: std::sync::Mutex<Option<mpsc::UnboundedReceiver<ConnectionEvent>>>,
}

impl Inner {
    fn emit(&self, event: ConnectionEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Replace whatever transport is active with a fresh one of `mode`.
    /// The old transport is cancelled and left to exit on its own task.
    fn activate(self: &Arc<Self>, session: &mut Session, mode: Mode) {
        session.epoch += 1;
        let epoch = session.epoch;

        if let Some(old) = session.active.take() {
            debug!("[LINK] Retiring {} transport (epoch {})", old.mode, old.epoch);
            old.cancel.cancel();
            let teardown = self.config.timings.teardown_timeout;
            tokio::spawn(async move {
                join_bounded(old.task, teardown, "transport").await;
            });
        }

        let mut transport = self.factory.create(mode);
        let cancel = CancellationToken::new();
        let weak: Weak<Inner> = Arc::downgrade(self);
        let sink: Weak<dyn OutcomeSink> = weak;

        let ctx = TransportContext {
            credential: session.credential.clone(),
            reporter: OutcomeReporter::new(epoch, sink),
            cancel: cancel.clone(),
            telemetry: self.telemetry.clone(),
            clock: self.clock.clone(),
            commands: self.commands.clone(),
            diagnostics: self.diagnostics.clone(),
        };

        let task = tokio::spawn(async move {
            transport.run(ctx).await;
        });

        info!("[LINK] Activated {} transport (epoch {})", mode, epoch);
        session.active = Some(ActiveTransport {
            mode,
            epoch,
            cancel,
            task,
        });
    }

    /// One monitor tick. Returns the failover decision applied, if any.
    pub(crate) async fn monitor_tick(self: &Arc<Self>) -> Option<FailoverDecision> {
        let mut session = self.session.lock().await;
        let now = self.clock.now_ms();
        let stall_ms = self.config.timings.stall_threshold.as_millis() as u64;

        let Some(elapsed) = session.state.elapsed_since_success(now) else {
            trace!("[MONITOR] No success yet, nothing to check");
            return None;
        };

        let decision = session.state.on_monitor_tick(
            now,
            stall_ms,
            self.config.socket_failure_limit,
        )?;

        let event = match decision {
            FailoverDecision::Restart(mode) => {
                warn!(
                    "[MONITOR] {} stalled for {}ms, restarting (failures: {})",
                    mode, elapsed, session.state.consecutive_failures
                );
                ConnectionEvent::Restarted { mode }
            }
            FailoverDecision::Switch { from, to } => {
                warn!(
                    "[MONITOR] {} stalled for {}ms, switching to {}",
                    from, elapsed, to
                );
                ConnectionEvent::Switched { from, to }
            }
        };

        self.activate(&mut session, decision.target());
        drop(session);

        self.emit(event);
        Some(decision)
    }
}

#[async_trait]
impl OutcomeSink for Inner {
    async fn report(&self, epoch: u64, success: bool) -> bool {
        let mut session = self.session.lock().await;

        if !session.state.running || session.epoch != epoch {
            trace!(
                "[LINK] Discarding outcome from epoch {} (current {})",
                epoch,
                session.epoch
            );
            return false;
        }

        if success {
            session.state.record_success(self.clock.now_ms());
        } else {
            session.state.record_failure();
            debug!(
                "[LINK] Heartbeat failed on {} (consecutive: {})",
                session.state.mode, session.state.consecutive_failures
            );
        }
        true
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let session = self.session.get_mut();
        if let Some(active) = session.active.take() {
            active.cancel.cancel();
        }
        if let Some(monitor) = session.monitor.take() {
            monitor.cancel.cancel();
        }
    }
}

/// Wait for a cancelled task, aborting it if it outlives `limit`
async fn join_bounded(mut task: JoinHandle<()>, limit: Duration, what: &str) {
    if tokio::time::timeout(limit, &mut task).await.is_err() {
        warn!("[LINK] {} did not exit within {:?}, aborting", what, limit);
        task.abort();
    }
}

/// Keeps one device reachable, failing over between transports
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Create a manager backed by the real transports and the system clock
    pub fn new(config: ConnectionConfig, telemetry: Arc<dyn TelemetrySource>) -> Self {
        let factory = Arc::new(DefaultTransportFactory::new(config.clone()));
        Self::with_parts(config, factory, telemetry, Arc::new(SystemClock))
    }

    /// Create a manager from explicit collaborators
    pub fn with_parts(
        config: ConnectionConfig,
        factory: Arc<dyn TransportFactory>,
        telemetry: Arc<dyn TelemetrySource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let diagnostics = DiagnosticLog::new(config.diagnostic_capacity);

        let inner = Inner {
            config,
            factory,
            telemetry,
            clock,
            commands: CommandRouter::new(),
            diagnostics,
            lifecycle: Mutex::new(()),
            session: Mutex::new(Session {
                state: ConnectionState::new(),
                epoch: 0,
                credential: DeviceCredential::default(),
                active: None,
                monitor: None,
            }),
            event_tx,
            event_rx: std::sync::Mutex::new(Some(event_rx)),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Start a session on the socket transport.
    ///
    /// Fails with [`ConnectivityError::NoCredential`] on an empty credential.
    /// Calling this while already running does nothing.
    pub async fn start(&self, credential: DeviceCredential) -> Result<()> {
        if credential.is_empty() {
            warn!("[LINK] Refusing to start without a device credential");
            return Err(ConnectivityError::NoCredential);
        }

        let _lifecycle = self.inner.lifecycle.lock().await;
        let mut session = self.inner.session.lock().await;
        if session.state.running {
            info!("[LINK] Already running on {}", session.state.mode);
            return Ok(());
        }

        session.state = ConnectionState::started();
        session.credential = credential;
        self.inner.activate(&mut session, Mode::Socket);
        session.monitor = Some(monitor::spawn(
            Arc::downgrade(&self.inner),
            self.inner.config.timings.monitor_interval,
        ));
        drop(session);

        info!("[LINK] Started");
        self.inner.emit(ConnectionEvent::Started);
        Ok(())
    }

    /// Stop the session. Once this returns no transport of this session
    /// can change the state. Calling this while stopped does nothing.
    pub async fn stop(&self) {
        let _lifecycle = self.inner.lifecycle.lock().await;
        let (active, monitor) = {
            let mut session = self.inner.session.lock().await;
            if !session.state.running {
                debug!("[LINK] Stop requested while not running");
                return;
            }
            session.state.running = false;
            session.epoch += 1;
            (session.active.take(), session.monitor.take())
        };

        let teardown = self.inner.config.timings.teardown_timeout;

        if let Some(monitor) = monitor {
            monitor.cancel.cancel();
            join_bounded(monitor.task, teardown, "monitor").await;
        }
        if let Some(active) = active {
            active.cancel.cancel();
            join_bounded(active.task, teardown, "transport").await;
        }

        info!("[LINK] Stopped");
        self.inner.emit(ConnectionEvent::Stopped);
    }

    pub async fn is_running(&self) -> bool {
        self.inner.session.lock().await.state.running
    }

    pub async fn current_mode(&self) -> Mode {
        self.inner.session.lock().await.state.mode
    }

    /// Connectivity status for display
    pub async fn status(&self) -> String {
        let session = self.inner.session.lock().await;
        if session.state.running {
            format!("online via {}", session.state.mode)
        } else {
            "offline".to_string()
        }
    }

    /// Copy of the current connection state
    pub async fn snapshot(&self) -> ConnectionState {
        self.inner.session.lock().await.state.clone()
    }

    /// Register the handler for server commands, replacing any previous one
    pub async fn register_command_handler<F>(&self, handler: F)
    where
        F: Fn(ServerCommand) + Send + Sync + 'static,
    {
        self.inner.commands.register(handler).await;
    }

    /// Shared handle to the request log
    pub fn diagnostics(&self) -> DiagnosticLog {
        self.inner.diagnostics.clone()
    }

    /// Take the event receiver. Only the first call gets it.
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<ConnectionEvent>> {
        self.inner
            .event_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    #[cfg(test)]
    pub(crate) async fn tick_monitor(&self) -> Option<FailoverDecision> {
        self.inner.monitor_tick().await
    }
}
