//! Persistent WebSocket transport
//!
//! Opens one long-lived connection and sends a heartbeat on every tick of
//! the heartbeat interval. A close or failure is reported once and followed
//! by exactly one reopen per firing of the [`ReconnectScheduler`]. An error
//! notice from the server reopens immediately instead.

use crate::diagnostics::DiagnosticEntry;
use crate::transport::reconnect::ReconnectScheduler;
use crate::transport::traits::{Transport, TransportContext};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use devlink_shared::{codec, Mode, SocketMessage, SocketPing};
use futures::{SinkExt, StreamExt};
use std::time::{Duration, Instant};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Bound on the close handshake when the transport is deactivated
const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Why a socket session ended
#[derive(Debug)]
enum SessionEnd {
    /// Deactivated by the manager
    Cancelled,
    /// Server asked us to go away
    ErrorNotice(String),
    /// Connection closed or broke; not yet reported
    Lost(String),
    /// A heartbeat send failed; already reported
    SendFailed(String),
}

pub struct SocketTransport {
    url: String,
    heartbeat: Duration,
    connect_timeout: Duration,
    scheduler: ReconnectScheduler,
}

impl SocketTransport {
    pub fn new(
        url: String,
        heartbeat: Duration,
        connect_timeout: Duration,
        scheduler: ReconnectScheduler,
    ) -> Self {
        Self {
            url,
            heartbeat,
            connect_timeout,
            scheduler,
        }
    }

    async fn connect(&self, ctx: &TransportContext) -> Result<WsStream> {
        let started = Instant::now();
        let entry = DiagnosticEntry::new("WS", &self.url);

        let result = match timeout(
            self.connect_timeout,
            tokio_tungstenite::connect_async(self.url.as_str()),
        )
        .await
        {
            Ok(Ok((stream, response))) => Ok((stream, response.status().as_u16())),
            Ok(Err(e)) => Err(anyhow::Error::new(e).context("WebSocket connect failed")),
            Err(_) => Err(anyhow!(
                "WebSocket connect timed out after {}ms",
                self.connect_timeout.as_millis()
            )),
        };

        match result {
            Ok((stream, status)) => {
                ctx.diagnostics.record(
                    entry
                        .response(Some(status), "")
                        .finished(started.elapsed(), true),
                );
                Ok(stream)
            }
            Err(e) => {
                ctx.diagnostics.record(
                    entry
                        .response(None, format!("{:#}", e))
                        .finished(started.elapsed(), false),
                );
                Err(e)
            }
        }
    }

    /// Drive one open connection until it ends. Also returns whether the
    /// server acknowledged any heartbeat on it.
    async fn session(&self, stream: WsStream, ctx: &TransportContext) -> (SessionEnd, bool) {
        let (mut sink, mut stream) = stream.split();
        let mut acknowledged = false;

        // First tick fires immediately: ping as soon as the socket opens
        let mut ticker = interval(self.heartbeat);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ctx.cancel.cancelled() => {
                    let _ = timeout(CLOSE_TIMEOUT, sink.send(Message::Close(None))).await;
                    return (SessionEnd::Cancelled, acknowledged);
                }

                _ = ticker.tick() => {
                    let payload = ctx.heartbeat();
                    let ping = SocketPing::new(&ctx.credential, payload);
                    let text = match codec::encode_text(&ping) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("[SOCKET] Failed to encode heartbeat: {}", e);
                            ctx.reporter.report(false).await;
                            continue;
                        }
                    };

                    let started = Instant::now();
                    let sent = sink.send(Message::Text(text)).await;
                    ctx.diagnostics.record(
                        DiagnosticEntry::new("WS", &self.url)
                            .request_body(codec::encode_text(&payload).unwrap_or_default())
                            .finished(started.elapsed(), sent.is_ok()),
                    );

                    match sent {
                        Ok(()) => {
                            trace!("[SOCKET] Heartbeat sent");
                            ctx.reporter.report(true).await;
                        }
                        Err(e) => {
                            ctx.reporter.report(false).await;
                            return (SessionEnd::SendFailed(e.to_string()), acknowledged);
                        }
                    }
                }

                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match codec::decode_socket_message(&text) {
                            Ok(SocketMessage::Pong) => {
                                trace!("[SOCKET] Pong received");
                                acknowledged = true;
                            }
                            Ok(SocketMessage::Error { message }) => {
                                return (SessionEnd::ErrorNotice(message), acknowledged);
                            }
                            Ok(SocketMessage::Command(command)) => {
                                ctx.commands.dispatch(command, Mode::Socket).await;
                            }
                            Err(e) => {
                                warn!("[SOCKET] Protocol error: {}", e);
                                ctx.reporter.report(false).await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| format!("{} {}", u16::from(f.code), f.reason))
                            .unwrap_or_else(|| "no close frame".into());
                        return (
                            SessionEnd::Lost(format!("closed by server: {}", reason)),
                            acknowledged,
                        );
                    }
                    // Pings are answered by tungstenite on the next write
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        return (SessionEnd::Lost(format!("read error: {}", e)), acknowledged);
                    }
                    None => return (SessionEnd::Lost("stream ended".into()), acknowledged),
                }
            }
        }
    }
}

#[async_trait]
impl Transport for SocketTransport {
    fn mode(&self) -> Mode {
        Mode::Socket
    }

    async fn run(&mut self, ctx: TransportContext) {
        info!("[SOCKET] Starting, endpoint {}", self.url);
        let mut previous_was_notice = false;

        while ctx.is_active() {
            let connected = tokio::select! {
                _ = ctx.cancel.cancelled() => break,
                result = self.connect(&ctx) => result,
            };

            let (end, acknowledged) = match connected {
                Ok(stream) => {
                    info!("[SOCKET] Connected");
                    self.scheduler.reset();
                    self.session(stream, &ctx).await
                }
                Err(e) => (SessionEnd::Lost(format!("{:#}", e)), false),
            };

            // A session the server accepted ends any run of notices
            if acknowledged {
                previous_was_notice = false;
            }

            let reconnect_now = match end {
                SessionEnd::Cancelled => break,
                SessionEnd::ErrorNotice(message) => {
                    warn!("[SOCKET] Server error: {}", message);
                    ctx.reporter.report(false).await;
                    // One immediate reopen; a repeat notice waits for the scheduler
                    !std::mem::replace(&mut previous_was_notice, true)
                }
                SessionEnd::Lost(reason) => {
                    warn!("[SOCKET] Connection lost: {}", reason);
                    ctx.reporter.report(false).await;
                    previous_was_notice = false;
                    false
                }
                SessionEnd::SendFailed(reason) => {
                    warn!("[SOCKET] Heartbeat send failed: {}", reason);
                    previous_was_notice = false;
                    false
                }
            };

            if reconnect_now {
                debug!("[SOCKET] Reconnecting immediately");
                continue;
            }
            if !self.scheduler.wait(&ctx.cancel).await {
                break;
            }
        }

        debug!("[SOCKET] Transport stopped");
    }
}
