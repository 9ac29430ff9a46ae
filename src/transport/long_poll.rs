//! Long-poll transport
//!
//! One request in flight at a time. The server may hold each request open
//! until it has a command or its own hold timer fires, so the client timeout
//! is generous. Failed requests are followed by a short pause.

use crate::error::ConnectivityError;
use crate::transport::http::post_heartbeat;
use crate::transport::traits::{Transport, TransportContext};
use async_trait::async_trait;
use devlink_shared::{codec, Mode, PollResponse};
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct LongPollTransport {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    retry_delay: Duration,
}

impl LongPollTransport {
    pub fn new(
        client: reqwest::Client,
        url: String,
        timeout: Duration,
        retry_delay: Duration,
    ) -> Self {
        Self {
            client,
            url,
            timeout,
            retry_delay,
        }
    }

    async fn poll_once(&self, ctx: &TransportContext) -> Result<PollResponse, ConnectivityError> {
        let payload = ctx.heartbeat();
        let body = post_heartbeat(&self.client, &self.url, ctx, &payload, self.timeout).await?;
        Ok(codec::decode_poll_response(&body)?)
    }
}

#[async_trait]
impl Transport for LongPollTransport {
    fn mode(&self) -> Mode {
        Mode::LongPoll
    }

    async fn run(&mut self, ctx: TransportContext) {
        info!("[LONGPOLL] Starting, endpoint {}", self.url);

        while ctx.is_active() {
            let result = tokio::select! {
                _ = ctx.cancel.cancelled() => break,
                result = self.poll_once(&ctx) => result,
            };

            match result {
                Ok(response) => {
                    debug!(
                        "[LONGPOLL] Response: {}",
                        response.status.as_deref().unwrap_or("ok")
                    );
                    ctx.reporter.report(true).await;

                    if let Some(command) = response.into_command() {
                        ctx.commands.dispatch(command, Mode::LongPoll).await;
                    }
                }
                Err(e) => {
                    warn!("[LONGPOLL] Request failed: {}", e);
                    ctx.reporter.report(false).await;

                    tokio::select! {
                        _ = ctx.cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.retry_delay) => {}
                    }
                }
            }
        }

        debug!("[LONGPOLL] Transport stopped");
    }
}
