//! Periodic health-check transport
//!
//! Fire-and-forget POST on a fixed period. Each round runs on its own task,
//! so the period holds however slowly the server answers. No connection
//! state carries over between rounds.

use crate::transport::http::post_heartbeat;
use crate::transport::traits::{Transport, TransportContext};
use async_trait::async_trait;
use devlink_shared::Mode;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

pub struct PeriodicPingTransport {
    client: reqwest::Client,
    url: String,
    period: Duration,
    timeout: Duration,
}

impl PeriodicPingTransport {
    pub fn new(client: reqwest::Client, url: String, period: Duration, timeout: Duration) -> Self {
        Self {
            client,
            url,
            period,
            timeout,
        }
    }
}

/// One health-check round; gives up silently once cancelled
async fn ping_round(client: reqwest::Client, url: String, ctx: TransportContext, timeout: Duration) {
    let payload = ctx.heartbeat();
    let result = tokio::select! {
        _ = ctx.cancel.cancelled() => return,
        result = post_heartbeat(&client, &url, &ctx, &payload, timeout) => result,
    };

    match result {
        Ok(_) => {
            debug!("[PING] Health check ok");
            ctx.reporter.report(true).await;
        }
        Err(e) => {
            warn!("[PING] Health check failed: {}", e);
            ctx.reporter.report(false).await;
        }
    }
}

#[async_trait]
impl Transport for PeriodicPingTransport {
    fn mode(&self) -> Mode {
        Mode::PeriodicPing
    }

    async fn run(&mut self, ctx: TransportContext) {
        info!("[PING] Starting, endpoint {}", self.url);

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Rounds never wait on each other; a slow server must not stretch the period
        let mut rounds = JoinSet::new();

        loop {
            tokio::select! {
                _ = ctx.cancel.cancelled() => break,
                Some(_) = rounds.join_next(), if !rounds.is_empty() => continue,
                _ = ticker.tick() => {}
            }

            rounds.spawn(ping_round(
                self.client.clone(),
                self.url.clone(),
                ctx.clone(),
                self.timeout,
            ));
        }

        // No round may report once run() has returned
        rounds.abort_all();
        while rounds.join_next().await.is_some() {}

        debug!("[PING] Transport stopped");
    }
}
