use anyhow::{Context, Result};
use devlink::telemetry::{EnvCredential, SysfsTelemetry};
use devlink::{
    ConnectionConfig, ConnectionEvent, ConnectionManager, CredentialSource, VersionChecker,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// `RUST_LOG` directives when set and valid, `info` otherwise
fn log_filter(directives: Option<String>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok()))
        .init();

    let config = ConnectionConfig::from_env();
    info!("Device link starting");
    info!("  Server: {}", config.base_url);
    info!("  Socket: {}", config.socket_url());

    let credential = EnvCredential::default()
        .credential()
        .context("DEVLINK_DEVICE_TOKEN is not set")?;

    let conn = ConnectionManager::new(config.clone(), Arc::new(SysfsTelemetry::default()));
    let mut events = conn
        .take_events()
        .context("connection events already taken")?;

    conn.register_command_handler(|command| {
        info!("Server command: {} {}", command.name, command.data);
    })
    .await;

    conn.start(credential)
        .await
        .context("failed to start connection manager")?;

    // Version check is informational only
    let checker = VersionChecker::new(&config, conn.diagnostics());
    tokio::spawn(async move {
        match checker.latest().await {
            Ok(version) => info!(
                "Latest version: {} ({}){}",
                version.version,
                version.version_code,
                if version.force_update { ", update required" } else { "" }
            ),
            Err(e) => warn!("Version check failed: {}", e),
        }
    });

    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                match event {
                    ConnectionEvent::Started => info!("Connected ({})", conn.status().await),
                    ConnectionEvent::Stopped => info!("Disconnected"),
                    ConnectionEvent::Restarted { mode } => info!("Restarted {} transport", mode),
                    ConnectionEvent::Switched { from, to } => {
                        info!("Transport switched: {} -> {}", from, to)
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    conn.stop().await;

    for entry in conn.diagnostics().snapshot() {
        debug!(
            "{} {} -> {:?} in {}ms ({})",
            entry.method,
            entry.url,
            entry.response_code,
            entry.duration_ms,
            if entry.success { "ok" } else { "failed" }
        );
    }

    Ok(())
}
