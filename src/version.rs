//! Latest-version check
//!
//! Read-only query against the server. The result is only reported; nothing
//! here downloads or installs anything.

use crate::config::ConnectionConfig;
use crate::diagnostics::{DiagnosticEntry, DiagnosticLog};
use crate::error::{ConnectivityError, Result};
use devlink_shared::{codec, AppVersion};
use std::time::{Duration, Instant};

pub struct VersionChecker {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    diagnostics: DiagnosticLog,
}

impl VersionChecker {
    pub fn new(config: &ConnectionConfig, diagnostics: DiagnosticLog) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.version_url(),
            timeout: config.timings.ping_timeout,
            diagnostics,
        }
    }

    /// Fetch the latest published version
    pub async fn latest(&self) -> Result<AppVersion> {
        let entry = DiagnosticEntry::new("GET", &self.url);
        let started = Instant::now();

        let response = match self.client.get(&self.url).timeout(self.timeout).send().await {
            Ok(r) => r,
            Err(e) => {
                self.diagnostics.record(
                    entry
                        .response(None, e.to_string())
                        .finished(started.elapsed(), false),
                );
                return Err(e.into());
            }
        };

        let status = response.status();
        let body = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                self.diagnostics.record(
                    entry
                        .response(Some(status.as_u16()), e.to_string())
                        .finished(started.elapsed(), false),
                );
                return Err(e.into());
            }
        };

        let parsed = if status.is_success() {
            codec::decode::<AppVersion>(&body).map_err(ConnectivityError::from)
        } else {
            Err(ConnectivityError::HttpStatus(status.as_u16()))
        };

        self.diagnostics.record(
            entry
                .response(Some(status.as_u16()), String::from_utf8_lossy(&body))
                .finished(started.elapsed(), parsed.is_ok()),
        );

        parsed
    }
}
