//! HTTP heartbeat request shared by the long-poll and health-check transports

use crate::diagnostics::DiagnosticEntry;
use crate::error::{ConnectivityError, Result};
use crate::transport::traits::TransportContext;
use bytes::Bytes;
use devlink_shared::{codec, HeartbeatPayload};
use std::time::{Duration, Instant};

/// Header carrying the device credential
pub const CREDENTIAL_HEADER: &str = "x-device-token";

/// Longest response body copied into the diagnostic log
const MAX_LOGGED_BODY: usize = 4096;

/// POST one heartbeat and return the response body on a 2xx status.
/// The exchange is recorded in the diagnostic log either way.
pub async fn post_heartbeat(
    client: &reqwest::Client,
    url: &str,
    ctx: &TransportContext,
    payload: &HeartbeatPayload,
    timeout: Duration,
) -> Result<Bytes> {
    let body = codec::encode(payload)?;
    let entry = DiagnosticEntry::new("POST", url)
        .request_body(String::from_utf8_lossy(&body).into_owned());
    let started = Instant::now();

    let response = client
        .post(url)
        .timeout(timeout)
        .header(CREDENTIAL_HEADER, ctx.credential.as_str())
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await;

    let response = match response {
        Ok(r) => r,
        Err(e) => {
            ctx.diagnostics.record(
                entry
                    .response(None, e.to_string())
                    .finished(started.elapsed(), false),
            );
            return Err(e.into());
        }
    };

    let status = response.status();
    let bytes = match response.bytes().await {
        Ok(b) => b,
        Err(e) => {
            ctx.diagnostics.record(
                entry
                    .response(Some(status.as_u16()), e.to_string())
                    .finished(started.elapsed(), false),
            );
            return Err(e.into());
        }
    };

    ctx.diagnostics.record(
        entry
            .response(Some(status.as_u16()), logged_body(&bytes))
            .finished(started.elapsed(), status.is_success()),
    );

    if !status.is_success() {
        return Err(ConnectivityError::HttpStatus(status.as_u16()));
    }
    Ok(bytes)
}

fn logged_body(bytes: &[u8]) -> String {
    let end = bytes.len().min(MAX_LOGGED_BODY);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
