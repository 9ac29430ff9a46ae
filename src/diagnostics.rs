//! Bounded request/response log for operator inspection.
//!
//! Every outbound request made by a transport (and by read-only helpers such
//! as the version check) is appended here. When the log is full the oldest
//! entry is evicted. Recording never fails and never blocks a transport: a
//! poisoned lock is recovered and the entry is still written.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Default number of entries kept
pub const DEFAULT_CAPACITY: usize = 200;

/// One request/response pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticEntry {
    pub timestamp_ms: u64,
    pub method: String,
    pub url: String,
    pub request_body: String,
    /// Absent when no response arrived
    pub response_code: Option<u16>,
    pub response_body: String,
    pub duration_ms: u64,
    pub success: bool,
}

impl DiagnosticEntry {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            timestamp_ms: devlink_shared::now_ms(),
            method: method.into(),
            url: url.into(),
            request_body: String::new(),
            response_code: None,
            response_body: String::new(),
            duration_ms: 0,
            success: false,
        }
    }

    pub fn request_body(mut self, body: impl Into<String>) -> Self {
        self.request_body = body.into();
        self
    }

    pub fn response(mut self, code: Option<u16>, body: impl Into<String>) -> Self {
        self.response_code = code;
        self.response_body = body.into();
        self
    }

    pub fn finished(mut self, duration: Duration, success: bool) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self.success = success;
        self
    }
}

/// Shared handle to the ring buffer. Clones share the same log.
#[derive(Debug, Clone)]
pub struct DiagnosticLog {
    entries: Arc<Mutex<VecDeque<DiagnosticEntry>>>,
    capacity: usize,
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl DiagnosticLog {
    /// Create a log holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(1024)))),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<DiagnosticEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an entry, evicting the oldest one if the log is full
    pub fn record(&self, entry: DiagnosticEntry) {
        let mut entries = self.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Copy of the log, most recent entry first
    pub fn snapshot(&self) -> Vec<DiagnosticEntry> {
        self.lock().iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: usize) -> DiagnosticEntry {
        DiagnosticEntry::new("POST", format!("http://host/{}", n))
            .finished(Duration::from_millis(n as u64), true)
    }

    #[test]
    fn test_evicts_oldest() {
        let log = DiagnosticLog::new(3);
        for n in 0..4 {
            log.record(entry(n));
        }

        let snapshot = log.snapshot();
        assert_eq!(snapshot.len(), 3);
        let urls: Vec<_> = snapshot.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, vec!["http://host/3", "http://host/2", "http://host/1"]);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let log = DiagnosticLog::new(10);
        log.record(entry(1));
        let snapshot = log.snapshot();

        log.record(entry(2));
        log.clear();

        assert_eq!(snapshot.len(), 1);
        assert!(log.is_empty());
    }

    #[test]
    fn test_clones_share_entries() {
        let log = DiagnosticLog::new(5);
        let other = log.clone();
        other.record(entry(7));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_zero_capacity_keeps_one() {
        let log = DiagnosticLog::new(0);
        log.record(entry(1));
        log.record(entry(2));
        assert_eq!(log.capacity(), 1);
        assert_eq!(log.snapshot()[0].url, "http://host/2");
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let e = DiagnosticEntry::new("GET", "http://x")
            .request_body("{}")
            .response(Some(200), "ok")
            .finished(Duration::from_millis(12), true);
        let value = serde_json::to_value(&e).unwrap();
        assert_eq!(value["responseCode"], 200);
        assert_eq!(value["durationMs"], 12);
    }
}
