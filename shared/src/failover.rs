//! Connection state and failover policy
//!
//! Pure bookkeeping for the connectivity subsystem: outcome counting, stall
//! detection and the escalation ladder Socket -> LongPoll -> PeriodicPing ->
//! Socket. The runtime owns one [`ConnectionState`] per session and drives it
//! with the current time.

use crate::Mode;
use serde::{Deserialize, Serialize};

/// Result of one failover decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverDecision {
    /// Fresh connection on the same transport
    Restart(Mode),
    /// Move to a different transport
    Switch { from: Mode, to: Mode },
}

impl FailoverDecision {
    /// Mode that must be active after the decision is applied
    pub fn target(&self) -> Mode {
        match self {
            FailoverDecision::Restart(mode) => *mode,
            FailoverDecision::Switch { to, .. } => *to,
        }
    }
}

/// Per-session connectivity state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionState {
    pub mode: Mode,
    pub consecutive_failures: u32,
    /// Absent until the first successful heartbeat
    pub last_success_ms: Option<u64>,
    pub running: bool,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionState {
    /// Create an idle state
    pub fn new() -> Self {
        Self {
            mode: Mode::Socket,
            consecutive_failures: 0,
            last_success_ms: None,
            running: false,
        }
    }

    /// Create a fresh running state; nothing carries over from a prior session
    pub fn started() -> Self {
        Self {
            running: true,
            ..Self::new()
        }
    }

    /// Record a successful heartbeat
    pub fn record_success(&mut self, now_ms: u64) {
        if !self.running {
            return;
        }
        self.last_success_ms = Some(now_ms);
        self.consecutive_failures = 0;
    }

    /// Record a failed heartbeat. Never switches transports.
    pub fn record_failure(&mut self) {
        if !self.running {
            return;
        }
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    /// Milliseconds since the last success, if there ever was one
    pub fn elapsed_since_success(&self, now_ms: u64) -> Option<u64> {
        self.last_success_ms
            .map(|last| now_ms.saturating_sub(last))
    }

    /// Check whether the active transport has stopped producing successes
    pub fn is_stalled(&self, now_ms: u64, threshold_ms: u64) -> bool {
        match self.elapsed_since_success(now_ms) {
            // Never succeeded yet - escalating would be premature
            None => false,
            Some(elapsed) => elapsed > threshold_ms,
        }
    }

    /// Apply the failover policy to the current mode.
    ///
    /// The stall itself counts as a failure. From `Socket`, the transport is
    /// restarted while the count stays below `socket_failure_limit`; every
    /// other step moves one rung along the ladder and clears the count.
    pub fn apply_failover(&mut self, socket_failure_limit: u32) -> FailoverDecision {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        let decision = match self.mode {
            Mode::Socket if self.consecutive_failures < socket_failure_limit => {
                FailoverDecision::Restart(Mode::Socket)
            }
            from => FailoverDecision::Switch {
                from,
                to: from.next(),
            },
        };

        if let FailoverDecision::Switch { to, .. } = decision {
            self.mode = to;
            self.consecutive_failures = 0;
        }

        decision
    }

    /// One monitor tick: fail over if the transport is stalled
    pub fn on_monitor_tick(
        &mut self,
        now_ms: u64,
        stall_threshold_ms: u64,
        socket_failure_limit: u32,
    ) -> Option<FailoverDecision> {
        if !self.running || !self.is_stalled(now_ms, stall_threshold_ms) {
            return None;
        }
        Some(self.apply_failover(socket_failure_limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::{SOCKET_FAILURE_LIMIT, STALL_THRESHOLD_MS};

    #[test]
    fn test_initial_state() {
        let state = ConnectionState::new();
        assert_eq!(state.mode, Mode::Socket);
        assert!(!state.running);
        assert!(state.last_success_ms.is_none());
    }

    #[test]
    fn test_outcome_counting() {
        let mut state = ConnectionState::started();
        let outcomes = [false, false, true, false, true, true, false, false, false];
        let mut expected = 0;

        for outcome in outcomes {
            if outcome {
                state.record_success(100);
                expected = 0;
            } else {
                state.record_failure();
                expected += 1;
            }
            assert_eq!(state.consecutive_failures, expected);
        }
        assert_eq!(state.consecutive_failures, 3);
        assert_eq!(state.mode, Mode::Socket);
    }

    #[test]
    fn test_stopped_state_is_frozen() {
        let mut state = ConnectionState::started();
        state.record_failure();
        state.running = false;

        state.record_failure();
        state.record_success(5);
        assert_eq!(state.consecutive_failures, 1);
        assert!(state.last_success_ms.is_none());
        assert!(state.on_monitor_tick(u64::MAX, 0, 3).is_none());
    }

    #[test]
    fn test_stall_detection() {
        let mut state = ConnectionState::started();

        // No success yet - should never stall
        assert!(!state.is_stalled(1_000_000, STALL_THRESHOLD_MS));

        state.record_success(1000);
        assert!(!state.is_stalled(2000, STALL_THRESHOLD_MS));
        assert!(!state.is_stalled(1000 + STALL_THRESHOLD_MS, STALL_THRESHOLD_MS));
        assert!(state.is_stalled(1000 + STALL_THRESHOLD_MS + 1, STALL_THRESHOLD_MS));
    }

    #[test]
    fn test_socket_restarts_then_falls_back() {
        let mut state = ConnectionState::started();

        assert_eq!(
            state.apply_failover(SOCKET_FAILURE_LIMIT),
            FailoverDecision::Restart(Mode::Socket)
        );
        assert_eq!(state.consecutive_failures, 1);

        assert_eq!(
            state.apply_failover(SOCKET_FAILURE_LIMIT),
            FailoverDecision::Restart(Mode::Socket)
        );
        assert_eq!(state.consecutive_failures, 2);

        assert_eq!(
            state.apply_failover(SOCKET_FAILURE_LIMIT),
            FailoverDecision::Switch {
                from: Mode::Socket,
                to: Mode::LongPoll
            }
        );
        assert_eq!(state.mode, Mode::LongPoll);
        assert_eq!(state.consecutive_failures, 0);
    }

    #[test]
    fn test_three_failures_switch_on_next_tick() {
        let mut state = ConnectionState::started();
        state.record_success(0);
        for _ in 0..3 {
            state.record_failure();
        }

        let decision = state.on_monitor_tick(11_000, STALL_THRESHOLD_MS, SOCKET_FAILURE_LIMIT);
        assert_eq!(
            decision,
            Some(FailoverDecision::Switch {
                from: Mode::Socket,
                to: Mode::LongPoll
            })
        );
        assert_eq!(state.mode, Mode::LongPoll);
        assert_eq!(state.consecutive_failures, 0);
    }

    #[test]
    fn test_full_cycle_returns_to_socket() {
        let mut state = ConnectionState::started();
        state.record_success(0);

        let mut now = 0;
        let mut switches = Vec::new();
        while switches.len() < 3 {
            now += 5000;
            if let Some(FailoverDecision::Switch { to, .. }) =
                state.on_monitor_tick(now, STALL_THRESHOLD_MS, SOCKET_FAILURE_LIMIT)
            {
                switches.push(to);
            }
        }

        assert_eq!(switches, vec![Mode::LongPoll, Mode::PeriodicPing, Mode::Socket]);
        assert_eq!(state.mode, Mode::Socket);
        assert_eq!(state.consecutive_failures, 0);
    }

    #[test]
    fn test_success_prevents_failover() {
        let mut state = ConnectionState::started();
        state.record_success(0);
        state.record_failure();
        state.record_success(9000);

        assert!(state
            .on_monitor_tick(15_000, STALL_THRESHOLD_MS, SOCKET_FAILURE_LIMIT)
            .is_none());
        assert_eq!(state.consecutive_failures, 0);
    }
}
