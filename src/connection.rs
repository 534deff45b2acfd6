//! Connection lifecycle and reconnect policy.
//!
//! DESIGN
//! ======
//! `ConnectionManager` is a pure state machine: the runtime reports socket
//! open/close events and executes the `CloseOutcome` it gets back. Keeping
//! timers out of here makes the backoff schedule testable without a clock.
//!
//! LIFECYCLE
//! =========
//! `Disconnected → Connecting → Connected → Disconnected`. Abnormal closes
//! schedule another attempt until the ceiling is hit; code 1000 never does.

use std::time::Duration;

use crate::protocol::NORMAL_CLOSE;

pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_RECONNECT_BASE: Duration = Duration::from_secs(2);
pub const DEFAULT_RECONNECT_CAP: Duration = Duration::from_secs(30);

/// Current WebSocket connection lifecycle state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    #[default]
    Disconnected,
}

impl ConnectionState {
    /// Status line text shown to the user.
    #[must_use]
    pub fn status_text(self) -> &'static str {
        match self {
            Self::Connecting => "🟡 Connecting...",
            Self::Connected => "🟢 Connected",
            Self::Disconnected => "🔴 Disconnected",
        }
    }
}

/// Linear backoff with a cap: `min(cap, base × attempt)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            base: DEFAULT_RECONNECT_BASE,
            cap: DEFAULT_RECONNECT_CAP,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(attempt).min(self.cap)
    }
}

/// What the runtime should do after a close.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Intentional close; stay disconnected.
    Normal,
    /// Schedule reconnect attempt `attempt` after `delay`.
    Reconnect { attempt: u32, delay: Duration },
    /// The attempt ceiling was reached; no further automatic attempts.
    GaveUp,
}

#[derive(Debug, Default)]
pub struct ConnectionManager {
    state: ConnectionState,
    policy: ReconnectPolicy,
    attempts: u32,
    exhausted: bool,
}

impl ConnectionManager {
    #[must_use]
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, ..Self::default() }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Reconnect attempts made since the last successful open.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether the ceiling was reached and the session stopped retrying.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn on_connecting(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    pub fn on_open(&mut self) {
        self.state = ConnectionState::Connected;
        self.attempts = 0;
        self.exhausted = false;
    }

    /// The socket could not even be constructed; no retry is scheduled.
    pub fn on_construct_failed(&mut self) {
        self.state = ConnectionState::Disconnected;
    }

    /// Record a close and decide whether to reconnect.
    pub fn on_close(&mut self, code: u16) -> CloseOutcome {
        self.state = ConnectionState::Disconnected;
        if code == NORMAL_CLOSE {
            return CloseOutcome::Normal;
        }
        if self.attempts >= self.policy.max_attempts {
            self.exhausted = true;
            return CloseOutcome::GaveUp;
        }
        self.attempts += 1;
        CloseOutcome::Reconnect {
            attempt: self.attempts,
            delay: self.policy.delay_for(self.attempts),
        }
    }
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;
