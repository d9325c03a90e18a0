//! # Connection State Machine
//!
//! One logical connection modeled as an explicit transition table:
//!
//! ```text
//! Idle -> Connecting -> Open
//! Open -> Reconnecting            (unexpected close, attempts remain)
//! Reconnecting -> Connecting      (retry timer elapsed)
//! any  -> ClosedPermanently       (disconnect, or attempts exhausted)
//! ```
//!
//! `ClosedPermanently` is terminal; no event leaves it. The machine owns the
//! reconnect-attempt counter (reset to zero exactly when the connection
//! opens) and the manual-close latch (once set, never cleared for the
//! lifetime of this instance; a fresh connect after a disconnect constructs
//! a new machine).
//!
//! The machine performs no I/O and holds no timers. It answers each event
//! with the [`ConnectionAction`]s its driver must carry out, which is what
//! makes the transition table testable without a socket or a clock.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

use std::time::Duration;

/// Lifecycle states of one logical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Constructed, not yet asked to connect.
    Idle,
    /// A dial attempt is in flight.
    Connecting,
    /// The transport is established and frames flow.
    Open,
    /// Waiting out the retry delay after an unexpected close.
    Reconnecting,
    /// Terminal: closed by the user or retries exhausted.
    ClosedPermanently,
}

/// External stimuli. Every driver funnels everything through these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The caller asked for a connection.
    Connect,
    /// The transport reported an established connection.
    Opened,
    /// The transport closed or failed, with an optional reason. Covers both
    /// dial failures and drops of an open stream.
    Closed {
        /// Transport diagnostic, when one exists.
        reason: Option<String>,
    },
    /// The retry delay has elapsed.
    RetryElapsed,
    /// The caller asked for a permanent disconnect.
    Disconnect,
}

/// Side effects the driver must perform in response to an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Open a transport to the endpoint.
    Dial,
    /// Wait this long, then feed [`ConnectionEvent::RetryElapsed`].
    ScheduleRetry(Duration),
    /// Close the transport if one is open.
    CloseTransport,
    /// Update the store's connected indicator.
    NotifyConnected(bool),
    /// Update the store's reconnecting indicator.
    NotifyReconnecting(bool),
    /// Clear any previously surfaced error.
    ClearError,
    /// Surface a terminal, user-visible failure. No automatic recovery
    /// follows; clearing it requires explicit user action.
    Fatal(String),
}

/// The state machine for one logical connection.
#[derive(Debug)]
pub struct Connection {
    state: ConnectionState,
    /// Reconnect attempts consumed since the last successful open.
    attempts: u32,
    /// One-way latch set by [`ConnectionEvent::Disconnect`].
    manually_closed: bool,
    max_attempts: u32,
    retry_delay: Duration,
}

impl Connection {
    /// Creates an idle machine with the given retry bounds.
    pub fn new(max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            state: ConnectionState::Idle,
            attempts: 0,
            manually_closed: false,
            max_attempts,
            retry_delay,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Reconnect attempts consumed since the last open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether the manual-close latch has been set.
    pub fn manually_closed(&self) -> bool {
        self.manually_closed
    }

    /// The single entry point: applies `event` and returns the actions the
    /// driver must perform, in order.
    pub fn on_event(&mut self, event: ConnectionEvent) -> Vec<ConnectionAction> {
        match event {
            ConnectionEvent::Connect => self.handle_connect(),
            ConnectionEvent::Opened => self.handle_opened(),
            ConnectionEvent::Closed { reason } => self.handle_closed(reason),
            ConnectionEvent::RetryElapsed => self.handle_retry_elapsed(),
            ConnectionEvent::Disconnect => self.handle_disconnect(),
        }
    }

    fn handle_connect(&mut self) -> Vec<ConnectionAction> {
        match self.state {
            ConnectionState::Idle => {
                self.transition(ConnectionState::Connecting);
                vec![ConnectionAction::Dial]
            }
            // Already connected or mid-recovery: connect() is a no-op.
            _ => Vec::new(),
        }
    }

    fn handle_opened(&mut self) -> Vec<ConnectionAction> {
        match self.state {
            ConnectionState::Connecting => {
                self.transition(ConnectionState::Open);
                self.attempts = 0;
                vec![
                    ConnectionAction::NotifyConnected(true),
                    ConnectionAction::NotifyReconnecting(false),
                    ConnectionAction::ClearError,
                ]
            }
            // A late open after disconnect must not resurrect the session.
            ConnectionState::ClosedPermanently => vec![ConnectionAction::CloseTransport],
            _ => Vec::new(),
        }
    }

    fn handle_closed(&mut self, reason: Option<String>) -> Vec<ConnectionAction> {
        if self.state == ConnectionState::ClosedPermanently {
            return Vec::new();
        }

        if self.manually_closed {
            self.transition(ConnectionState::ClosedPermanently);
            return Vec::new();
        }

        if self.attempts < self.max_attempts {
            self.attempts += 1;
            log::warn!(
                "Connection lost ({}); reconnect attempt {}/{} in {}ms",
                reason.as_deref().unwrap_or("no reason given"),
                self.attempts,
                self.max_attempts,
                self.retry_delay.as_millis()
            );
            self.transition(ConnectionState::Reconnecting);
            vec![
                ConnectionAction::NotifyConnected(false),
                ConnectionAction::NotifyReconnecting(true),
                ConnectionAction::ScheduleRetry(self.retry_delay),
            ]
        } else {
            self.transition(ConnectionState::ClosedPermanently);
            vec![
                ConnectionAction::NotifyConnected(false),
                ConnectionAction::NotifyReconnecting(false),
                ConnectionAction::Fatal(format!(
                    "connection lost after {} reconnect attempts",
                    self.max_attempts
                )),
            ]
        }
    }

    fn handle_retry_elapsed(&mut self) -> Vec<ConnectionAction> {
        if self.state == ConnectionState::Reconnecting && !self.manually_closed {
            self.transition(ConnectionState::Connecting);
            vec![ConnectionAction::Dial]
        } else {
            Vec::new()
        }
    }

    fn handle_disconnect(&mut self) -> Vec<ConnectionAction> {
        if self.state == ConnectionState::ClosedPermanently {
            // Idempotent: the second disconnect has nothing left to cancel.
            return Vec::new();
        }

        self.manually_closed = true;
        self.transition(ConnectionState::ClosedPermanently);
        vec![
            ConnectionAction::CloseTransport,
            ConnectionAction::NotifyConnected(false),
            ConnectionAction::NotifyReconnecting(false),
        ]
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            log::debug!("Connection state: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(max_attempts: u32) -> Connection {
        Connection::new(max_attempts, Duration::from_millis(3000))
    }

    fn has_dial(actions: &[ConnectionAction]) -> bool {
        actions.iter().any(|a| matches!(a, ConnectionAction::Dial))
    }

    fn retry_of(actions: &[ConnectionAction]) -> Option<Duration> {
        actions.iter().find_map(|a| match a {
            ConnectionAction::ScheduleRetry(d) => Some(*d),
            _ => None,
        })
    }

    #[test]
    fn test_happy_path_resets_attempts_on_open() {
        let mut conn = machine(10);

        let actions = conn.on_event(ConnectionEvent::Connect);
        assert!(has_dial(&actions));
        assert_eq!(conn.state(), ConnectionState::Connecting);

        // Fail once so the counter moves off zero.
        conn.on_event(ConnectionEvent::Closed { reason: None });
        assert_eq!(conn.attempts(), 1);
        conn.on_event(ConnectionEvent::RetryElapsed);

        let actions = conn.on_event(ConnectionEvent::Opened);
        assert_eq!(conn.state(), ConnectionState::Open);
        assert_eq!(conn.attempts(), 0);
        assert!(actions.contains(&ConnectionAction::NotifyConnected(true)));
        assert!(actions.contains(&ConnectionAction::NotifyReconnecting(false)));
        assert!(actions.contains(&ConnectionAction::ClearError));
    }

    #[test]
    fn test_connect_while_open_is_a_no_op() {
        let mut conn = machine(10);
        conn.on_event(ConnectionEvent::Connect);
        conn.on_event(ConnectionEvent::Opened);

        assert!(conn.on_event(ConnectionEvent::Connect).is_empty());
        assert_eq!(conn.state(), ConnectionState::Open);
    }

    #[test]
    fn test_unexpected_close_schedules_evenly_spaced_retry() {
        let mut conn = machine(10);
        conn.on_event(ConnectionEvent::Connect);
        conn.on_event(ConnectionEvent::Opened);

        let actions = conn.on_event(ConnectionEvent::Closed {
            reason: Some("reset by peer".into()),
        });
        assert_eq!(conn.state(), ConnectionState::Reconnecting);
        assert!(actions.contains(&ConnectionAction::NotifyConnected(false)));
        assert!(actions.contains(&ConnectionAction::NotifyReconnecting(true)));
        // Fixed delay, no backoff.
        assert_eq!(retry_of(&actions), Some(Duration::from_millis(3000)));

        let actions = conn.on_event(ConnectionEvent::RetryElapsed);
        assert!(has_dial(&actions));
        assert_eq!(conn.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_exactly_max_attempts_then_terminal() {
        let max = 4;
        let mut conn = machine(max);
        conn.on_event(ConnectionEvent::Connect);

        // 1. Every failed dial consumes one reconnect attempt
        for expected in 1..=max {
            let actions = conn.on_event(ConnectionEvent::Closed { reason: None });
            assert_eq!(conn.attempts(), expected);
            assert!(retry_of(&actions).is_some(), "attempt {} should retry", expected);
            assert!(has_dial(&conn.on_event(ConnectionEvent::RetryElapsed)));
        }

        // 2. The next failure exhausts the bound
        let actions = conn.on_event(ConnectionEvent::Closed { reason: None });
        assert_eq!(conn.state(), ConnectionState::ClosedPermanently);
        assert!(retry_of(&actions).is_none());
        assert!(actions
            .iter()
            .any(|a| matches!(a, ConnectionAction::Fatal(_))));

        // 3. Terminal means terminal
        assert!(conn.on_event(ConnectionEvent::RetryElapsed).is_empty());
        assert!(conn.on_event(ConnectionEvent::Connect).is_empty());
        assert!(conn.on_event(ConnectionEvent::Closed { reason: None }).is_empty());
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let mut conn = machine(10);
        conn.on_event(ConnectionEvent::Connect);
        conn.on_event(ConnectionEvent::Opened);

        let first = conn.on_event(ConnectionEvent::Disconnect);
        assert_eq!(conn.state(), ConnectionState::ClosedPermanently);
        assert!(first.contains(&ConnectionAction::CloseTransport));
        assert!(conn.manually_closed());

        // Second disconnect: same terminal state, nothing to cancel twice.
        let second = conn.on_event(ConnectionEvent::Disconnect);
        assert!(second.is_empty());
        assert_eq!(conn.state(), ConnectionState::ClosedPermanently);
    }

    #[test]
    fn test_close_after_disconnect_never_retries() {
        let mut conn = machine(10);
        conn.on_event(ConnectionEvent::Connect);
        conn.on_event(ConnectionEvent::Opened);
        conn.on_event(ConnectionEvent::Disconnect);

        // The transport's close notification may still arrive afterwards.
        let actions = conn.on_event(ConnectionEvent::Closed {
            reason: Some("going away".into()),
        });
        assert!(actions.is_empty());
        assert_eq!(conn.state(), ConnectionState::ClosedPermanently);
    }

    #[test]
    fn test_late_open_after_disconnect_closes_transport() {
        let mut conn = machine(10);
        conn.on_event(ConnectionEvent::Connect);
        conn.on_event(ConnectionEvent::Disconnect);

        let actions = conn.on_event(ConnectionEvent::Opened);
        assert_eq!(actions, vec![ConnectionAction::CloseTransport]);
        assert_eq!(conn.state(), ConnectionState::ClosedPermanently);
    }
}
