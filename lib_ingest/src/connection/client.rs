//! # Feed Client
//!
//! The async driver that keeps exactly one live WebSocket connection to the
//! analysis server, transparently recovering from drops.
//!
//! The driver owns no policy: every decision (retry or give up, notify which
//! store flag, dial again or stop) is made by the [`Connection`] state
//! machine. This loop only translates transport reality into machine events
//! and machine actions back into tokio/tungstenite calls.
//!
//! Resilience model: transient drops feed the bounded fixed-delay retry
//! path; exhausted retries surface one terminal error through the store;
//! malformed inbound frames are the dispatcher's
//! problem and never abort the read loop; `send` while not open is a logged
//! drop, not an error. A watchdog treats prolonged silence (no frames, no
//! pings) as a dead connection, which is what heartbeat frames exist to
//! prevent.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::connection::state::{Connection, ConnectionAction, ConnectionEvent, ConnectionState};
use crate::core::metrics::PerfMonitor;
use crate::error::IngestError;
use crate::protocol::dispatcher::{DashboardStore, Dispatcher};

/// Name of the rolling metric recording per-frame dispatch latency (ms).
pub const DISPATCH_METRIC: &str = "dispatch";

/// Configuration for one feed client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base WebSocket endpoint, e.g. `ws://127.0.0.1:8765/ws`.
    pub base_url: String,
    /// Optional session identifier, appended as a path segment to scope the
    /// channel to one pipeline run.
    pub session_id: Option<String>,
    /// Fixed delay between reconnect attempts. Evenly spaced by design; no
    /// exponential backoff.
    pub retry_delay: Duration,
    /// Reconnect attempts before the connection is declared permanently lost.
    pub max_reconnect_attempts: u32,
    /// Silence threshold after which the connection is presumed dead and the
    /// retry path is entered. `None` disables the watchdog.
    pub heartbeat_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "ws://127.0.0.1:8765/ws".to_string(),
            session_id: None,
            retry_delay: Duration::from_millis(3000),
            max_reconnect_attempts: 10,
            heartbeat_timeout: Some(Duration::from_secs(45)),
        }
    }
}

impl ClientConfig {
    /// Resolves the full endpoint: `base_url[/session_id]`.
    pub fn endpoint(&self) -> Result<String, IngestError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| IngestError::InvalidEndpoint {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;

        if let Some(session_id) = &self.session_id {
            url.path_segments_mut()
                .map_err(|_| IngestError::InvalidEndpoint {
                    url: self.base_url.clone(),
                    reason: "endpoint cannot carry a session path segment".to_string(),
                })?
                .pop_if_empty()
                .push(session_id);
        }

        Ok(url.to_string())
    }
}

/// Owns the lifecycle of one logical connection: dials, dispatches, detects
/// closure, and drives bounded reconnection.
pub struct ConnectionManager {
    endpoint: String,
    machine: Mutex<Connection>,
    dispatcher: Dispatcher,
    store: Arc<dyn DashboardStore>,
    monitor: Arc<PerfMonitor>,
    heartbeat_timeout: Option<Duration>,
    outbound_tx: mpsc::UnboundedSender<String>,
    outbound_rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    cancel: CancellationToken,
}

impl ConnectionManager {
    /// Creates a manager for `config`, routing inbound frames into `store`
    /// and recording dispatch latency into `monitor`.
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn DashboardStore>,
        monitor: Arc<PerfMonitor>,
    ) -> Result<Self, IngestError> {
        let endpoint = config.endpoint()?;
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        Ok(Self {
            endpoint,
            machine: Mutex::new(Connection::new(
                config.max_reconnect_attempts,
                config.retry_delay,
            )),
            dispatcher: Dispatcher::new(Arc::clone(&store)),
            store,
            monitor,
            heartbeat_timeout: config.heartbeat_timeout,
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            cancel: CancellationToken::new(),
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.machine.lock().expect("connection lock poisoned").state()
    }

    /// Serializes and transmits `payload` if the connection is open.
    ///
    /// While not open this is a no-op observable only in the debug log: a
    /// dropped send during a disconnect window is expected, recoverable
    /// behavior, not an error.
    pub fn send<T: Serialize>(&self, payload: &T) -> Result<(), IngestError> {
        let text = serde_json::to_string(payload)?;

        if self.state() != ConnectionState::Open {
            log::debug!("Dropping outbound payload while not connected");
            return Ok(());
        }

        if self.outbound_tx.send(text).is_err() {
            log::debug!("Dropping outbound payload; connection task has exited");
        }
        Ok(())
    }

    /// Permanently closes the connection.
    ///
    /// Idempotent. Cancels any pending retry timer, closes the transport, and
    /// guarantees no further reconnection attempts even if a transport close
    /// notification arrives afterwards.
    pub fn disconnect(&self) {
        let actions = self.apply_event(ConnectionEvent::Disconnect);
        if !actions.is_empty() {
            log::info!("Disconnecting from feed");
        }
        self.cancel.cancel();
    }

    /// Runs the connection until it is permanently closed.
    ///
    /// Call once; the manager is typically run on its own task while callers
    /// interact through [`ConnectionManager::send`] and
    /// [`ConnectionManager::disconnect`].
    pub async fn run(&self) {
        let mut outbound = match self.outbound_rx.lock().expect("connection lock poisoned").take() {
            Some(rx) => rx,
            None => {
                log::error!("ConnectionManager::run called more than once; ignoring");
                return;
            }
        };

        let mut actions = self.apply_event(ConnectionEvent::Connect);

        loop {
            if self.cancel.is_cancelled() || !has_dial(&actions) {
                break;
            }

            log::info!("Connecting to feed: {}", self.endpoint);
            match connect_async(self.endpoint.as_str()).await {
                Ok((ws_stream, _)) => {
                    log::info!("Connected to feed");
                    self.apply_event(ConnectionEvent::Opened);

                    let (mut write, mut read) = ws_stream.split();
                    let mut last_activity = Instant::now();

                    let reason: Option<String> = loop {
                        tokio::select! {
                            _ = self.cancel.cancelled() => {
                                let _ = write.close().await;
                                return;
                            }
                            msg = read.next() => {
                                match msg {
                                    Some(Ok(Message::Text(text))) => {
                                        last_activity = Instant::now();
                                        let timer = self.monitor.timed(DISPATCH_METRIC);
                                        self.dispatcher.dispatch(text.as_str());
                                        timer.stop();
                                    }
                                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                                        // Transport-level liveness counts as activity.
                                        last_activity = Instant::now();
                                    }
                                    Some(Ok(Message::Close(_))) => {
                                        log::warn!("Feed closed by server");
                                        break Some("closed by server".to_string());
                                    }
                                    Some(Ok(_)) => {
                                        // Binary frames are not part of the protocol.
                                    }
                                    Some(Err(e)) => {
                                        log::error!("Feed read error: {}", e);
                                        break Some(e.to_string());
                                    }
                                    None => {
                                        log::warn!("Feed stream ended");
                                        break Some("stream ended".to_string());
                                    }
                                }
                            }
                            outgoing = outbound.recv() => {
                                if let Some(payload) = outgoing {
                                    if let Err(e) = write.send(Message::Text(payload.into())).await {
                                        log::error!("Failed to send payload: {}", e);
                                        break Some(e.to_string());
                                    }
                                }
                            }
                            // Watchdog: a connection that stopped producing
                            // frames (heartbeats included) is dead even if the
                            // TCP session lingers.
                            _ = tokio::time::sleep(Duration::from_secs(1)) => {
                                if let Some(timeout) = self.heartbeat_timeout {
                                    if last_activity.elapsed() > timeout {
                                        log::warn!(
                                            "No frames for {}s; treating connection as dead",
                                            timeout.as_secs()
                                        );
                                        let _ = write.close().await;
                                        break Some("inactivity timeout".to_string());
                                    }
                                }
                            }
                        }
                    };

                    actions = self.apply_event(ConnectionEvent::Closed { reason });
                }
                Err(e) => {
                    log::error!("Failed to connect to feed: {}", e);
                    actions = self.apply_event(ConnectionEvent::Closed {
                        reason: Some(e.to_string()),
                    });
                }
            }

            if !self.wait_for_retry(&mut actions).await {
                break;
            }
        }
    }

    /// Waits out a scheduled retry delay, if the machine asked for one.
    /// Returns false when the loop should stop (terminal state or cancelled).
    async fn wait_for_retry(&self, actions: &mut Vec<ConnectionAction>) -> bool {
        let delay = match actions.iter().find_map(|a| match a {
            ConnectionAction::ScheduleRetry(d) => Some(*d),
            _ => None,
        }) {
            Some(delay) => delay,
            None => return false,
        };

        tokio::select! {
            _ = self.cancel.cancelled() => return false,
            _ = tokio::time::sleep(delay) => {}
        }

        *actions = self.apply_event(ConnectionEvent::RetryElapsed);
        has_dial(actions)
    }

    /// Feeds one event through the machine and performs its store-facing
    /// actions. Transport-facing actions are returned to the run loop.
    fn apply_event(&self, event: ConnectionEvent) -> Vec<ConnectionAction> {
        let actions = self
            .machine
            .lock()
            .expect("connection lock poisoned")
            .on_event(event);

        for action in &actions {
            match action {
                ConnectionAction::NotifyConnected(connected) => {
                    self.store.set_connected(*connected);
                }
                ConnectionAction::NotifyReconnecting(reconnecting) => {
                    self.store.set_reconnecting(*reconnecting);
                }
                ConnectionAction::ClearError => self.store.set_error(None),
                ConnectionAction::Fatal(message) => {
                    log::error!("Giving up on feed: {}", message);
                    self.store.set_error(Some(message.clone()));
                }
                ConnectionAction::Dial
                | ConnectionAction::ScheduleRetry(_)
                | ConnectionAction::CloseTransport => {}
            }
        }

        actions
    }
}

fn has_dial(actions: &[ConnectionAction]) -> bool {
    actions.iter().any(|a| matches!(a, ConnectionAction::Dial))
}
