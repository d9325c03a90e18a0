//! # Frame Dispatcher
//!
//! Maps one raw inbound frame to exactly one side-effecting call against the
//! externally supplied [`DashboardStore`]. The dispatcher owns no message
//! state of its own; it is a total routing function over the closed tag set.
//!
//! Failure handling is local and final:
//! - a frame that is not well-formed JSON (or lacks the envelope fields) is
//!   logged and dropped,
//! - an unknown discriminant is logged and dropped without touching any
//!   state-mutating handler,
//! - a payload that does not match its tag's shape is logged and dropped,
//! - the `error` tag is additionally surfaced through `set_error`,
//! - `heartbeat` is a no-op beyond trace logging; it exists to keep the
//!   connection watchdog fed.
//!
//! Nothing here returns a `Result`. The [`DispatchOutcome`] is a diagnostic
//! observation, not an error channel.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

use std::sync::Arc;

use crate::protocol::message::{
    AgentStatusData, ChatMessageData, ErrorData, HeartbeatData, MessageTag, RawFrame, ReportData,
    ToolCallData,
};

/// The collaborator contract consumed by the ingestion core.
///
/// Implemented by the surrounding application's state store. All methods are
/// invoked from the connection task; implementations synchronize internally
/// when they share state with other tasks.
pub trait DashboardStore: Send + Sync {
    /// Connection established / lost indicator.
    fn set_connected(&self, connected: bool);
    /// Automatic reconnection in progress indicator.
    fn set_reconnecting(&self, reconnecting: bool);
    /// Replaces the status of one named agent.
    fn update_agent_status(&self, agent_name: &str, status: AgentStatusData);
    /// Appends one agent log message.
    fn add_message(&self, message: ChatMessageData);
    /// Appends one tool invocation record.
    fn add_tool_call(&self, call: ToolCallData);
    /// Appends one report section.
    fn add_report(&self, report: ReportData);
    /// Sets or clears the user-visible error banner.
    fn set_error(&self, error: Option<String>);
}

/// What became of one dispatched frame. Observable for tests and metrics;
/// never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The frame reached its handler.
    Delivered(MessageTag),
    /// The envelope was not well-formed; frame dropped.
    MalformedFrame,
    /// The discriminant is outside the known set; frame dropped.
    UnknownTag(String),
    /// The tag was known but the payload did not match its shape; frame dropped.
    MalformedPayload(MessageTag),
}

/// Stateless router from raw frames to store handlers.
pub struct Dispatcher {
    store: Arc<dyn DashboardStore>,
}

impl Dispatcher {
    /// Creates a dispatcher routing into `store`.
    pub fn new(store: Arc<dyn DashboardStore>) -> Self {
        Self { store }
    }

    /// Classifies `raw` and invokes the matching handler exactly once.
    pub fn dispatch(&self, raw: &str) -> DispatchOutcome {
        let frame: RawFrame = match serde_json::from_str(raw) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Discarding malformed frame: {}", e);
                return DispatchOutcome::MalformedFrame;
            }
        };

        let tag = match MessageTag::parse(&frame.kind) {
            Some(tag) => tag,
            None => {
                log::warn!(
                    "Unknown message type '{}' (session {}); frame dropped",
                    frame.kind,
                    frame.session_id
                );
                return DispatchOutcome::UnknownTag(frame.kind);
            }
        };

        match tag {
            MessageTag::AgentStatus => match serde_json::from_value::<AgentStatusData>(frame.data) {
                Ok(status) => {
                    let agent_name = status.agent_name.clone();
                    self.store.update_agent_status(&agent_name, status);
                    DispatchOutcome::Delivered(tag)
                }
                Err(e) => self.malformed_payload(tag, e),
            },
            MessageTag::Message => match serde_json::from_value::<ChatMessageData>(frame.data) {
                Ok(message) => {
                    self.store.add_message(message);
                    DispatchOutcome::Delivered(tag)
                }
                Err(e) => self.malformed_payload(tag, e),
            },
            MessageTag::ToolCall => match serde_json::from_value::<ToolCallData>(frame.data) {
                Ok(call) => {
                    self.store.add_tool_call(call);
                    DispatchOutcome::Delivered(tag)
                }
                Err(e) => self.malformed_payload(tag, e),
            },
            MessageTag::Report => match serde_json::from_value::<ReportData>(frame.data) {
                Ok(report) => {
                    self.store.add_report(report);
                    DispatchOutcome::Delivered(tag)
                }
                Err(e) => self.malformed_payload(tag, e),
            },
            MessageTag::Error => match serde_json::from_value::<ErrorData>(frame.data) {
                Ok(error) => {
                    if let Some(details) = &error.details {
                        log::error!("Server error: {} ({})", error.error, details);
                    } else {
                        log::error!("Server error: {}", error.error);
                    }
                    self.store.set_error(Some(error.error));
                    DispatchOutcome::Delivered(tag)
                }
                Err(e) => self.malformed_payload(tag, e),
            },
            MessageTag::Heartbeat => match serde_json::from_value::<HeartbeatData>(frame.data) {
                // Liveness only. The connection loop already refreshed its
                // activity clock before handing the frame over.
                Ok(beat) => {
                    log::trace!("Heartbeat at {}", beat.timestamp);
                    DispatchOutcome::Delivered(tag)
                }
                Err(e) => self.malformed_payload(tag, e),
            },
        }
    }

    fn malformed_payload(&self, tag: MessageTag, e: serde_json::Error) -> DispatchOutcome {
        log::warn!("Discarding {} frame with malformed payload: {}", tag.as_str(), e);
        DispatchOutcome::MalformedPayload(tag)
    }
}
