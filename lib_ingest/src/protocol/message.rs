//! # Wire Message Model
//!
//! The envelope and payload types for every frame the analysis server can
//! push. Frames are parsed in two phases, the way the upstream handlers in
//! this codebase have always done it: the envelope first (cheap, shape-only),
//! then the tag-specific payload once the discriminant is known. That split is
//! what lets the dispatcher tell "malformed frame" apart from "unknown tag"
//! apart from "malformed payload".

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed set of frame discriminants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageTag {
    /// Progress/state change for one pipeline agent.
    AgentStatus,
    /// A log line emitted by an agent.
    Message,
    /// A record of one tool invocation by an agent.
    ToolCall,
    /// A completed report section.
    Report,
    /// A server-reported error condition.
    Error,
    /// Liveness signal; carries no state.
    Heartbeat,
}

impl MessageTag {
    /// Maps a wire discriminant to its tag, or `None` for an unknown one.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "agent_status" => Some(Self::AgentStatus),
            "message" => Some(Self::Message),
            "tool_call" => Some(Self::ToolCall),
            "report" => Some(Self::Report),
            "error" => Some(Self::Error),
            "heartbeat" => Some(Self::Heartbeat),
            _ => None,
        }
    }

    /// The wire spelling of this tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AgentStatus => "agent_status",
            Self::Message => "message",
            Self::ToolCall => "tool_call",
            Self::Report => "report",
            Self::Error => "error",
            Self::Heartbeat => "heartbeat",
        }
    }
}

/// The frame envelope, common to every tag.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawFrame {
    /// Wire discriminant; resolved to a [`MessageTag`] by the dispatcher.
    #[serde(rename = "type")]
    pub kind: String,
    /// The logical session this frame belongs to.
    pub session_id: String,
    /// ISO-8601 timestamp assigned by the server.
    pub timestamp: String,
    /// Tag-specific payload, decoded once the tag is known.
    #[serde(default)]
    pub data: Value,
}

/// Lifecycle state of one pipeline agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    /// Queued, not yet started.
    Pending,
    /// Actively working.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
}

/// Payload of an `agent_status` frame.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AgentStatusData {
    /// Display name of the agent, e.g. "Market Analyst".
    pub agent_name: String,
    /// Current lifecycle state.
    pub status: AgentState,
    /// Completion percentage, 0-100, when the agent reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    /// Human-readable description of what the agent is doing right now.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task: Option<String>,
}

/// Severity of a `message` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Routine progress output.
    Info,
    /// Something worth attention, not fatal.
    Warning,
    /// A failure inside the pipeline.
    Error,
    /// A milestone reached.
    Success,
}

/// Payload of a `message` frame.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChatMessageData {
    /// When the agent emitted the line.
    pub timestamp: String,
    /// Emitting agent.
    pub agent: String,
    /// Severity classification.
    pub message_type: MessageKind,
    /// The message text.
    pub content: String,
}

/// Payload of a `tool_call` frame.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ToolCallData {
    /// When the tool was invoked.
    pub timestamp: String,
    /// Invoking agent.
    pub agent: String,
    /// Name of the invoked tool.
    pub tool_name: String,
    /// Tool arguments as sent by the agent.
    #[serde(default)]
    pub parameters: Value,
    /// Tool result, once available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// Payload of a `report` frame.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReportData {
    /// Section identifier within the final report.
    pub section_name: String,
    /// Markdown body of the section.
    pub content: String,
    /// Authoring agent.
    pub agent: String,
    /// When the section was produced.
    pub timestamp: String,
}

/// Payload of an `error` frame.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ErrorData {
    /// The error string to surface to the user.
    pub error: String,
    /// Optional supporting detail, kept in the logs only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Payload of a `heartbeat` frame.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HeartbeatData {
    /// Server-side send time.
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip() {
        for raw in [
            "agent_status",
            "message",
            "tool_call",
            "report",
            "error",
            "heartbeat",
        ] {
            let tag = MessageTag::parse(raw).expect("known tag");
            assert_eq!(tag.as_str(), raw);
        }
        assert!(MessageTag::parse("quote").is_none());
        assert!(MessageTag::parse("").is_none());
    }

    #[test]
    fn test_envelope_parses_with_payload_left_raw() {
        let raw = r#"{
            "type": "agent_status",
            "session_id": "sess-1",
            "timestamp": "2026-08-27T10:15:00Z",
            "data": {"agent_name": "Market Analyst", "status": "running", "progress": 50}
        }"#;

        let frame: RawFrame = serde_json::from_str(raw).unwrap();
        assert_eq!(frame.kind, "agent_status");
        assert_eq!(frame.session_id, "sess-1");

        let status: AgentStatusData = serde_json::from_value(frame.data).unwrap();
        assert_eq!(status.agent_name, "Market Analyst");
        assert_eq!(status.status, AgentState::Running);
        assert_eq!(status.progress, Some(50));
        assert_eq!(status.current_task, None);
    }

    #[test]
    fn test_message_kinds_use_wire_spelling() {
        let data: ChatMessageData = serde_json::from_value(serde_json::json!({
            "timestamp": "2026-08-27T10:15:01Z",
            "agent": "Risk Analyst",
            "message_type": "warning",
            "content": "volatility above threshold"
        }))
        .unwrap();
        assert_eq!(data.message_type, MessageKind::Warning);
    }

    #[test]
    fn test_envelope_without_required_fields_is_rejected() {
        let missing_session = r#"{"type": "heartbeat", "timestamp": "t", "data": {}}"#;
        assert!(serde_json::from_str::<RawFrame>(missing_session).is_err());
    }
}
