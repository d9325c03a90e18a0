//! # Wire Protocol Module
//!
//! Everything the ingestion core knows about the server's message stream.
//!
//! The server pushes discriminated frames: a JSON envelope with a `type` tag,
//! a `session_id`, a `timestamp`, and a tag-specific `data` payload. This
//! module owns both halves of handling such a frame:
//!
//! - **`message`**: the envelope and the typed payload structs for every tag
//!   in the closed discriminant set.
//! - **`dispatcher`**: the total routing function that classifies a raw frame
//!   and invokes exactly one handler on the externally supplied store.
//!
//! Parse failures never escape this module as errors. A frame that cannot be
//! understood is diagnosed and dropped; the stream continues.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Classification and routing of parsed frames to store handlers.
pub mod dispatcher;
/// The frame envelope and per-tag payload types.
pub mod message;

// --- Public API Re-exports ---
pub use dispatcher::{DashboardStore, DispatchOutcome, Dispatcher};
pub use message::{
    AgentState, AgentStatusData, ChatMessageData, ErrorData, HeartbeatData, MessageKind,
    MessageTag, RawFrame, ReportData, ToolCallData,
};
