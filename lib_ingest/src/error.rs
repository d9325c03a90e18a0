//! # Ingestion Core Errors
//!
//! The error type returned by the fallible public operations of this crate.
//!
//! Deliberately small: inbound-data problems (malformed frames, unknown
//! message tags) and transport drops are *not* errors here. They are handled
//! at the boundary where they are detected and converted into diagnostics or
//! reconnection state, so they never propagate out of the core.

use thiserror::Error;

/// Errors surfaced by the ingestion core's public API.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The configured feed endpoint could not be parsed into a usable URL.
    #[error("invalid feed endpoint '{url}': {reason}")]
    InvalidEndpoint {
        /// The offending endpoint string as configured.
        url: String,
        /// Parser diagnostic for the failure.
        reason: String,
    },

    /// An outbound payload could not be serialized for transmission.
    #[error("failed to serialize outbound payload: {0}")]
    Serialize(#[from] serde_json::Error),
}
