//! # Connection Module
//!
//! Lifecycle management for the one logical session to the analysis server.
//!
//! The logic is split so the hard part stays testable without sockets:
//!
//! - **`state`**: the pure connection state machine. Every external stimulus
//!   (dial result, socket close, retry timer, explicit disconnect) is an
//!   event fed through a single `on_event` entry point; the machine answers
//!   with the actions the driver must perform. The reconnect bound, the
//!   attempt-counter reset on open, and the one-way manual-close latch all
//!   live here.
//!
//! - **`client`**: the async driver (behind the `transport` feature) that
//!   owns the actual WebSocket, feeds stimuli into the machine, and executes
//!   its actions with tokio timers and a tungstenite stream.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// The tokio + tungstenite driver for the state machine.
#[cfg(feature = "transport")]
pub mod client;
/// The pure, timer-free connection state machine.
pub mod state;

// --- Public API Re-exports ---
pub use state::{Connection, ConnectionAction, ConnectionEvent, ConnectionState};

#[cfg(feature = "transport")]
pub use client::{ClientConfig, ConnectionManager};
