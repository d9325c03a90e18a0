//! # Core Building Blocks
//!
//! This module aggregates the resource-bounding primitives of the agentdash
//! ingestion engine. Everything here exists to keep a long-lived dashboard
//! process well-behaved under sustained high message rates: nothing in this
//! module may grow without bound, and nothing may hold a timer that outlives
//! its owner.
//!
//! ## Components:
//!
//! - **`bounded_cache`**: A fixed-capacity key/value store with
//!   insertion-order eviction. The general-purpose answer to "this map must
//!   not grow forever".
//!
//! - **`metrics`**: Rolling-window performance recording. Each named metric
//!   keeps only the most recent N samples and can answer avg/min/max/count
//!   over that window.
//!
//! - **`batcher`**: A size-or-interval message batcher that decouples the
//!   arrival rate of items from the delivery rate to a consumer, bounding
//!   both latency and per-delivery overhead.
//!
//! These structures hold no global state. They are constructed explicitly and
//! passed where needed, so tests can instantiate isolated copies.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Size-or-interval message batching for downstream consumers.
pub mod batcher;
/// A fixed-capacity map with insertion-order eviction.
pub mod bounded_cache;
/// Rolling-window performance metrics.
pub mod metrics;
