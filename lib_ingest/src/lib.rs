// Declare the modules to re-export
pub mod core;
pub mod connection;
pub mod error;
pub mod protocol;

// Re-export the primary types
pub use connection::state::{Connection, ConnectionEvent, ConnectionState};
pub use core::batcher::Batcher;
pub use core::bounded_cache::BoundedCache;
pub use core::metrics::{PerfMonitor, WindowStats};
pub use error::IngestError;
pub use protocol::dispatcher::{DashboardStore, DispatchOutcome, Dispatcher};
pub use protocol::message::*;

#[cfg(feature = "transport")]
pub use connection::client::{ClientConfig, ConnectionManager, DISPATCH_METRIC};
