//! # Cadre Agents - bundled workers for the Cadre control plane
//!
//! Concrete agents built on the `cadre-core` lifecycle harness:
//! - [`heartbeat::Heartbeat`] - a no-op agent that counts ticks; useful as a
//!   template and for smoke-testing a supervised deployment
//! - [`ingestion::Ingestion`] - periodic ingestion of external JSON sources
//!   into a pluggable [`store::SnapshotStore`]
//!
//! External systems are reached through capability traits
//! ([`source::SnapshotSource`], [`store::SnapshotStore`]) injected at
//! construction, so the agents stay testable and the supervisor stays fully
//! decoupled from any specific backend.

pub mod error;
pub mod heartbeat;
pub mod ingestion;
pub mod source;
pub mod store;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::IngestError;
    pub use crate::heartbeat::{Heartbeat, HeartbeatConfig};
    pub use crate::ingestion::Ingestion;
    pub use crate::source::{FetchingSource, RawSnapshot, SnapshotSource};
    pub use crate::store::{MemoryStore, SnapshotRecord, SnapshotStore};
}
