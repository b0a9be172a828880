//! CRDT-based synchronization for Arbor trees.
//!
//! One [`TreeDocument`] (a `yrs` document plus its update broadcaster)
//! exists per tree id, owned by the [`DocumentRegistry`]. The
//! [`SyncGateway`] runs the per-connection handshake and relays updates
//! between every subscriber of the same tree.

pub mod document;
pub mod error;
pub mod gateway;
pub mod patch;
pub mod protocol;
pub mod registry;
pub mod schema;

pub use document::{ConnectionId, Relay, RelayFrame, TreeDocument};
pub use error::{SyncError, SyncResult};
pub use gateway::{ConnectionState, SyncConnection, SyncGateway};
pub use patch::{NodePatch, SeedSummary};
pub use protocol::{AwarenessUpdate, Message, SyncMessage};
pub use registry::DocumentRegistry;
pub use schema::{NodeView, Roots};
