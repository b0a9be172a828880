//! Core domain types for Arbor.
//!
//! Everything here is independent of the replicated document engine: tree
//! identifiers, the ownership/metadata index, identities and capability
//! checks, and the registry of node-type content handlers.

pub mod error;
pub mod identity;
pub mod metadata;
pub mod node_types;
pub mod tree;

pub use error::{ArborError, Result};
pub use identity::{Capability, CapabilityChecker, Identity, IdentityResolver};
pub use metadata::{TreeMetadata, TreeMetadataManager};
pub use node_types::{FieldContent, NodeContent, NodeFields, NodeTypeRegistry};
pub use tree::TreeId;
