//! Identities and capability checks.
//!
//! Token validation and capability evaluation are owned by external
//! services; Arbor only consumes their answers through these traits.

use crate::ArborError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An already-authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

/// Operations gated by an external capability check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Create or duplicate trees
    CreateTree,
    /// Call the AI relay
    UseAi,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::CreateTree => f.write_str("create_tree"),
            Capability::UseAi => f.write_str("use_ai"),
        }
    }
}

/// Maps a pre-validated bearer token to an identity
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, token: &str) -> Option<Identity>;
}

/// Answers boolean capability questions for an identity
pub trait CapabilityChecker: Send + Sync {
    fn has_capability(&self, identity: &Identity, capability: Capability) -> bool;

    /// Turn a failed check into a permission error
    fn require(&self, identity: &Identity, capability: Capability) -> Result<(), ArborError> {
        if self.has_capability(identity, capability) {
            Ok(())
        } else {
            Err(ArborError::Permission(format!(
                "user {} lacks capability {}",
                identity.user_id, capability
            )))
        }
    }
}
