//! Config-backed identity and capability collaborators.
//!
//! Real deployments put a token issuer and a permission service here; the
//! server only ever sees the resulting identity and yes/no answers.

use arbor_config::{allowed_by, AuthConfig};
use arbor_core::{Capability, CapabilityChecker, Identity, IdentityResolver};
use std::collections::HashMap;

/// Maps pre-validated bearer tokens to user ids
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityResolver {
    tokens: HashMap<String, String>,
}

impl StaticIdentityResolver {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.tokens.clone())
    }
}

impl IdentityResolver for StaticIdentityResolver {
    fn resolve(&self, token: &str) -> Option<Identity> {
        self.tokens.get(token).map(Identity::new)
    }
}

/// Capability allow-lists; an absent list grants the capability to
/// every identified user
#[derive(Debug, Clone, Default)]
pub struct ConfiguredCapabilities {
    create_users: Option<Vec<String>>,
    ai_users: Option<Vec<String>>,
}

impl ConfiguredCapabilities {
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            create_users: config.create_users.clone(),
            ai_users: config.ai_users.clone(),
        }
    }
}

impl CapabilityChecker for ConfiguredCapabilities {
    fn has_capability(&self, identity: &Identity, capability: Capability) -> bool {
        let list = match capability {
            Capability::CreateTree => self.create_users.as_deref(),
            Capability::UseAi => self.ai_users.as_deref(),
        };
        allowed_by(list, &identity.user_id)
    }
}
