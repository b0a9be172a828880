//! Tree identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_TREE_ID_LEN: usize = 128;

/// Values clients send when they have no real id yet
const PLACEHOLDER_IDS: &[&str] = &["undefined", "null"];

/// Opaque identifier of a tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TreeId(String);

impl TreeId {
    /// Allocate a fresh random id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Validate a client-supplied id.
    ///
    /// Accepts 1..=128 characters from `[A-Za-z0-9_.-]`, except the
    /// placeholder values `undefined` and `null`.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() || raw.len() > MAX_TREE_ID_LEN || PLACEHOLDER_IDS.contains(&raw) {
            return None;
        }
        let valid = raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        valid.then(|| Self(raw.to_string()))
    }

    /// Borrow the id as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TreeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
