//! Identity and capability settings
//!
//! Token issuance lives outside Arbor. The token map stands in for the
//! upstream issuer: every bearer token listed here is treated as already
//! validated and mapped to its user id.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Bearer tokens and capability allow-lists
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuthConfig {
    /// Pre-validated bearer token -> user id
    pub tokens: HashMap<String, String>,
    /// Users allowed to create or duplicate trees; `None` allows everyone
    pub create_users: Option<Vec<String>>,
    /// Users allowed to call the AI relay; `None` allows everyone
    pub ai_users: Option<Vec<String>>,
}

/// `true` when `user` passes an optional allow-list
pub fn allowed_by(list: Option<&[String]>, user: &str) -> bool {
    list.map_or(true, |users| users.iter().any(|u| u == user))
}
