//! Tree ownership and lifecycle index.
//!
//! The index is a best-effort companion to the replicated documents: it is
//! never consulted by the sync path except to bump `last_accessed`, and it
//! is not transactionally coupled to document content.

use crate::TreeId;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

/// Metadata tracked for each tree, independent of its content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeMetadata {
    #[serde(rename = "id")]
    pub tree_id: TreeId,
    #[serde(skip_serializing)]
    pub owner_user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub node_count: usize,
}

/// Process-wide index of [`TreeMetadata`] keyed by tree id.
///
/// Constructed explicitly and shared by reference so every test can work
/// against an isolated instance.
#[derive(Default)]
pub struct TreeMetadataManager {
    trees: RwLock<HashMap<TreeId, TreeMetadata>>,
}

impl TreeMetadataManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tree with `created_at = last_accessed = now`.
    ///
    /// An existing record for the same id is replaced.
    pub fn create_tree(
        &self,
        tree_id: TreeId,
        owner_user_id: impl Into<String>,
        title: impl Into<String>,
        node_count: usize,
    ) -> TreeMetadata {
        let now = Utc::now();
        let record = TreeMetadata {
            tree_id: tree_id.clone(),
            owner_user_id: owner_user_id.into(),
            title: title.into(),
            created_at: now,
            last_accessed: now,
            node_count,
        };
        self.trees.write().insert(tree_id, record.clone());
        info!(tree_id = %record.tree_id, owner = %record.owner_user_id, "Tree metadata created");
        record
    }

    /// Bump `last_accessed`. Unknown ids are ignored.
    pub fn update_last_accessed(&self, tree_id: &TreeId) {
        match self.trees.write().get_mut(tree_id) {
            Some(record) => record.last_accessed = Utc::now(),
            None => debug!(tree_id = %tree_id, "No metadata to touch"),
        }
    }

    /// Trees owned by `user_id`, most recently accessed first
    pub fn get_user_trees(&self, user_id: &str) -> Vec<TreeMetadata> {
        let mut trees: Vec<TreeMetadata> = self
            .trees
            .read()
            .values()
            .filter(|record| record.owner_user_id == user_id)
            .cloned()
            .collect();
        trees.sort_by(|a, b| {
            b.last_accessed
                .cmp(&a.last_accessed)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        trees
    }

    /// Look up a single record
    pub fn get_tree(&self, tree_id: &TreeId) -> Option<TreeMetadata> {
        self.trees.read().get(tree_id).cloned()
    }

    /// Whether `user_id` owns `tree_id`. Unknown trees have no owner.
    pub fn is_owner(&self, tree_id: &TreeId, user_id: &str) -> bool {
        self.trees
            .read()
            .get(tree_id)
            .is_some_and(|record| record.owner_user_id == user_id)
    }

    /// Remove the record. Performs no authorization and leaves the
    /// replicated document untouched.
    pub fn delete_tree(&self, tree_id: &TreeId) -> bool {
        let removed = self.trees.write().remove(tree_id).is_some();
        if removed {
            info!(tree_id = %tree_id, "Tree metadata deleted");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.trees.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.read().is_empty()
    }
}
