//! Seeding a new tree from a nested node description.
//!
//! The whole patch is validated before the document is touched, and all
//! nodes are written in one transaction, so a malformed patch leaves no
//! trace.

use crate::schema::{self, Roots, CHILDREN, ID, PARENT_ID, TITLE, TYPE};
use crate::{SyncError, SyncResult, TreeDocument};
use arbor_core::NodeFields;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use yrs::{Any, Array, ArrayPrelim, ArrayRef, Map, MapPrelim, MapRef, TransactionMut};

/// Nested description of a node and its descendants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePatch {
    pub id: String,
    pub title: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodePatch>,
    /// Type-specific payload, stored on the node as-is
    #[serde(flatten)]
    pub fields: NodeFields,
}

/// What a successful seed produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedSummary {
    pub root_id: String,
    pub root_title: String,
    pub node_count: usize,
}

impl NodePatch {
    /// Parse and validate an untyped request body
    pub fn from_value(value: serde_json::Value) -> SyncResult<Self> {
        let patch: NodePatch = serde_json::from_value(value)
            .map_err(|e| SyncError::InvalidPatch(e.to_string()))?;
        patch.validate()?;
        Ok(patch)
    }

    /// Check every level: non-empty `id` and `title`, ids unique across the
    /// patch, no reserved keys smuggled in as payload.
    pub fn validate(&self) -> SyncResult<()> {
        let mut seen = HashSet::new();
        self.validate_into(&mut seen)
    }

    fn validate_into<'a>(&'a self, seen: &mut HashSet<&'a str>) -> SyncResult<()> {
        if self.id.trim().is_empty() {
            return Err(SyncError::InvalidPatch("node without id".into()));
        }
        if self.title.trim().is_empty() {
            return Err(SyncError::InvalidPatch(format!("node {} has no title", self.id)));
        }
        if !seen.insert(self.id.as_str()) {
            return Err(SyncError::InvalidPatch(format!("duplicate node id {}", self.id)));
        }
        if self.fields.contains_key(PARENT_ID) {
            return Err(SyncError::InvalidPatch(format!(
                "node {} sets reserved field {PARENT_ID}",
                self.id
            )));
        }
        self.children
            .iter()
            .try_for_each(|child| child.validate_into(seen))
    }

    /// Number of nodes in the patch
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(NodePatch::len).sum::<usize>()
    }

    pub fn find(&self, node_id: &str) -> Option<&NodePatch> {
        if self.id == node_id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(node_id))
    }
}

/// Seed `document` with `patch` and initialize its metadata.
///
/// `root_id` defaults to the patch's top-level id and must name a node in
/// the patch.
pub fn seed(
    document: &TreeDocument,
    patch: &NodePatch,
    root_id: Option<&str>,
) -> SyncResult<SeedSummary> {
    patch.validate()?;
    let root = root_id.unwrap_or(&patch.id);
    let root_node = patch
        .find(root)
        .ok_or_else(|| SyncError::InvalidPatch(format!("root {root} is not in the patch")))?;
    let summary = SeedSummary {
        root_id: root_node.id.clone(),
        root_title: root_node.title.clone(),
        node_count: patch.len(),
    };

    document.transact(|txn, roots| {
        insert_node(txn, roots, patch, None);
        schema::initialize_metadata(txn, roots, &summary.root_id);
    });
    Ok(summary)
}

fn insert_node(
    txn: &mut TransactionMut<'_>,
    roots: &Roots,
    patch: &NodePatch,
    parent_id: Option<&str>,
) {
    let node: MapRef = roots
        .nodes
        .insert(txn, patch.id.as_str(), MapPrelim::default());
    node.insert(txn, ID, Any::String(patch.id.as_str().into()));
    node.insert(txn, TITLE, Any::String(patch.title.as_str().into()));
    if let Some(node_type) = &patch.node_type {
        node.insert(txn, TYPE, Any::String(node_type.as_str().into()));
    }
    if let Some(parent) = parent_id {
        node.insert(txn, PARENT_ID, Any::String(parent.into()));
    }
    for (key, value) in &patch.fields {
        node.insert(txn, key.as_str(), schema::json_to_any(value));
    }

    let children: ArrayRef = node.insert(txn, CHILDREN, ArrayPrelim::default());
    for child in &patch.children {
        children.push_back(txn, Any::String(child.id.as_str().into()));
    }
    for child in &patch.children {
        insert_node(txn, roots, child, Some(&patch.id));
    }
}
