//! Tree lifecycle operations behind the REST routes.
//!
//! Every operation takes an already-resolved identity; capability checks
//! happen before anything is mutated.

use arbor_core::{
    ArborError, Capability, CapabilityChecker, Identity, NodeContent, NodeTypeRegistry, Result,
    TreeId, TreeMetadata, TreeMetadataManager,
};
use arbor_llm::{ChatMessage, CompletionProvider};
use arbor_sync::schema;
use arbor_sync::patch::seed;
use arbor_sync::{DocumentRegistry, NodePatch, TreeDocument};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Title given to a duplicate when nothing better is known
const UNTITLED: &str = "Untitled";

/// Content of one node as interpreted by its type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeContentView {
    pub node_id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub content: Option<String>,
}

pub struct TreeService {
    registry: Arc<DocumentRegistry>,
    metadata: Arc<TreeMetadataManager>,
    checker: Arc<dyn CapabilityChecker>,
    provider: Arc<dyn CompletionProvider>,
    node_types: NodeTypeRegistry,
    gc_enabled: bool,
}

impl TreeService {
    pub fn new(
        registry: Arc<DocumentRegistry>,
        metadata: Arc<TreeMetadataManager>,
        checker: Arc<dyn CapabilityChecker>,
        provider: Arc<dyn CompletionProvider>,
        node_types: NodeTypeRegistry,
        gc_enabled: bool,
    ) -> Self {
        Self {
            registry,
            metadata,
            checker,
            provider,
            node_types,
            gc_enabled,
        }
    }

    pub fn registry(&self) -> &Arc<DocumentRegistry> {
        &self.registry
    }

    pub fn metadata(&self) -> &Arc<TreeMetadataManager> {
        &self.metadata
    }

    /// Seed a brand-new tree from `nodes` and register `identity` as owner
    pub fn create(
        &self,
        identity: &Identity,
        nodes: &NodePatch,
        root_id: Option<&str>,
    ) -> Result<TreeId> {
        self.checker.require(identity, Capability::CreateTree)?;

        let tree_id = TreeId::generate();
        let (_, summary) = self
            .registry
            .create_with(tree_id.clone(), self.gc_enabled, |document| {
                seed(document, nodes, root_id)
            })?;
        self.metadata.create_tree(
            tree_id.clone(),
            identity.user_id.as_str(),
            summary.root_title,
            summary.node_count,
        );

        info!(
            tree_id = %tree_id,
            user_id = %identity.user_id,
            root_id = %summary.root_id,
            nodes = summary.node_count,
            "Tree created"
        );
        Ok(tree_id)
    }

    /// Fork `source` into a new tree owned by the requester
    pub fn duplicate(&self, identity: &Identity, source: &TreeId) -> Result<TreeId> {
        self.checker.require(identity, Capability::CreateTree)?;

        let tree_id = TreeId::generate();
        let forked = self.registry.duplicate(source, tree_id.clone())?;
        let title = forked
            .root_title()
            .or_else(|| self.metadata.get_tree(source).map(|record| record.title))
            .unwrap_or_else(|| UNTITLED.to_string());
        self.metadata.create_tree(
            tree_id.clone(),
            identity.user_id.as_str(),
            title,
            forked.node_count(),
        );

        info!(
            source = %source,
            tree_id = %tree_id,
            user_id = %identity.user_id,
            "Tree duplicated"
        );
        Ok(tree_id)
    }

    pub fn list(&self, identity: &Identity) -> Vec<TreeMetadata> {
        self.metadata.get_user_trees(&identity.user_id)
    }

    pub fn get(&self, tree_id: &TreeId) -> Result<TreeMetadata> {
        self.metadata
            .get_tree(tree_id)
            .ok_or_else(|| ArborError::NotFound(format!("tree {tree_id}")))
    }

    /// Remove the metadata record. Only the owner may do so; the document
    /// itself stays registered.
    pub fn delete(&self, identity: &Identity, tree_id: &TreeId) -> Result<()> {
        if self.metadata.get_tree(tree_id).is_none() {
            return Err(ArborError::NotFound(format!("tree {tree_id}")));
        }
        if !self.metadata.is_owner(tree_id, &identity.user_id) {
            warn!(tree_id = %tree_id, user_id = %identity.user_id, "Delete refused: not owner");
            return Err(ArborError::Permission(format!(
                "user {} does not own tree {tree_id}",
                identity.user_id
            )));
        }
        self.metadata.delete_tree(tree_id);
        Ok(())
    }

    pub fn snapshot(&self, tree_id: &TreeId) -> Result<serde_json::Value> {
        Ok(self.document(tree_id)?.snapshot())
    }

    pub fn node_content(&self, tree_id: &TreeId, node_id: &str) -> Result<NodeContentView> {
        let document = self.document(tree_id)?;
        document.read(|txn, roots| {
            let node = schema::read_node(txn, roots, node_id)
                .ok_or_else(|| ArborError::NotFound(format!("node {node_id}")))?;
            let node_type = node.node_type.unwrap_or_default();
            let handler = self.content_handler(&node_type)?;
            Ok(NodeContentView {
                node_id: node.id,
                content: handler.read(&node.fields),
                node_type,
            })
        })
    }

    /// Rewrite a node's content through its type handler; connected peers
    /// receive the change like any other local mutation
    pub fn set_node_content(
        &self,
        tree_id: &TreeId,
        node_id: &str,
        content: &str,
    ) -> Result<NodeContentView> {
        let document = self.document(tree_id)?;
        document.transact(|txn, roots| {
            let node = schema::read_node(&*txn, roots, node_id)
                .ok_or_else(|| ArborError::NotFound(format!("node {node_id}")))?;
            let node_type = node.node_type.unwrap_or_default();
            let handler = self.content_handler(&node_type)?;
            let mut fields = node.fields;
            handler.write(&mut fields, content);
            schema::write_node_fields(txn, roots, node_id, &fields);
            Ok(NodeContentView {
                node_id: node.id,
                content: handler.read(&fields),
                node_type,
            })
        })
    }

    /// Forward a conversation to the completion provider. Failures are
    /// reported to the caller, never retried.
    pub async fn llm_relay(&self, identity: &Identity, messages: &[ChatMessage]) -> Result<String> {
        self.checker.require(identity, Capability::UseAi)?;
        if messages.is_empty() {
            return Err(ArborError::Validation("messages must not be empty".into()));
        }

        self.provider.complete(messages).await.map_err(|err| {
            warn!(
                provider = self.provider.provider_name(),
                user_id = %identity.user_id,
                error = %err,
                "Completion failed"
            );
            ArborError::Upstream(err.to_string())
        })
    }

    fn document(&self, tree_id: &TreeId) -> Result<Arc<TreeDocument>> {
        self.registry
            .get(tree_id)
            .ok_or_else(|| ArborError::NotFound(format!("tree {tree_id}")))
    }

    fn content_handler(&self, node_type: &str) -> Result<Arc<dyn NodeContent>> {
        self.node_types.resolve(node_type).ok_or_else(|| {
            ArborError::Validation(format!("node type '{node_type}' has no content handler"))
        })
    }
}
