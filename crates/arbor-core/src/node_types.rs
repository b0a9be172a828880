//! Pluggable node content semantics.
//!
//! The core never interprets a node's type-specific payload. Handlers are
//! registered per type tag and resolved when content must be read or
//! written, for example when applying an AI-revised text to a node.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Type-specific payload fields of a node
pub type NodeFields = Map<String, Value>;

/// Read/write access to the editable content of one node type
pub trait NodeContent: Send + Sync {
    /// Editable content, if the payload carries any
    fn read(&self, fields: &NodeFields) -> Option<String>;

    /// Replace the editable content inside the payload
    fn write(&self, fields: &mut NodeFields, content: &str);
}

/// Stores content as a plain string in a single payload field
#[derive(Debug, Clone)]
pub struct FieldContent {
    field: String,
}

impl FieldContent {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl NodeContent for FieldContent {
    fn read(&self, fields: &NodeFields) -> Option<String> {
        fields
            .get(&self.field)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn write(&self, fields: &mut NodeFields, content: &str) {
        fields.insert(self.field.clone(), Value::String(content.to_string()));
    }
}

/// Type tag -> content handler
#[derive(Default, Clone)]
pub struct NodeTypeRegistry {
    handlers: HashMap<String, Arc<dyn NodeContent>>,
}

impl NodeTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for `type_tag`
    pub fn register(&mut self, type_tag: impl Into<String>, handler: Arc<dyn NodeContent>) {
        self.handlers.insert(type_tag.into(), handler);
    }

    /// Builder form of [`register`](Self::register)
    pub fn with(mut self, type_tag: impl Into<String>, handler: Arc<dyn NodeContent>) -> Self {
        self.register(type_tag, handler);
        self
    }

    pub fn resolve(&self, type_tag: &str) -> Option<Arc<dyn NodeContent>> {
        self.handlers.get(type_tag).cloned()
    }

    pub fn type_tags(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}
