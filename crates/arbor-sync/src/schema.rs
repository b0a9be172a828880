//! Layout of a tree document.
//!
//! ```text
//! nodes:    { <node id>: { id, title, type?, parentId?, children: [ids], ...payload } }
//! metadata: { version, rootId }
//! ```
//!
//! A node's children are listed by id in its own `children` array, and each
//! child records its `parentId`, so both directions resolve by lookup.

use arbor_core::NodeFields;
use serde_json::{Map as JsonMap, Value};
use std::sync::Arc;
use yrs::{Any, Array, Doc, Map, MapRef, Out, ReadTxn, TransactionMut};

pub const NODES: &str = "nodes";
pub const METADATA: &str = "metadata";

pub const VERSION_KEY: &str = "version";
pub const ROOT_ID_KEY: &str = "rootId";

/// Schema version written into new and migrated documents
pub const SCHEMA_VERSION: i64 = 1;

/// Largest integer a JavaScript number holds exactly (2^53 - 1)
const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;

pub const ID: &str = "id";
pub const TITLE: &str = "title";
pub const TYPE: &str = "type";
pub const PARENT_ID: &str = "parentId";
pub const CHILDREN: &str = "children";

/// Node keys managed by the tree structure rather than the node type
pub const RESERVED_FIELDS: &[&str] = &[ID, TITLE, TYPE, PARENT_ID, CHILDREN];

/// Root-level shared types of a tree document
pub struct Roots {
    pub nodes: MapRef,
    pub metadata: MapRef,
}

impl Roots {
    pub fn of(doc: &Doc) -> Self {
        Self {
            nodes: doc.get_or_insert_map(NODES),
            metadata: doc.get_or_insert_map(METADATA),
        }
    }
}

/// Plain-data view of one node record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeView {
    pub id: String,
    pub title: Option<String>,
    pub node_type: Option<String>,
    pub parent_id: Option<String>,
    pub children: Vec<String>,
    pub fields: NodeFields,
}

fn node_map<T: ReadTxn>(txn: &T, roots: &Roots, node_id: &str) -> Option<MapRef> {
    match roots.nodes.get(txn, node_id)? {
        Out::YMap(map) => Some(map),
        _ => None,
    }
}

pub fn read_node<T: ReadTxn>(txn: &T, roots: &Roots, node_id: &str) -> Option<NodeView> {
    let node = node_map(txn, roots, node_id)?;
    let mut view = NodeView {
        id: node_id.to_string(),
        ..NodeView::default()
    };
    for (key, value) in node.iter(txn) {
        match key {
            ID => {}
            TITLE => view.title = out_as_string(&value),
            TYPE => view.node_type = out_as_string(&value),
            PARENT_ID => view.parent_id = out_as_string(&value),
            CHILDREN => view.children = child_ids(txn, &value),
            other => {
                view.fields.insert(other.to_string(), out_to_json(txn, &value));
            }
        }
    }
    Some(view)
}

fn child_ids<T: ReadTxn>(txn: &T, value: &Out) -> Vec<String> {
    match value {
        Out::YArray(array) => array
            .iter(txn)
            .filter_map(|item| out_as_string(&item))
            .collect(),
        Out::Any(Any::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Any::String(s) => Some(s.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

pub fn root_id<T: ReadTxn>(txn: &T, roots: &Roots) -> Option<String> {
    roots
        .metadata
        .get(txn, ROOT_ID_KEY)
        .and_then(|value| out_as_string(&value))
}

pub fn node_count<T: ReadTxn>(txn: &T, roots: &Roots) -> usize {
    roots.nodes.len(txn) as usize
}

/// `{ "nodes": {...}, "metadata": {...} }` with keys in sorted order
pub fn snapshot<T: ReadTxn>(txn: &T, roots: &Roots) -> Value {
    let mut out = JsonMap::new();
    out.insert(NODES.to_string(), map_to_json(txn, &roots.nodes));
    out.insert(METADATA.to_string(), map_to_json(txn, &roots.metadata));
    Value::Object(out)
}

pub fn set_node_title(
    txn: &mut TransactionMut<'_>,
    roots: &Roots,
    node_id: &str,
    title: &str,
) -> bool {
    match node_map(&*txn, roots, node_id) {
        Some(node) => {
            node.insert(txn, TITLE, Any::String(title.into()));
            true
        }
        None => false,
    }
}

/// Make the node's payload equal `fields`: changed keys are written,
/// missing keys removed, reserved keys left alone.
pub fn write_node_fields(
    txn: &mut TransactionMut<'_>,
    roots: &Roots,
    node_id: &str,
    fields: &NodeFields,
) -> bool {
    let Some(current) = read_node(&*txn, roots, node_id) else {
        return false;
    };
    let Some(node) = node_map(&*txn, roots, node_id) else {
        return false;
    };
    for (key, value) in fields {
        if RESERVED_FIELDS.contains(&key.as_str()) || current.fields.get(key) == Some(value) {
            continue;
        }
        node.insert(txn, key.as_str(), json_to_any(value));
    }
    for key in current.fields.keys() {
        if !fields.contains_key(key) {
            node.remove(txn, key);
        }
    }
    true
}

/// Write `version` and `rootId`
pub fn initialize_metadata(txn: &mut TransactionMut<'_>, roots: &Roots, root_id: &str) {
    roots
        .metadata
        .insert(txn, VERSION_KEY, integer(SCHEMA_VERSION));
    roots
        .metadata
        .insert(txn, ROOT_ID_KEY, Any::String(root_id.into()));
}

/// Backfill metadata that older documents lack.
///
/// `version` is always backfilled. `rootId` is backfilled only when a
/// parentless node exists (lowest id wins); an empty document gets no
/// invented root.
pub fn ensure_schema(txn: &mut TransactionMut<'_>, roots: &Roots) -> bool {
    let mut changed = false;
    if !roots.metadata.contains_key(&*txn, VERSION_KEY) {
        roots
            .metadata
            .insert(txn, VERSION_KEY, integer(SCHEMA_VERSION));
        changed = true;
    }
    if !roots.metadata.contains_key(&*txn, ROOT_ID_KEY) {
        let read: &TransactionMut<'_> = txn;
        let candidate = roots
            .nodes
            .iter(read)
            .filter_map(|(id, value)| match value {
                Out::YMap(node) if !node.contains_key(read, PARENT_ID) => Some(id.to_string()),
                _ => None,
            })
            .min();
        if let Some(root) = candidate {
            roots
                .metadata
                .insert(txn, ROOT_ID_KEY, Any::String(root.into()));
            changed = true;
        }
    }
    changed
}

pub fn out_as_string(value: &Out) -> Option<String> {
    match value {
        Out::Any(Any::String(s)) => Some(s.to_string()),
        _ => None,
    }
}

pub fn map_to_json<T: ReadTxn>(txn: &T, map: &MapRef) -> Value {
    let object: JsonMap<String, Value> = map
        .iter(txn)
        .map(|(key, value)| (key.to_string(), out_to_json(txn, &value)))
        .collect();
    Value::Object(object)
}

pub fn out_to_json<T: ReadTxn>(txn: &T, value: &Out) -> Value {
    match value {
        Out::Any(any) => any_to_json(any),
        Out::YMap(map) => map_to_json(txn, map),
        Out::YArray(array) => Value::Array(
            array
                .iter(txn)
                .map(|item| out_to_json(txn, &item))
                .collect(),
        ),
        _ => Value::Null,
    }
}

pub fn any_to_json(any: &Any) -> Value {
    match any {
        Any::Null | Any::Undefined => Value::Null,
        Any::Bool(b) => Value::Bool(*b),
        Any::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER as f64 => {
            Value::from(*n as i64)
        }
        Any::Number(n) => serde_json::Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Any::BigInt(n) => Value::from(*n),
        Any::String(s) => Value::String(s.to_string()),
        Any::Buffer(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
        Any::Array(items) => Value::Array(items.iter().map(any_to_json).collect()),
        Any::Map(entries) => Value::Object(
            entries
                .iter()
                .map(|(key, value)| (key.clone(), any_to_json(value)))
                .collect(),
        ),
    }
}

/// Integers are stored as plain numbers so Yjs clients read them as
/// numbers rather than bigints
fn integer(value: i64) -> Any {
    Any::Number(value as f64)
}

pub fn json_to_any(value: &Value) -> Any {
    match value {
        Value::Null => Any::Null,
        Value::Bool(b) => Any::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) if i.unsigned_abs() <= MAX_SAFE_INTEGER as u64 => integer(i),
            Some(i) => Any::BigInt(i),
            None => Any::Number(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => Any::String(s.as_str().into()),
        Value::Array(items) => {
            let items: Vec<Any> = items.iter().map(json_to_any).collect();
            Any::Array(Arc::from(items))
        }
        Value::Object(entries) => Any::Map(Arc::new(
            entries
                .iter()
                .map(|(key, value)| (key.clone(), json_to_any(value)))
                .collect(),
        )),
    }
}
