//! A single replicated tree document and its update broadcaster.
//!
//! All access to the underlying `yrs::Doc` goes through one mutex, so
//! operations on the same document are totally ordered. Every operation is
//! synchronous and bounded; none of them hold the lock across an await.

use crate::protocol::AwarenessUpdate;
use crate::schema::{self, NodeView, Roots};
use crate::{SyncError, SyncResult};
use arbor_core::{NodeFields, TreeId};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;
use yrs::updates::decoder::Decode;
use yrs::{Doc, Options, ReadTxn, StateVector, Transact, Transaction, TransactionMut, Update};

/// v1 encoding of an update that carries no changes
const EMPTY_UPDATE: [u8; 2] = [0, 0];

/// Identifies one realtime connection; used as the origin of relayed frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payload fanned out to the subscribers of a document
#[derive(Debug, Clone)]
pub enum RelayFrame {
    /// Incremental CRDT update (v1 encoding)
    Update(Arc<[u8]>),
    /// Awareness (presence) update, relayed without being interpreted
    Awareness(Arc<AwarenessUpdate>),
}

/// A broadcast event. `origin` is `None` for mutations made by this
/// process, so they reach every subscriber.
#[derive(Debug, Clone)]
pub struct Relay {
    pub origin: Option<ConnectionId>,
    pub frame: RelayFrame,
}

/// The canonical in-memory document of one tree
pub struct TreeDocument {
    tree_id: TreeId,
    gc_enabled: bool,
    doc: Mutex<Doc>,
    relay: broadcast::Sender<Relay>,
}

impl TreeDocument {
    /// Create an empty document. `gc_enabled = false` keeps tombstoned
    /// content so full history stays available.
    pub fn new(tree_id: TreeId, gc_enabled: bool, broadcast_capacity: usize) -> Self {
        let options = Options {
            skip_gc: !gc_enabled,
            ..Options::default()
        };
        let (relay, _) = broadcast::channel(broadcast_capacity.max(1));
        Self {
            tree_id,
            gc_enabled,
            doc: Mutex::new(Doc::with_options(options)),
            relay,
        }
    }

    pub fn tree_id(&self) -> &TreeId {
        &self.tree_id
    }

    pub fn gc_enabled(&self) -> bool {
        self.gc_enabled
    }

    /// Full document state as a single v1 update
    pub fn encode_state(&self) -> Vec<u8> {
        self.read(|txn, _| txn.encode_state_as_update_v1(&StateVector::default()))
    }

    /// State vector: the compact summary of which updates this replica has
    /// already seen
    pub fn state_vector(&self) -> StateVector {
        self.read(|txn, _| txn.state_vector())
    }

    /// Updates a peer is missing given its state vector
    pub fn encode_diff(&self, remote: &StateVector) -> Vec<u8> {
        self.read(|txn, _| txn.encode_state_as_update_v1(remote))
    }

    /// Merge a v1 update. Commutative, associative and idempotent: the
    /// same set of updates yields the same state in any delivery order.
    pub fn apply_update(&self, data: &[u8]) -> SyncResult<()> {
        let update =
            Update::decode_v1(data).map_err(|e| SyncError::Decode(format!("update: {e}")))?;
        let doc = self.doc.lock();
        let mut txn = doc.transact_mut();
        txn.apply_update(update)
            .map_err(|e| SyncError::Apply(e.to_string()))?;
        Ok(())
    }

    /// Merge an update received from `origin` and relay it to every other
    /// subscriber. Empty updates are merged but not relayed.
    pub fn apply_remote(&self, origin: ConnectionId, data: &[u8]) -> SyncResult<()> {
        self.apply_update(data)?;
        if data != EMPTY_UPDATE {
            self.publish(Some(origin), RelayFrame::Update(Arc::from(data)));
        }
        Ok(())
    }

    /// Relay an awareness update to every other subscriber
    pub fn publish_awareness(&self, origin: ConnectionId, update: AwarenessUpdate) {
        self.publish(Some(origin), RelayFrame::Awareness(Arc::new(update)));
    }

    /// Run a local mutation; whatever it changed is broadcast to all
    /// subscribers as one update
    pub fn transact<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut TransactionMut<'_>, &Roots) -> R,
    {
        let (result, update) = {
            let doc = self.doc.lock();
            let roots = Roots::of(&doc);
            let mut txn = doc.transact_mut();
            let result = f(&mut txn, &roots);
            (result, txn.encode_update_v1())
        };
        if update.as_slice() != EMPTY_UPDATE {
            self.publish(None, RelayFrame::Update(Arc::from(update)));
        }
        result
    }

    /// Run a read-only closure against a consistent view
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Transaction<'_>, &Roots) -> R,
    {
        let doc = self.doc.lock();
        let roots = Roots::of(&doc);
        let txn = doc.transact();
        f(&txn, &roots)
    }

    /// Copy the complete current state into a new, independent document.
    ///
    /// The snapshot is taken under this document's lock: writes committed
    /// before it are included, later writes are not.
    pub fn fork(&self, tree_id: TreeId, broadcast_capacity: usize) -> SyncResult<TreeDocument> {
        let forked = TreeDocument::new(tree_id, self.gc_enabled, broadcast_capacity);
        forked.apply_update(&self.encode_state())?;
        debug!(source = %self.tree_id, target = %forked.tree_id, "Forked document");
        Ok(forked)
    }

    /// Register a subscriber for relayed frames
    pub fn subscribe(&self) -> broadcast::Receiver<Relay> {
        self.relay.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.relay.receiver_count()
    }

    fn publish(&self, origin: Option<ConnectionId>, frame: RelayFrame) {
        // No subscribers is the common case for documents nobody has open.
        let _ = self.relay.send(Relay { origin, frame });
    }

    pub fn node(&self, node_id: &str) -> Option<NodeView> {
        self.read(|txn, roots| schema::read_node(txn, roots, node_id))
    }

    pub fn root_id(&self) -> Option<String> {
        self.read(|txn, roots| schema::root_id(txn, roots))
    }

    /// Title of the node `metadata.rootId` points at
    pub fn root_title(&self) -> Option<String> {
        self.read(|txn, roots| {
            let root = schema::root_id(txn, roots)?;
            schema::read_node(txn, roots, &root)?.title
        })
    }

    pub fn node_count(&self) -> usize {
        self.read(|txn, roots| schema::node_count(txn, roots))
    }

    /// Deterministic JSON view of both namespaces
    pub fn snapshot(&self) -> serde_json::Value {
        self.read(|txn, roots| schema::snapshot(txn, roots))
    }

    pub fn set_node_title(&self, node_id: &str, title: &str) -> bool {
        self.transact(|txn, roots| schema::set_node_title(txn, roots, node_id, title))
    }

    /// Replace a node's type-specific payload fields
    pub fn write_node_fields(&self, node_id: &str, fields: &NodeFields) -> bool {
        self.transact(|txn, roots| schema::write_node_fields(txn, roots, node_id, fields))
    }

    /// Backfill required metadata fields; returns whether anything changed
    pub fn ensure_schema(&self) -> bool {
        self.transact(|txn, roots| schema::ensure_schema(txn, roots))
    }
}

impl fmt::Debug for TreeDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeDocument")
            .field("tree_id", &self.tree_id)
            .field("gc_enabled", &self.gc_enabled)
            .field("subscribers", &self.relay.receiver_count())
            .finish()
    }
}
