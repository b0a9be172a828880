//! Process-wide store of tree documents

use crate::{SyncError, SyncResult, TreeDocument};
use arbor_core::TreeId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

/// Default number of buffered relay frames per document
pub const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// One document per tree id, created on first reference and never evicted.
pub struct DocumentRegistry {
    documents: DashMap<TreeId, Arc<TreeDocument>>,
    broadcast_capacity: usize,
}

impl Default for DocumentRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_BROADCAST_CAPACITY)
    }
}

impl DocumentRegistry {
    pub fn new(broadcast_capacity: usize) -> Self {
        Self {
            documents: DashMap::new(),
            broadcast_capacity,
        }
    }

    /// Canonical document for `tree_id`, creating an empty one on first
    /// reference. Concurrent first references resolve to the same instance.
    pub fn get_or_create(&self, tree_id: &TreeId, gc_enabled: bool) -> Arc<TreeDocument> {
        self.documents
            .entry(tree_id.clone())
            .or_insert_with(|| {
                info!(tree_id = %tree_id, gc_enabled, "Creating document");
                Arc::new(TreeDocument::new(
                    tree_id.clone(),
                    gc_enabled,
                    self.broadcast_capacity,
                ))
            })
            .value()
            .clone()
    }

    pub fn get(&self, tree_id: &TreeId) -> Option<Arc<TreeDocument>> {
        self.documents.get(tree_id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, tree_id: &TreeId) -> bool {
        self.documents.contains_key(tree_id)
    }

    /// Build a new document for `tree_id`, run `init` on it, and register it
    /// only if `init` succeeds. Nobody can observe the document before then.
    pub fn create_with<F, T>(
        &self,
        tree_id: TreeId,
        gc_enabled: bool,
        init: F,
    ) -> SyncResult<(Arc<TreeDocument>, T)>
    where
        F: FnOnce(&TreeDocument) -> SyncResult<T>,
    {
        let document = TreeDocument::new(tree_id.clone(), gc_enabled, self.broadcast_capacity);
        let output = init(&document)?;
        match self.documents.entry(tree_id) {
            Entry::Occupied(slot) => Err(SyncError::AlreadyExists(slot.key().clone())),
            Entry::Vacant(slot) => {
                let document = Arc::new(document);
                slot.insert(Arc::clone(&document));
                info!(tree_id = %document.tree_id(), gc_enabled, "Created seeded document");
                Ok((document, output))
            }
        }
    }

    /// Fork `source` into a new document registered as `target`. The two
    /// documents share nothing afterwards.
    pub fn duplicate(&self, source: &TreeId, target: TreeId) -> SyncResult<Arc<TreeDocument>> {
        let source_doc = self
            .get(source)
            .ok_or_else(|| SyncError::NotFound(source.clone()))?;
        match self.documents.entry(target.clone()) {
            Entry::Occupied(_) => Err(SyncError::AlreadyExists(target)),
            Entry::Vacant(slot) => {
                let forked = Arc::new(source_doc.fork(target, self.broadcast_capacity)?);
                slot.insert(Arc::clone(&forked));
                info!(source = %source, target = %forked.tree_id(), "Duplicated document");
                Ok(forked)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn id(raw: &str) -> TreeId {
        TreeId::parse(raw).unwrap()
    }

    #[test]
    fn test_get_or_create_is_deduplicated() {
        let registry = DocumentRegistry::default();
        let a = registry.get_or_create(&id("t"), true);
        let b = registry.get_or_create(&id("t"), false);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.gc_enabled());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_concurrent_first_reference_yields_one_instance() {
        let registry = Arc::new(DocumentRegistry::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.get_or_create(&id("shared"), true))
            })
            .collect();
        let docs: Vec<Arc<TreeDocument>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(docs.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_get_does_not_create() {
        let registry = DocumentRegistry::default();
        assert!(registry.get(&id("missing")).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_errors() {
        let registry = DocumentRegistry::default();
        assert!(matches!(
            registry.duplicate(&id("missing"), id("copy")),
            Err(SyncError::NotFound(_))
        ));

        registry.get_or_create(&id("a"), true);
        registry.get_or_create(&id("b"), true);
        assert!(matches!(
            registry.duplicate(&id("a"), id("b")),
            Err(SyncError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_create_with_registers_only_on_success() {
        let registry = DocumentRegistry::default();
        let failed = registry.create_with(id("t"), true, |_| -> SyncResult<()> {
            Err(SyncError::InvalidPatch("bad".into()))
        });
        assert!(failed.is_err());
        assert!(!registry.contains(&id("t")));

        let (document, value) = registry.create_with(id("t"), true, |_| Ok(7)).unwrap();
        assert_eq!(value, 7);
        assert!(Arc::ptr_eq(&document, &registry.get(&id("t")).unwrap()));
        assert!(matches!(
            registry.create_with(id("t"), true, |_| Ok(())),
            Err(SyncError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_duplicate_registers_new_document() {
        let registry = DocumentRegistry::default();
        let source = registry.get_or_create(&id("a"), true);
        let forked = registry.duplicate(&id("a"), id("b")).unwrap();
        assert!(!Arc::ptr_eq(&source, &forked));
        assert!(Arc::ptr_eq(&forked, &registry.get(&id("b")).unwrap()));
    }
}
