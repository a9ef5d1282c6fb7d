use super::index::check_unique;
use super::{
    assign_id, document_id, Collection, Document, DocumentStore, Filter, StoreError, StoreResult,
    UniqueIndex, Update,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use tt_uuid::DocumentId;

type Collections = HashMap<Collection, BTreeMap<DocumentId, Document>>;

/// In-process document store.
///
/// Every mutation takes the write lock for its whole check-and-write, so unique indexes are
/// authoritative. Documents within a collection are kept in identifier order.
#[derive(Debug)]
pub struct MemoryStore {
    indexes: Vec<UniqueIndex>,
    collections: RwLock<Collections>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Store with the [default indexes](UniqueIndex::defaults).
    pub fn new() -> Self {
        Self::with_indexes(UniqueIndex::defaults())
    }

    pub fn with_indexes(indexes: Vec<UniqueIndex>) -> Self {
        Self {
            indexes,
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Number of documents currently held in `collection`.
    pub fn count(&self, collection: Collection) -> StoreResult<usize> {
        let guard = self.collections.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(guard.get(&collection).map_or(0, BTreeMap::len))
    }
}

impl DocumentStore for MemoryStore {
    fn insert_one(&self, collection: Collection, mut document: Document) -> StoreResult<DocumentId> {
        let id = assign_id(&mut document)?;
        let mut guard = self.collections.write().map_err(|_| StoreError::LockPoisoned)?;
        let docs = guard.entry(collection).or_default();
        check_unique(&self.indexes, collection, &document, docs.values())?;
        docs.insert(id, document);
        tracing::trace!(%collection, %id, "memory store insert");
        Ok(id)
    }

    fn find_one(&self, collection: Collection, filter: &Filter) -> StoreResult<Option<Document>> {
        let guard = self.collections.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(guard
            .get(&collection)
            .and_then(|docs| docs.values().find(|d| filter.matches(d)).cloned()))
    }

    fn find_many(&self, collection: Collection, filter: &Filter) -> StoreResult<Vec<Document>> {
        let guard = self.collections.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(guard
            .get(&collection)
            .map(|docs| docs.values().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default())
    }

    fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<u64> {
        let mut guard = self.collections.write().map_err(|_| StoreError::LockPoisoned)?;
        let Some(docs) = guard.get_mut(&collection) else {
            return Ok(0);
        };
        let Some((id, current)) = docs.iter().find(|(_, d)| filter.matches(d)) else {
            return Ok(0);
        };
        let id = *id;
        let mut updated = current.clone();
        update.apply(&mut updated)?;
        check_unique(
            &self.indexes,
            collection,
            &updated,
            docs.iter().filter(|(other, _)| **other != id).map(|(_, d)| d),
        )?;
        docs.insert(id, updated);
        Ok(1)
    }

    fn delete_one(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        let mut guard = self.collections.write().map_err(|_| StoreError::LockPoisoned)?;
        let Some(docs) = guard.get_mut(&collection) else {
            return Ok(0);
        };
        let target = docs
            .values()
            .find(|d| filter.matches(d))
            .map(document_id)
            .transpose()?;
        Ok(match target {
            Some(id) => u64::from(docs.remove(&id).is_some()),
            None => 0,
        })
    }
}
