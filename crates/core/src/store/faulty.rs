//! Store double that fails chosen operations, for exercising compensation paths.

use super::{Collection, Document, DocumentStore, Filter, MemoryStore, StoreError, StoreResult, Update};
use std::collections::HashMap;
use std::sync::Mutex;
use tt_uuid::DocumentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Op {
    Insert,
    Update,
    Delete,
}

/// Wraps a [`MemoryStore`]; the `n`th call (1-based) of a given operation on a given collection
/// fails with an I/O error instead of reaching the inner store.
#[derive(Debug, Default)]
pub(crate) struct FaultyStore {
    pub(crate) inner: MemoryStore,
    failures: Mutex<HashMap<(Op, Collection), Vec<usize>>>,
    calls: Mutex<HashMap<(Op, Collection), usize>>,
}

impl FaultyStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            ..Self::default()
        }
    }

    pub(crate) fn fail_on(self, op: Op, collection: Collection, nth: usize) -> Self {
        self.failures
            .lock()
            .unwrap()
            .entry((op, collection))
            .or_default()
            .push(nth);
        self
    }

    /// Number of calls of `op` seen on `collection`, including failed ones.
    pub(crate) fn calls(&self, op: Op, collection: Collection) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(&(op, collection))
            .copied()
            .unwrap_or(0)
    }

    fn tick(&self, op: Op, collection: Collection) -> StoreResult<()> {
        let mut calls = self.calls.lock().unwrap();
        let count = calls.entry((op, collection)).or_insert(0);
        *count += 1;
        let should_fail = self
            .failures
            .lock()
            .unwrap()
            .get(&(op, collection))
            .is_some_and(|n| n.contains(&*count));
        if should_fail {
            return Err(StoreError::Io(std::io::Error::other(format!(
                "injected {op:?} failure on {collection}"
            ))));
        }
        Ok(())
    }
}

impl DocumentStore for FaultyStore {
    fn insert_one(&self, collection: Collection, document: Document) -> StoreResult<DocumentId> {
        self.tick(Op::Insert, collection)?;
        self.inner.insert_one(collection, document)
    }

    fn find_one(&self, collection: Collection, filter: &Filter) -> StoreResult<Option<Document>> {
        self.inner.find_one(collection, filter)
    }

    fn find_many(&self, collection: Collection, filter: &Filter) -> StoreResult<Vec<Document>> {
        self.inner.find_many(collection, filter)
    }

    fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<u64> {
        self.tick(Op::Update, collection)?;
        self.inner.update_one(collection, filter, update)
    }

    fn delete_one(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        self.tick(Op::Delete, collection)?;
        self.inner.delete_one(collection, filter)
    }
}
