//! File-backed document store.
//!
//! ## Storage layout
//!
//! ```text
//! <root>/
//!   User/
//!     <s1>/<s2>/<id>.json
//!   Doctor/
//!   Assistant/
//!   PatientTemplate/
//! ```
//!
//! `s1` and `s2` are the first four hex characters of the document id. Each document is written
//! to a sibling temp file and renamed into place, so a reader never sees a half-written file.
//! Mutations are serialised by a process-wide lock; scans skip files that fail to parse and log
//! them at `warn`.

use super::index::check_unique;
use super::{
    assign_id, document_id, Collection, Document, DocumentStore, Filter, StoreError, StoreResult,
    UniqueIndex, Update,
};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tt_uuid::DocumentId;

const EXTENSION: &str = "json";

#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    indexes: Vec<UniqueIndex>,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Opens (creating if needed) a store rooted at `root` with the default indexes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the collection directories cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        Self::open_with_indexes(root, UniqueIndex::defaults())
    }

    pub fn open_with_indexes(
        root: impl Into<PathBuf>,
        indexes: Vec<UniqueIndex>,
    ) -> StoreResult<Self> {
        let root = root.into();
        for collection in Collection::ALL {
            fs::create_dir_all(root.join(collection.as_str()))?;
        }
        tracing::debug!(root = %root.display(), "file store opened");
        Ok(Self {
            root,
            indexes,
            write_lock: Mutex::new(()),
        })
    }

    fn collection_dir(&self, collection: Collection) -> PathBuf {
        self.root.join(collection.as_str())
    }

    fn document_path(&self, collection: Collection, id: &DocumentId) -> PathBuf {
        id.sharded_file(&self.collection_dir(collection), EXTENSION)
    }

    /// Reads every parseable document in `collection`.
    fn scan(&self, collection: Collection) -> StoreResult<Vec<Document>> {
        let mut documents = Vec::new();
        let base = self.collection_dir(collection);

        let s1_iter = match fs::read_dir(&base) {
            Ok(it) => it,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(documents),
            Err(e) => return Err(e.into()),
        };

        for s1 in s1_iter.flatten() {
            let s1_path = s1.path();
            if !s1_path.is_dir() {
                continue;
            }
            let Ok(s2_iter) = fs::read_dir(&s1_path) else {
                continue;
            };
            for s2 in s2_iter.flatten() {
                let s2_path = s2.path();
                if !s2_path.is_dir() {
                    continue;
                }
                let Ok(file_iter) = fs::read_dir(&s2_path) else {
                    continue;
                };
                for entry in file_iter.flatten() {
                    let path = entry.path();
                    if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                        continue;
                    }
                    match read_document(&path) {
                        Ok(document) => documents.push(document),
                        Err(e) => {
                            tracing::warn!(path = %path.display(), error = %e, "skipping unreadable document");
                        }
                    }
                }
            }
        }

        Ok(documents)
    }

    fn write_document(&self, path: &Path, document: &Document) -> StoreResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        let raw = serde_json::to_vec_pretty(document)?;
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

fn read_document(path: &Path) -> StoreResult<Document> {
    let raw = fs::read(path)?;
    let document: Document = serde_json::from_slice(&raw)?;
    document_id(&document)?;
    Ok(document)
}

impl DocumentStore for FileStore {
    fn insert_one(&self, collection: Collection, mut document: Document) -> StoreResult<DocumentId> {
        let id = assign_id(&mut document)?;
        let _guard = self.write_lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        let existing = self.scan(collection)?;
        check_unique(&self.indexes, collection, &document, &existing)?;
        self.write_document(&self.document_path(collection, &id), &document)?;
        tracing::trace!(%collection, %id, "file store insert");
        Ok(id)
    }

    fn find_one(&self, collection: Collection, filter: &Filter) -> StoreResult<Option<Document>> {
        Ok(self.scan(collection)?.into_iter().find(|d| filter.matches(d)))
    }

    fn find_many(&self, collection: Collection, filter: &Filter) -> StoreResult<Vec<Document>> {
        let mut documents: Vec<Document> = self
            .scan(collection)?
            .into_iter()
            .filter(|d| filter.matches(d))
            .collect();
        // Directory iteration order is unspecified; keep results stable.
        documents.sort_by_key(|d| document_id(d).ok());
        Ok(documents)
    }

    fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<u64> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        let existing = self.scan(collection)?;
        let Some(current) = existing.iter().find(|d| filter.matches(d)) else {
            return Ok(0);
        };
        let id = document_id(current)?;
        let mut updated = current.clone();
        update.apply(&mut updated)?;
        check_unique(
            &self.indexes,
            collection,
            &updated,
            existing
                .iter()
                .filter(|d| document_id(d).map(|other| other != id).unwrap_or(true)),
        )?;
        self.write_document(&self.document_path(collection, &id), &updated)?;
        Ok(1)
    }

    fn delete_one(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        let Some(target) = self.scan(collection)?.into_iter().find(|d| filter.matches(d)) else {
            return Ok(0);
        };
        let id = document_id(&target)?;
        match fs::remove_file(self.document_path(collection, &id)) {
            Ok(()) => Ok(1),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}
