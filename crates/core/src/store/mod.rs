//! Document store abstraction.
//!
//! Both engines talk to persistence through [`DocumentStore`]: a collection-oriented CRUD
//! interface over JSON documents. The store offers single-document atomicity only; callers that
//! touch more than one document are responsible for their own compensation.
//!
//! Two adapters are provided:
//! - [`MemoryStore`] keeps everything in process and backs the tests and ephemeral servers.
//! - [`FileStore`] writes one JSON file per document under a sharded directory tree.
//!
//! Duplicate detection is driven by [`UniqueIndex`] declarations made when a store is built.

mod file;
mod index;
mod memory;

#[cfg(test)]
pub(crate) mod faulty;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::constants::USER_MAILS;
use serde_json::{Map, Value};
use std::fmt;
use tt_uuid::DocumentId;

/// Key holding the store-assigned identifier inside every document.
pub const ID_FIELD: &str = "_id";

/// A stored document: a JSON object whose `_id` key holds a canonical [`DocumentId`].
pub type Document = Map<String, Value>;

/// Collections known to the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    User,
    Doctor,
    Assistant,
    PatientTemplate,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::User,
        Collection::Doctor,
        Collection::Assistant,
        Collection::PatientTemplate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::User => "User",
            Collection::Doctor => "Doctor",
            Collection::Assistant => "Assistant",
            Collection::PatientTemplate => "PatientTemplate",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by store adapters.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate key on {collection}.{field}")]
    DuplicateKey { collection: Collection, field: String },
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to (de)serialise document: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    #[error("store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, StoreError::DuplicateKey { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A field whose values must be unique across a collection.
///
/// Array-valued fields index each element separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueIndex {
    pub collection: Collection,
    pub field: String,
}

impl UniqueIndex {
    pub fn new(collection: Collection, field: impl Into<String>) -> Self {
        Self {
            collection,
            field: field.into(),
        }
    }

    /// Indexes every store gets unless the caller says otherwise.
    ///
    /// A mail address identifies at most one user. Template names are not indexed; the template
    /// engine's pre-insert lookup is the only name check.
    pub fn defaults() -> Vec<UniqueIndex> {
        vec![UniqueIndex::new(Collection::User, USER_MAILS)]
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Eq(String, Value),
    Ne(String, Value),
    Exists(String, bool),
}

/// Conjunction of field conditions.
///
/// An empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter on the store-assigned identifier.
    pub fn by_id(id: &DocumentId) -> Self {
        Self::new().eq(ID_FIELD, Value::String(id.to_string()))
    }

    /// Field equals `value`, or the field is an array containing `value`.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq(field.into(), value.into()));
        self
    }

    /// Negation of [`Filter::eq`]; an absent field counts as "not equal".
    pub fn ne(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Ne(field.into(), value.into()));
        self
    }

    /// Field is present and non-null (`true`) or absent/null (`false`).
    pub fn exists(mut self, field: impl Into<String>, present: bool) -> Self {
        self.conditions.push(Condition::Exists(field.into(), present));
        self
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.conditions.iter().all(|condition| match condition {
            Condition::Eq(field, value) => field_equals(document.get(field), value),
            Condition::Ne(field, value) => !field_equals(document.get(field), value),
            Condition::Exists(field, present) => {
                let has = !matches!(document.get(field), None | Some(Value::Null));
                has == *present
            }
        })
    }
}

fn field_equals(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        None => expected.is_null(),
        Some(Value::Array(items)) if !expected.is_array() => items.contains(expected),
        Some(actual) => actual == expected,
    }
}

/// `$set`-style update: each pair overwrites (or adds) one top-level field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    set: Vec<(String, Value)>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.push((field.into(), value.into()));
        self
    }

    /// Applies the update to `document`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidDocument`] if the update tries to change `_id`.
    pub fn apply(&self, document: &mut Document) -> StoreResult<()> {
        for (field, value) in &self.set {
            if field == ID_FIELD {
                return Err(StoreError::InvalidDocument("_id is immutable".into()));
            }
            document.insert(field.clone(), value.clone());
        }
        Ok(())
    }
}

/// Collection-oriented persistence used by both engines.
///
/// Calls block until the store has finished (or failed) the operation. Implementations must be
/// safe to share between concurrently running requests.
pub trait DocumentStore: Send + Sync {
    /// Inserts `document`, assigning `_id` if the document has none.
    fn insert_one(&self, collection: Collection, document: Document) -> StoreResult<DocumentId>;

    fn find_one(&self, collection: Collection, filter: &Filter) -> StoreResult<Option<Document>>;

    fn find_many(&self, collection: Collection, filter: &Filter) -> StoreResult<Vec<Document>>;

    /// Updates the first matching document. Returns the matched count (0 or 1).
    fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<u64>;

    /// Deletes the first matching document. Returns the deleted count (0 or 1).
    fn delete_one(&self, collection: Collection, filter: &Filter) -> StoreResult<u64>;
}

/// Reads `_id` from a stored document.
pub fn document_id(document: &Document) -> StoreResult<DocumentId> {
    let raw = document
        .get(ID_FIELD)
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::InvalidDocument("document has no string _id".into()))?;
    DocumentId::parse(raw).map_err(|e| StoreError::InvalidDocument(e.to_string()))
}

/// Ensures `document` carries an `_id`, allocating one when absent.
pub(crate) fn assign_id(document: &mut Document) -> StoreResult<DocumentId> {
    if document.contains_key(ID_FIELD) {
        return document_id(document);
    }
    let id = DocumentId::new();
    document.insert(ID_FIELD.to_owned(), Value::String(id.to_string()));
    Ok(id)
}
