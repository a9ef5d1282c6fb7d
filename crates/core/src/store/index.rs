//! Unique-index enforcement shared by the store adapters.

use super::{Collection, Document, StoreError, StoreResult, UniqueIndex, ID_FIELD};
use serde_json::Value;

/// Values a document contributes to an index. Arrays contribute each element; null and
/// absent fields contribute nothing.
fn index_keys<'a>(document: &'a Document, field: &str) -> Vec<&'a Value> {
    match document.get(field) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(value) => vec![value],
    }
}

/// Checks `candidate` against `existing` for every index declared on `collection`.
///
/// `existing` must not contain the candidate itself (callers exclude it on update). A clash on
/// `_id` is always reported as a duplicate key.
pub(super) fn check_unique<'a>(
    indexes: &[UniqueIndex],
    collection: Collection,
    candidate: &Document,
    existing: impl IntoIterator<Item = &'a Document>,
) -> StoreResult<()> {
    let fields: Vec<&str> = std::iter::once(ID_FIELD)
        .chain(
            indexes
                .iter()
                .filter(|index| index.collection == collection)
                .map(|index| index.field.as_str()),
        )
        .collect();

    let existing: Vec<&Document> = existing.into_iter().collect();
    for field in fields {
        let keys = index_keys(candidate, field);
        if keys.is_empty() {
            continue;
        }
        let clash = existing
            .iter()
            .any(|other| index_keys(other, field).iter().any(|k| keys.contains(k)));
        if clash {
            return Err(StoreError::DuplicateKey {
                collection,
                field: field.to_owned(),
            });
        }
    }
    Ok(())
}
