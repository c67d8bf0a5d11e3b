//! In-memory document backend.
//!
//! All collections sit behind one `RwLock`, so a unit of work is applied
//! under a single write guard and readers never observe half of it.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::store::{CollectionSpec, field_text};
use super::{ListQuery, RepositoryError, UnitOfWork, Write};

type Collections = HashMap<&'static str, HashMap<Uuid, Value>>;
type Staged = HashMap<(&'static str, Uuid), Option<Value>>;

/// Process-local document storage.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    collections: Arc<RwLock<Collections>>,
}

impl MemoryBackend {
    pub(crate) async fn list(&self, spec: CollectionSpec, query: &ListQuery) -> (Vec<Value>, u64) {
        let terms = query.terms();
        let guard = self.collections.read().await;
        let mut matching: Vec<(Uuid, &Value)> = guard
            .get(spec.name)
            .into_iter()
            .flat_map(HashMap::iter)
            .filter(|(_, doc)| query.filters.iter().all(|f| f.accepts(doc)))
            .filter(|(_, doc)| matches_terms(doc, spec.search_fields, &terms))
            .map(|(id, doc)| (*id, doc))
            .collect();
        sort_by_field(&mut matching, spec);

        let total = matching.len() as u64;
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.limit).unwrap_or(usize::MAX);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, doc)| doc.clone())
            .collect();
        (items, total)
    }

    pub(crate) async fn all(&self, spec: CollectionSpec) -> Vec<Value> {
        let guard = self.collections.read().await;
        let mut docs: Vec<(Uuid, &Value)> = guard
            .get(spec.name)
            .into_iter()
            .flat_map(HashMap::iter)
            .map(|(id, doc)| (*id, doc))
            .collect();
        sort_by_field(&mut docs, spec);
        docs.into_iter().map(|(_, doc)| doc.clone()).collect()
    }

    pub(crate) async fn get(&self, collection: &'static str, id: Uuid) -> Option<Value> {
        let guard = self.collections.read().await;
        guard.get(collection)?.get(&id).cloned()
    }

    pub(crate) async fn get_many(&self, collection: &'static str, ids: &[Uuid]) -> Vec<Value> {
        let guard = self.collections.read().await;
        let Some(docs) = guard.get(collection) else {
            return Vec::new();
        };
        ids.iter().filter_map(|id| docs.get(id).cloned()).collect()
    }

    pub(crate) async fn filter_by(
        &self,
        collection: &'static str,
        field: &str,
        value: &str,
    ) -> Vec<Value> {
        let guard = self.collections.read().await;
        guard
            .get(collection)
            .into_iter()
            .flat_map(HashMap::values)
            .filter(|doc| field_text(doc, field).as_deref() == Some(value))
            .cloned()
            .collect()
    }

    pub(crate) async fn commit(&self, uow: &UnitOfWork) -> Result<(), RepositoryError> {
        let touched_at = uow.touched_at_json();
        let mut guard = self.collections.write().await;
        let mut staged: Staged = HashMap::new();

        for write in uow.writes() {
            let key = (write.collection(), write.id());
            let current = match staged.get(&key) {
                Some(pending) => pending.clone(),
                None => guard.get(key.0).and_then(|docs| docs.get(&key.1)).cloned(),
            };

            let next = match write {
                Write::Insert { body, unique, .. } => {
                    if current.is_some() {
                        return Err(RepositoryError::Conflict(format!(
                            "{} {} already exists",
                            key.0, key.1
                        )));
                    }
                    ensure_unique(&guard, &staged, key, body, unique)?;
                    Some(body.clone())
                }
                Write::Merge { patch, unique, .. } => {
                    let mut doc = current.ok_or(RepositoryError::NotFound)?;
                    let object = as_object(&mut doc)?;
                    for (field, value) in patch {
                        object.insert(field.clone(), value.clone());
                    }
                    object.insert("updated_at".to_owned(), touched_at.clone());
                    ensure_unique(&guard, &staged, key, &doc, unique)?;
                    Some(doc)
                }
                Write::Increment { field, by, .. } => {
                    let mut doc = current.ok_or(RepositoryError::NotFound)?;
                    let object = as_object(&mut doc)?;
                    let base = object.get(*field).and_then(Value::as_i64).unwrap_or(0);
                    let total = base
                        .checked_add(*by)
                        .ok_or_else(|| RepositoryError::OutOfRange((*field).to_owned()))?;
                    object.insert((*field).to_owned(), Value::from(total));
                    object.insert("updated_at".to_owned(), touched_at.clone());
                    Some(doc)
                }
                Write::Append { field, values, .. } => {
                    let mut doc = current.ok_or(RepositoryError::NotFound)?;
                    let object = as_object(&mut doc)?;
                    let entry = object
                        .entry((*field).to_owned())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    let Value::Array(items) = entry else {
                        return Err(RepositoryError::DataCorruption(format!(
                            "{field} is not an array"
                        )));
                    };
                    items.extend(values.iter().cloned());
                    object.insert("updated_at".to_owned(), touched_at.clone());
                    Some(doc)
                }
                Write::Delete { .. } => {
                    current.ok_or(RepositoryError::NotFound)?;
                    None
                }
            };
            staged.insert(key, next);
        }

        for ((collection, id), doc) in staged {
            let docs = guard.entry(collection).or_default();
            match doc {
                Some(doc) => {
                    docs.insert(id, doc);
                }
                None => {
                    docs.remove(&id);
                }
            }
        }
        Ok(())
    }
}

fn as_object(doc: &mut Value) -> Result<&mut serde_json::Map<String, Value>, RepositoryError> {
    doc.as_object_mut()
        .ok_or_else(|| RepositoryError::DataCorruption("document is not an object".to_owned()))
}

/// Every term must occur in at least one of `fields` (case-insensitive).
fn matches_terms(doc: &Value, fields: &[&str], terms: &[String]) -> bool {
    if terms.is_empty() {
        return true;
    }
    fields.iter().any(|field| {
        field_text(doc, field).is_some_and(|text| {
            let text = text.to_lowercase();
            terms.iter().all(|term| text.contains(term.as_str()))
        })
    })
}

/// Case-insensitive order on the sort field; documents without it go last,
/// ties go by id.
fn sort_by_field(docs: &mut [(Uuid, &Value)], spec: CollectionSpec) {
    let key = |doc: &Value| field_text(doc, spec.sort_field).map(|t| t.to_lowercase());
    if spec.descending {
        docs.sort_by_cached_key(|(id, doc)| {
            let text = key(doc);
            (text.is_none(), Reverse(text), *id)
        });
    } else {
        docs.sort_by_cached_key(|(id, doc)| {
            let text = key(doc);
            (text.is_none(), text, *id)
        });
    }
}

fn ensure_unique(
    guard: &Collections,
    staged: &Staged,
    key: (&'static str, Uuid),
    doc: &Value,
    unique: &[&str],
) -> Result<(), RepositoryError> {
    let (collection, id) = key;
    for field in unique {
        let Some(value) = doc.get(*field).filter(|v| !v.is_null()) else {
            continue;
        };
        let stored = guard
            .get(collection)
            .into_iter()
            .flat_map(HashMap::iter)
            .filter(|(other, _)| !staged.contains_key(&(collection, **other)))
            .map(|(other, body)| (*other, body));
        let pending = staged
            .iter()
            .filter(|((c, _), _)| *c == collection)
            .filter_map(|((_, other), body)| body.as_ref().map(|b| (*other, b)));

        if stored
            .chain(pending)
            .any(|(other, body)| other != id && body.get(*field) == Some(value))
        {
            return Err(RepositoryError::Conflict(format!("{field} already exists")));
        }
    }
    Ok(())
}
