//! Atomic batches of document writes.
//!
//! A [`UnitOfWork`] collects writes across collections and is applied by
//! [`DocumentStore::commit`](super::DocumentStore::commit) as one atomic step:
//! either every write lands or none does. A write that targets a missing
//! document fails the whole batch with [`RepositoryError::NotFound`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{Document, RepositoryError};

/// A single write inside a unit of work.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Insert a new document.
    Insert {
        collection: &'static str,
        unique: &'static [&'static str],
        id: Uuid,
        body: Value,
    },
    /// Overwrite the listed top-level fields of an existing document.
    Merge {
        collection: &'static str,
        unique: &'static [&'static str],
        id: Uuid,
        patch: Map<String, Value>,
    },
    /// Add `by` to an integer field (missing counts as zero).
    Increment {
        collection: &'static str,
        id: Uuid,
        field: &'static str,
        by: i64,
    },
    /// Push values onto an array field (missing counts as empty).
    Append {
        collection: &'static str,
        id: Uuid,
        field: &'static str,
        values: Vec<Value>,
    },
    /// Remove a document.
    Delete { collection: &'static str, id: Uuid },
}

impl Write {
    /// Collection the write targets.
    #[must_use]
    pub const fn collection(&self) -> &'static str {
        match self {
            Self::Insert { collection, .. }
            | Self::Merge { collection, .. }
            | Self::Increment { collection, .. }
            | Self::Append { collection, .. }
            | Self::Delete { collection, .. } => collection,
        }
    }

    /// Document the write targets.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        match self {
            Self::Insert { id, .. }
            | Self::Merge { id, .. }
            | Self::Increment { id, .. }
            | Self::Append { id, .. }
            | Self::Delete { id, .. } => *id,
        }
    }
}

/// An ordered batch of writes applied atomically.
#[derive(Debug, Clone)]
pub struct UnitOfWork {
    writes: Vec<Write>,
    touched_at: DateTime<Utc>,
}

impl Default for UnitOfWork {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitOfWork {
    /// Start an empty batch. Updated documents get `updated_at` set to now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            writes: Vec::new(),
            touched_at: Utc::now(),
        }
    }

    /// Queue an insert of `doc`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the document does not
    /// serialize to a JSON object.
    pub fn insert<D: Document>(&mut self, doc: &D) -> Result<&mut Self, RepositoryError> {
        let body = serde_json::to_value(doc)?;
        if !body.is_object() {
            return Err(RepositoryError::DataCorruption(format!(
                "{} document is not an object",
                D::COLLECTION
            )));
        }
        self.writes.push(Write::Insert {
            collection: D::COLLECTION,
            unique: D::UNIQUE_FIELDS,
            id: doc.id().into(),
            body,
        });
        Ok(self)
    }

    /// Queue a partial update of document `id` with the fields of `patch`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the patch does not
    /// serialize to a JSON object.
    pub fn merge<D: Document>(
        &mut self,
        id: D::Id,
        patch: &impl Serialize,
    ) -> Result<&mut Self, RepositoryError> {
        let Value::Object(mut patch) = serde_json::to_value(patch)? else {
            return Err(RepositoryError::DataCorruption(format!(
                "{} patch is not an object",
                D::COLLECTION
            )));
        };
        patch.remove("id");
        patch.remove("created_at");
        self.writes.push(Write::Merge {
            collection: D::COLLECTION,
            unique: D::UNIQUE_FIELDS,
            id: id.into(),
            patch,
        });
        Ok(self)
    }

    /// Queue an increment of an integer field.
    pub fn increment<D: Document>(&mut self, id: D::Id, field: &'static str, by: i64) -> &mut Self {
        self.writes.push(Write::Increment {
            collection: D::COLLECTION,
            id: id.into(),
            field,
            by,
        });
        self
    }

    /// Queue an append onto an array field.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if a value fails to serialize.
    pub fn append<D: Document, V: Serialize>(
        &mut self,
        id: D::Id,
        field: &'static str,
        values: &[V],
    ) -> Result<&mut Self, RepositoryError> {
        let values = values
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        self.writes.push(Write::Append {
            collection: D::COLLECTION,
            id: id.into(),
            field,
            values,
        });
        Ok(self)
    }

    /// Queue a delete.
    pub fn delete<D: Document>(&mut self, id: D::Id) -> &mut Self {
        self.writes.push(Write::Delete {
            collection: D::COLLECTION,
            id: id.into(),
        });
        self
    }

    /// Queue an already built write.
    pub fn push(&mut self, write: Write) -> &mut Self {
        self.writes.push(write);
        self
    }

    /// The queued writes, in order.
    #[must_use]
    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    /// Timestamp stamped into `updated_at` of modified documents.
    #[must_use]
    pub const fn touched_at(&self) -> DateTime<Utc> {
        self.touched_at
    }

    /// `touched_at` in the JSON form documents store it in.
    #[must_use]
    pub fn touched_at_json(&self) -> Value {
        Value::String(self.touched_at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true))
    }

    /// Whether nothing has been queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}
