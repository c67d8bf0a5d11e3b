//! Backend selection for document storage.

use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Document, ListQuery, MemoryBackend, PgBackend, RepositoryError, UnitOfWork};

/// Static description of a collection, taken from its [`Document`] impl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: &'static str,
    pub search_fields: &'static [&'static str],
    pub sort_field: &'static str,
    pub descending: bool,
}

impl CollectionSpec {
    /// Collection layout of document type `D`.
    #[must_use]
    pub const fn of<D: Document>() -> Self {
        Self {
            name: D::COLLECTION,
            search_fields: D::SEARCH_FIELDS,
            sort_field: D::SORT_FIELD,
            descending: D::SORT_DESCENDING,
        }
    }
}

/// Where documents live.
#[derive(Clone)]
pub enum DocumentStore {
    /// Process-local maps.
    Memory(MemoryBackend),
    /// `PostgreSQL` `document` table.
    Postgres(PgBackend),
}

impl DocumentStore {
    /// An empty in-memory store.
    #[must_use]
    pub fn memory() -> Self {
        Self::Memory(MemoryBackend::default())
    }

    /// A store over a `PostgreSQL` pool.
    #[must_use]
    pub const fn postgres(pool: PgPool) -> Self {
        Self::Postgres(PgBackend::new(pool))
    }

    /// Check the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if `PostgreSQL` does not answer.
    pub async fn ping(&self) -> Result<(), RepositoryError> {
        match self {
            Self::Memory(_) => Ok(()),
            Self::Postgres(pg) => pg.ping().await,
        }
    }

    pub(crate) async fn list(
        &self,
        spec: CollectionSpec,
        query: &ListQuery,
    ) -> Result<(Vec<Value>, u64), RepositoryError> {
        match self {
            Self::Memory(mem) => Ok(mem.list(spec, query).await),
            Self::Postgres(pg) => pg.list(spec, query).await,
        }
    }

    pub(crate) async fn all(&self, spec: CollectionSpec) -> Result<Vec<Value>, RepositoryError> {
        match self {
            Self::Memory(mem) => Ok(mem.all(spec).await),
            Self::Postgres(pg) => pg.all(spec).await,
        }
    }

    pub(crate) async fn get(
        &self,
        collection: &'static str,
        id: Uuid,
    ) -> Result<Option<Value>, RepositoryError> {
        match self {
            Self::Memory(mem) => Ok(mem.get(collection, id).await),
            Self::Postgres(pg) => pg.get(collection, id).await,
        }
    }

    pub(crate) async fn get_many(
        &self,
        collection: &'static str,
        ids: &[Uuid],
    ) -> Result<Vec<Value>, RepositoryError> {
        match self {
            Self::Memory(mem) => Ok(mem.get_many(collection, ids).await),
            Self::Postgres(pg) => pg.get_many(collection, ids).await,
        }
    }

    pub(crate) async fn filter_by(
        &self,
        collection: &'static str,
        field: &str,
        value: &str,
    ) -> Result<Vec<Value>, RepositoryError> {
        match self {
            Self::Memory(mem) => Ok(mem.filter_by(collection, field, value).await),
            Self::Postgres(pg) => pg.filter_by(collection, field, value).await,
        }
    }

    /// Apply every write of `uow` atomically.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if a write targets a missing
    /// document, `RepositoryError::Conflict` on a unique field clash, and
    /// `RepositoryError::Database` for backend failures. Nothing is applied
    /// when an error is returned.
    pub async fn commit(&self, uow: &UnitOfWork) -> Result<(), RepositoryError> {
        if uow.is_empty() {
            return Ok(());
        }
        match self {
            Self::Memory(mem) => mem.commit(uow).await,
            Self::Postgres(pg) => pg.commit(uow).await,
        }
    }
}

/// Value of `field` rendered as sortable / searchable text.
pub(crate) fn field_text(doc: &Value, field: &str) -> Option<String> {
    match doc.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
