//! Generic repository over any [`Document`] collection.

use std::marker::PhantomData;

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::store::CollectionSpec;
use super::{Document, DocumentStore, ListQuery, Page, RepositoryError, UnitOfWork};

/// Repository for one document collection.
pub struct Repository<'a, D> {
    store: &'a DocumentStore,
    _doc: PhantomData<fn() -> D>,
}

impl<'a, D: Document> Repository<'a, D> {
    /// Create a new repository.
    #[must_use]
    pub const fn new(store: &'a DocumentStore) -> Self {
        Self {
            store,
            _doc: PhantomData,
        }
    }

    /// List one page of documents, optionally filtered by search terms.
    ///
    /// A document matches when some search field contains every
    /// whitespace-separated term, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a document fails to decode.
    pub async fn list(&self, query: &ListQuery) -> Result<Page<D>, RepositoryError> {
        let (docs, total) = self.store.list(CollectionSpec::of::<D>(), query).await?;
        Ok(Page::new(decode_all(docs)?, query, total))
    }

    /// All documents, sorted by the collection's sort field.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a document fails to decode.
    pub async fn all(&self) -> Result<Vec<D>, RepositoryError> {
        decode_all(self.store.all(CollectionSpec::of::<D>()).await?)
    }

    /// Get a document by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the document fails to decode.
    pub async fn get(&self, id: D::Id) -> Result<Option<D>, RepositoryError> {
        self.store
            .get(D::COLLECTION, id.into())
            .await?
            .map(decode)
            .transpose()
    }

    /// Get several documents, in the order given. Missing ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a document fails to decode.
    pub async fn get_many(&self, ids: &[D::Id]) -> Result<Vec<D>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = ids.iter().map(|id| (*id).into()).collect();
        decode_all(self.store.get_many(D::COLLECTION, &ids).await?)
    }

    /// First document whose `field` equals `value`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the document fails to decode.
    pub async fn find_by(&self, field: &str, value: &str) -> Result<Option<D>, RepositoryError> {
        Ok(self.filter_by(field, value).await?.into_iter().next())
    }

    /// Every document whose `field` equals `value`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a document fails to decode.
    pub async fn filter_by(&self, field: &str, value: &str) -> Result<Vec<D>, RepositoryError> {
        decode_all(self.store.filter_by(D::COLLECTION, field, value).await?)
    }

    /// Insert a new document.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a unique field is already taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, doc: D) -> Result<D, RepositoryError> {
        let mut uow = UnitOfWork::new();
        uow.insert(&doc)?;
        self.store.commit(&uow).await?;
        tracing::debug!(collection = D::COLLECTION, id = %doc.id(), "document created");
        Ok(doc)
    }

    /// Overwrite the fields present in `patch`; returns the updated document
    /// or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a unique field is already taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update(
        &self,
        id: D::Id,
        patch: &impl Serialize,
    ) -> Result<Option<D>, RepositoryError> {
        let mut uow = UnitOfWork::new();
        uow.merge::<D>(id, patch)?;
        match self.store.commit(&uow).await {
            Ok(()) => self.get(id).await,
            Err(RepositoryError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Hard-delete a document. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: D::Id) -> Result<bool, RepositoryError> {
        let mut uow = UnitOfWork::new();
        uow.delete::<D>(id);
        match self.store.commit(&uow).await {
            Ok(()) => {
                tracing::debug!(collection = D::COLLECTION, %id, "document deleted");
                Ok(true)
            }
            Err(RepositoryError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

fn decode<D: Document>(value: Value) -> Result<D, RepositoryError> {
    serde_json::from_value(value).map_err(|e| {
        RepositoryError::DataCorruption(format!("invalid {} document: {e}", D::COLLECTION))
    })
}

fn decode_all<D: Document>(values: Vec<Value>) -> Result<Vec<D>, RepositoryError> {
    values.into_iter().map(decode).collect()
}
