//! Document storage for FarmFusion.
//!
//! Every collection (admins, customers, roles, permissions, inventory,
//! images, restock history, notifications, settings) is a set of JSON
//! documents addressed by UUID. A single generic [`Repository`] serves all of
//! them; the [`Document`] impl on each model supplies the collection name,
//! search fields, sort field and unique fields.
//!
//! Two backends implement the storage contract:
//!
//! - [`MemoryBackend`] - process-local maps, used in development and tests
//! - [`PgBackend`] - a single `PostgreSQL` `document` table with JSONB bodies
//!
//! Multi-document writes (restock plus history, image attachment) go through
//! a [`UnitOfWork`] which both backends apply atomically.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/web/migrations/` and run via:
//! ```bash
//! cargo run -p farmfusion-cli -- migrate
//! ```

use std::time::Duration;

use secrecy::ExposeSecret;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use uuid::Uuid;

pub mod inventory;
pub mod memory;
pub mod postgres;
pub mod repository;
pub mod settings;
pub mod store;
pub mod unit_of_work;

pub use inventory::{InventoryRepository, RestockInput};
pub use memory::MemoryBackend;
pub use postgres::PgBackend;
pub use repository::Repository;
pub use settings::SettingsRepository;
pub use store::DocumentStore;
pub use unit_of_work::{UnitOfWork, Write};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Requested document was not found.
    #[error("not found")]
    NotFound,

    /// Data in the store is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// A numeric field would leave its range.
    #[error("value out of range: {0}")]
    OutOfRange(String),

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        Self::DataCorruption(err.to_string())
    }
}

/// A persisted document type.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Typed identifier of this document.
    type Id: Copy + Eq + std::hash::Hash + std::fmt::Display + Into<Uuid> + From<Uuid> + Send + Sync;

    /// Collection name.
    const COLLECTION: &'static str;

    /// Text fields searched by [`Repository::list`].
    const SEARCH_FIELDS: &'static [&'static str];

    /// Field lists are sorted by (case-insensitive).
    const SORT_FIELD: &'static str;

    /// Sort newest or largest first.
    const SORT_DESCENDING: bool = false;

    /// Fields whose non-null values must be unique within the collection.
    const UNIQUE_FIELDS: &'static [&'static str] = &[];

    /// The document's id.
    fn id(&self) -> Self::Id;
}

/// Equality constraint on a top-level document field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// The field holds exactly this value.
    Eq(&'static str, Value),
    /// The field holds this value, is null, or is missing.
    EqOrUnset(&'static str, Value),
}

impl Filter {
    /// Field name and compared value.
    #[must_use]
    pub const fn parts(&self) -> (&'static str, &Value) {
        match self {
            Self::Eq(field, value) | Self::EqOrUnset(field, value) => (*field, value),
        }
    }

    pub(crate) fn accepts(&self, doc: &Value) -> bool {
        match self {
            Self::Eq(field, value) => doc.get(*field) == Some(value),
            Self::EqOrUnset(field, value) => doc
                .get(*field)
                .is_none_or(|found| found.is_null() || found == value),
        }
    }
}

/// Parameters for a paginated, searchable list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// 1-based page number.
    pub page: u32,
    /// Whitespace separated search terms.
    pub search_term: Option<String>,
    /// Page size.
    pub limit: u32,
    /// Constraints every listed document satisfies.
    pub filters: Vec<Filter>,
}

impl ListQuery {
    /// Build a query, clamping `page` and `limit` to at least 1.
    #[must_use]
    pub fn new(page: u32, search_term: Option<String>, limit: u32) -> Self {
        Self {
            page: page.max(1),
            search_term: search_term.filter(|t| !t.trim().is_empty()),
            limit: limit.max(1),
            filters: Vec::new(),
        }
    }

    /// Add a field constraint.
    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Lower-cased search terms; empty when there is no search.
    #[must_use]
    pub fn terms(&self) -> Vec<String> {
        self.search_term
            .as_deref()
            .map(|t| t.split_whitespace().map(str::to_lowercase).collect())
            .unwrap_or_default()
    }

    /// Number of documents to skip.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

/// One page of a list result.
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// Documents on this page.
    pub items: Vec<T>,
    /// Current page (1-based).
    pub page: u32,
    /// `ceil(total / limit)`; zero when nothing matches.
    pub total_pages: u64,
    /// Number of matching documents across all pages.
    pub total: u64,
}

impl<T> Page<T> {
    pub(crate) fn new(items: Vec<T>, query: &ListQuery, total: u64) -> Self {
        Self {
            items,
            page: query.page,
            total_pages: total.div_ceil(u64::from(query.limit)),
            total,
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_clamps_and_trims() {
        let query = ListQuery::new(0, Some("   ".to_string()), 0);
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 1);
        assert!(query.search_term.is_none());
        assert!(query.terms().is_empty());
    }

    #[test]
    fn test_filters_match_set_and_unset_fields() {
        let owner = serde_json::json!("a1");
        let direct = serde_json::json!({"admin": "a1", "read": false});
        let other = serde_json::json!({"admin": "b2", "read": true});
        let broadcast = serde_json::json!({"admin": null, "read": false});
        let legacy = serde_json::json!({"read": false});

        let addressed = Filter::EqOrUnset("admin", owner.clone());
        assert!(addressed.accepts(&direct));
        assert!(!addressed.accepts(&other));
        assert!(addressed.accepts(&broadcast));
        assert!(addressed.accepts(&legacy));

        let exact = Filter::Eq("admin", owner);
        assert!(exact.accepts(&direct));
        assert!(!exact.accepts(&broadcast));
        assert!(!exact.accepts(&legacy));
        assert!(Filter::Eq("read", Value::Bool(true)).accepts(&other));
    }

    #[test]
    fn test_list_query_terms_are_lowercased() {
        let query = ListQuery::new(2, Some("Maize  SEED".to_string()), 10);
        assert_eq!(query.terms(), vec!["maize".to_string(), "seed".to_string()]);
        assert_eq!(query.offset(), 10);
    }

    #[test]
    fn test_total_pages_rounds_up_and_zero_matches_is_zero() {
        let query = ListQuery::new(1, None, 10);
        assert_eq!(Page::<()>::new(vec![], &query, 0).total_pages, 0);
        assert_eq!(Page::<()>::new(vec![], &query, 10).total_pages, 1);
        assert_eq!(Page::<()>::new(vec![], &query, 11).total_pages, 2);
    }
}
