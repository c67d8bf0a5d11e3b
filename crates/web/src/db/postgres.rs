//! `PostgreSQL` document backend.
//!
//! Documents live in one table:
//!
//! ```sql
//! document (collection TEXT, id UUID, body JSONB, PRIMARY KEY (collection, id))
//! ```
//!
//! Unique fields are enforced by partial expression indexes named
//! `document_unique_<collection>_<field>` (see `migrations/`). Queries use the
//! runtime `sqlx::query` API because field names are data, not columns.

use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use super::store::CollectionSpec;
use super::{Filter, ListQuery, RepositoryError, UnitOfWork, Write};

const SEARCH_FILTER: &str = r"
    collection = $1
    AND (cardinality($2::text[]) = 0 OR EXISTS (
        SELECT 1 FROM unnest($3::text[]) AS f(name)
        WHERE body ->> f.name ILIKE ALL ($2::text[])
    ))";

/// Document storage in `PostgreSQL`.
#[derive(Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    /// Create a backend over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub(crate) async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    pub(crate) async fn list(
        &self,
        spec: CollectionSpec,
        query: &ListQuery,
    ) -> Result<(Vec<Value>, u64), RepositoryError> {
        let patterns: Vec<String> = query.terms().iter().map(|t| like_pattern(t)).collect();

        let count_sql = format!(
            "SELECT COUNT(*) FROM document WHERE {SEARCH_FILTER}{}",
            filter_clause(&query.filters, 4)
        );
        let mut count = sqlx::query_scalar::<sqlx::Postgres, i64>(&count_sql)
            .bind(spec.name)
            .bind(&patterns)
            .bind(spec.search_fields);
        for filter in &query.filters {
            let (field, value) = filter.parts();
            count = count.bind(field).bind(value.clone());
        }
        let total = count.fetch_one(&self.pool).await?;

        let items_sql = format!(
            "SELECT body FROM document WHERE {SEARCH_FILTER}{}
             ORDER BY lower(body ->> $4) {}, id
             LIMIT $5 OFFSET $6",
            filter_clause(&query.filters, 7),
            order(spec)
        );
        let mut items = sqlx::query_scalar::<sqlx::Postgres, Value>(&items_sql)
            .bind(spec.name)
            .bind(&patterns)
            .bind(spec.search_fields)
            .bind(spec.sort_field)
            .bind(i64::from(query.limit))
            .bind(i64::try_from(query.offset()).unwrap_or(i64::MAX));
        for filter in &query.filters {
            let (field, value) = filter.parts();
            items = items.bind(field).bind(value.clone());
        }
        let items = items.fetch_all(&self.pool).await?;

        Ok((items, u64::try_from(total).unwrap_or_default()))
    }

    pub(crate) async fn all(&self, spec: CollectionSpec) -> Result<Vec<Value>, RepositoryError> {
        let docs = sqlx::query_scalar(&format!(
            "SELECT body FROM document WHERE collection = $1
             ORDER BY lower(body ->> $2) {}, id",
            order(spec)
        ))
        .bind(spec.name)
        .bind(spec.sort_field)
        .fetch_all(&self.pool)
        .await?;
        Ok(docs)
    }

    pub(crate) async fn get(
        &self,
        collection: &'static str,
        id: Uuid,
    ) -> Result<Option<Value>, RepositoryError> {
        let doc = sqlx::query_scalar("SELECT body FROM document WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(doc)
    }

    pub(crate) async fn get_many(
        &self,
        collection: &'static str,
        ids: &[Uuid],
    ) -> Result<Vec<Value>, RepositoryError> {
        let docs = sqlx::query_scalar(
            "SELECT d.body FROM unnest($2::uuid[]) WITH ORDINALITY AS wanted(id, ord)
             JOIN document d ON d.collection = $1 AND d.id = wanted.id
             ORDER BY wanted.ord",
        )
        .bind(collection)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(docs)
    }

    pub(crate) async fn filter_by(
        &self,
        collection: &'static str,
        field: &str,
        value: &str,
    ) -> Result<Vec<Value>, RepositoryError> {
        let docs = sqlx::query_scalar(
            "SELECT body FROM document WHERE collection = $1 AND body ->> $2 = $3",
        )
        .bind(collection)
        .bind(field)
        .bind(value)
        .fetch_all(&self.pool)
        .await?;
        Ok(docs)
    }

    pub(crate) async fn commit(&self, uow: &UnitOfWork) -> Result<(), RepositoryError> {
        let touched_at = uow.touched_at_json();
        let mut tx = self.pool.begin().await?;

        for write in uow.writes() {
            match write {
                Write::Insert {
                    collection,
                    unique,
                    id,
                    body,
                } => {
                    sqlx::query("INSERT INTO document (collection, id, body) VALUES ($1, $2, $3)")
                        .bind(*collection)
                        .bind(*id)
                        .bind(body)
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| map_write_error(e, collection, unique))?;
                }
                Write::Merge {
                    collection,
                    unique,
                    id,
                    patch,
                } => {
                    let mut patch = patch.clone();
                    patch.insert("updated_at".to_owned(), touched_at.clone());
                    let updated: Option<Uuid> = sqlx::query_scalar(
                        "UPDATE document SET body = body || $3
                         WHERE collection = $1 AND id = $2
                         RETURNING id",
                    )
                    .bind(*collection)
                    .bind(*id)
                    .bind(Value::Object(patch))
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| map_write_error(e, collection, unique))?;
                    updated.ok_or(RepositoryError::NotFound)?;
                }
                Write::Increment {
                    collection,
                    id,
                    field,
                    by,
                } => {
                    let updated: Option<Uuid> = sqlx::query_scalar(
                        "UPDATE document SET body = jsonb_set(
                             body, ARRAY[$3::text],
                             to_jsonb(COALESCE((body ->> $3)::bigint, 0) + $4::bigint)
                         ) || jsonb_build_object('updated_at', $5::jsonb)
                         WHERE collection = $1 AND id = $2
                         RETURNING id",
                    )
                    .bind(*collection)
                    .bind(*id)
                    .bind(*field)
                    .bind(*by)
                    .bind(&touched_at)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| map_range_error(e, field))?;
                    updated.ok_or(RepositoryError::NotFound)?;
                }
                Write::Append {
                    collection,
                    id,
                    field,
                    values,
                } => {
                    let updated: Option<Uuid> = sqlx::query_scalar(
                        "UPDATE document SET body = jsonb_set(
                             body, ARRAY[$3::text],
                             COALESCE(body -> $3, '[]'::jsonb) || $4::jsonb
                         ) || jsonb_build_object('updated_at', $5::jsonb)
                         WHERE collection = $1 AND id = $2
                         RETURNING id",
                    )
                    .bind(*collection)
                    .bind(*id)
                    .bind(*field)
                    .bind(Value::Array(values.clone()))
                    .bind(&touched_at)
                    .fetch_optional(&mut *tx)
                    .await?;
                    updated.ok_or(RepositoryError::NotFound)?;
                }
                Write::Delete { collection, id } => {
                    let deleted: Option<Uuid> = sqlx::query_scalar(
                        "DELETE FROM document WHERE collection = $1 AND id = $2 RETURNING id",
                    )
                    .bind(*collection)
                    .bind(*id)
                    .fetch_optional(&mut *tx)
                    .await?;
                    deleted.ok_or(RepositoryError::NotFound)?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

/// Sort direction; documents without the sort field go last either way.
const fn order(spec: CollectionSpec) -> &'static str {
    if spec.descending {
        "DESC NULLS LAST"
    } else {
        "ASC NULLS LAST"
    }
}

/// `AND` clauses for `filters`, numbering parameters from `first`. Each
/// filter binds its field name then its JSON value.
fn filter_clause(filters: &[Filter], first: usize) -> String {
    filters
        .iter()
        .enumerate()
        .map(|(i, filter)| {
            let (field, value) = (first + 2 * i, first + 2 * i + 1);
            match filter {
                Filter::Eq(..) => format!(" AND body -> ${field} = ${value}::jsonb"),
                Filter::EqOrUnset(..) => format!(
                    " AND COALESCE(body -> ${field}, 'null'::jsonb) IN ('null'::jsonb, ${value}::jsonb)"
                ),
            }
        })
        .collect()
}

/// `ILIKE` pattern matching `term` literally anywhere in the text.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Map `numeric_value_out_of_range` to `OutOfRange`.
fn map_range_error(e: sqlx::Error, field: &str) -> RepositoryError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.code().as_deref() == Some("22003") => {
            RepositoryError::OutOfRange(field.to_owned())
        }
        other => RepositoryError::Database(other),
    }
}

/// Map unique violations to `Conflict`, naming the field when the index is ours.
fn map_write_error(e: sqlx::Error, collection: &str, unique: &[&str]) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        let constraint = db_err.constraint().unwrap_or_default();
        let prefix = format!("document_unique_{collection}_");
        let field = unique
            .iter()
            .find(|field| constraint.strip_prefix(&prefix) == Some(**field));
        return match field {
            Some(field) => RepositoryError::Conflict(format!("{field} already exists")),
            None => RepositoryError::Conflict(format!("{collection} already exists")),
        };
    }
    RepositoryError::Database(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("maize"), "%maize%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn test_filter_clause_numbers_parameters_in_pairs() {
        let filters = [
            Filter::EqOrUnset("admin", Value::String("a1".into())),
            Filter::Eq("read", Value::Bool(false)),
        ];
        assert_eq!(
            filter_clause(&filters, 4),
            " AND COALESCE(body -> $4, 'null'::jsonb) IN ('null'::jsonb, $5::jsonb) \
             AND body -> $6 = $7::jsonb"
        );
        assert!(filter_clause(&[], 7).is_empty());
    }

    #[test]
    fn test_missing_sort_values_go_last() {
        let spec = CollectionSpec {
            name: "notifications",
            search_fields: &["message"],
            sort_field: "created_at",
            descending: true,
        };
        assert_eq!(order(spec), "DESC NULLS LAST");
        assert_eq!(order(CollectionSpec { descending: false, ..spec }), "ASC NULLS LAST");
    }
}
