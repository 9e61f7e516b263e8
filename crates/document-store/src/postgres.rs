use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row};

use crate::store::{CommitReceipt, CommitRequest, DocumentStore, WriteOp, validate_commit};
use crate::{
    Document, DocumentId, DocumentKey, DocumentQuery, DocumentStoreError, Result, SortDirection,
    Version,
};

const DOCUMENT_COLUMNS: &str = "collection, id, version, data, created_at, updated_at";

/// PostgreSQL-backed document store.
///
/// All documents live in one `documents` table keyed by `(collection, id)`
/// with a JSONB body. A commit runs inside a SQL transaction that locks every
/// precondition row with `FOR UPDATE` before checking versions.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the database at `url` with a pool of at most
    /// `max_connections`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_document(row: PgRow) -> Result<Document> {
        Ok(Document {
            key: DocumentKey {
                collection: row.try_get("collection")?,
                id: DocumentId::new(row.try_get::<String, _>("id")?),
            },
            version: Version::new(row.try_get("version")?),
            data: row.try_get("data")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        })
    }

    async fn apply_write(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        op: &WriteOp,
        now: DateTime<Utc>,
    ) -> Result<Option<Version>> {
        match op {
            WriteOp::Create { key, data } => {
                let version: i64 = sqlx::query_scalar(
                    r#"
                    INSERT INTO documents (collection, id, version, data, created_at, updated_at)
                    VALUES ($1, $2, 1, $3, $4, $4)
                    RETURNING version
                    "#,
                )
                .bind(&key.collection)
                .bind(key.id.as_str())
                .bind(data)
                .bind(now)
                .fetch_one(&mut **tx)
                .await
                .map_err(|e| {
                    if let sqlx::Error::Database(ref db_err) = e
                        && db_err.constraint() == Some("documents_pkey")
                    {
                        return DocumentStoreError::AlreadyExists(key.clone());
                    }
                    DocumentStoreError::Database(e)
                })?;
                Ok(Some(Version::new(version)))
            }
            WriteOp::Set { key, data } => {
                let version: i64 = sqlx::query_scalar(
                    r#"
                    INSERT INTO documents (collection, id, version, data, created_at, updated_at)
                    VALUES ($1, $2, 1, $3, $4, $4)
                    ON CONFLICT (collection, id) DO UPDATE SET
                        version = documents.version + 1,
                        data = EXCLUDED.data,
                        updated_at = EXCLUDED.updated_at
                    RETURNING version
                    "#,
                )
                .bind(&key.collection)
                .bind(key.id.as_str())
                .bind(data)
                .bind(now)
                .fetch_one(&mut **tx)
                .await?;
                Ok(Some(Version::new(version)))
            }
            WriteOp::Merge { key, fields } => {
                let version: Option<i64> = sqlx::query_scalar(
                    r#"
                    UPDATE documents
                    SET data = data || $3, version = version + 1, updated_at = $4
                    WHERE collection = $1 AND id = $2
                    RETURNING version
                    "#,
                )
                .bind(&key.collection)
                .bind(key.id.as_str())
                .bind(serde_json::Value::Object(fields.clone()))
                .bind(now)
                .fetch_optional(&mut **tx)
                .await?;
                version
                    .map(|v| Some(Version::new(v)))
                    .ok_or_else(|| DocumentStoreError::NotFound(key.clone()))
            }
            WriteOp::Delete { key } => {
                let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
                    .bind(&key.collection)
                    .bind(key.id.as_str())
                    .execute(&mut **tx)
                    .await?;
                if result.rows_affected() == 0 {
                    return Err(DocumentStoreError::NotFound(key.clone()));
                }
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn get(&self, key: &DocumentKey) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE collection = $1 AND id = $2"
        ))
        .bind(&key.collection)
        .bind(key.id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_document).transpose()
    }

    async fn query(&self, query: DocumentQuery) -> Result<Vec<Document>> {
        let mut sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE collection = $1");
        let mut param_count = 1;

        // Field paths are bound as text[] so that names never reach the SQL text
        for filter in &query.filters {
            sql.push_str(&format!(
                " AND data #> ${} {} ${}",
                param_count + 1,
                filter.op.as_sql(),
                param_count + 2
            ));
            param_count += 2;
        }

        if let Some((_, direction)) = &query.order_by {
            param_count += 1;
            let direction = match direction {
                SortDirection::Ascending => "ASC",
                SortDirection::Descending => "DESC",
            };
            sql.push_str(&format!(
                " ORDER BY data #> ${param_count} {direction} NULLS LAST, id ASC"
            ));
        } else {
            sql.push_str(" ORDER BY id ASC");
        }

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql).bind(&query.collection);
        for filter in &query.filters {
            sqlx_query = sqlx_query
                .bind(field_path(&filter.field))
                .bind(&filter.value);
        }
        if let Some((field, _)) = &query.order_by {
            sqlx_query = sqlx_query.bind(field_path(field));
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_document).collect()
    }

    async fn commit(&self, request: CommitRequest) -> Result<CommitReceipt> {
        validate_commit(&request)?;

        let mut tx = self.pool.begin().await?;

        // FOR UPDATE locks nothing when the row is missing, so keys expected
        // to be absent are serialized on an advisory lock held until commit.
        let mut absent: Vec<&DocumentKey> = request
            .preconditions
            .iter()
            .filter(|p| p.expected == Version::initial())
            .map(|p| &p.key)
            .collect();
        absent.sort();
        absent.dedup();
        for key in absent {
            sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1 || '/' || $2, 0))")
                .bind(&key.collection)
                .bind(key.id.as_str())
                .execute(&mut *tx)
                .await?;
        }

        for precondition in &request.preconditions {
            let version: Option<i64> = sqlx::query_scalar(
                "SELECT version FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE",
            )
            .bind(&precondition.key.collection)
            .bind(precondition.key.id.as_str())
            .fetch_optional(&mut *tx)
            .await?;

            let actual = version.map(Version::new).unwrap_or(Version::initial());
            if actual != precondition.expected {
                return Err(DocumentStoreError::ConcurrencyConflict {
                    key: precondition.key.clone(),
                    expected: precondition.expected,
                    actual,
                });
            }
        }

        let now = Utc::now();
        let mut versions = HashMap::new();
        for op in &request.writes {
            match Self::apply_write(&mut tx, op, now).await? {
                Some(version) => {
                    versions.insert(op.key().clone(), version);
                }
                None => {
                    versions.remove(op.key());
                }
            }
        }

        tx.commit().await?;
        Ok(CommitReceipt {
            commit_time: now,
            versions,
        })
    }
}

fn field_path(field: &str) -> Vec<String> {
    field.split('.').map(str::to_string).collect()
}
