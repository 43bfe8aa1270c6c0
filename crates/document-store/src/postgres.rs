use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    Document, DocumentQuery, DocumentRef, Result, StoreError,
    store::{DocumentStore, SetOptions},
};

/// PostgreSQL-backed document store.
///
/// Every collection lives in the single `documents` table as JSONB rows
/// keyed by `(collection, id)`. Collection scoping and id ordering run in
/// SQL; predicates, order, and limit are finished with
/// [`DocumentQuery::apply`] so that matching is identical to the
/// in-memory backend.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` and returns a store over the new pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        tracing::info!("running document store migrations");
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_document(collection: &str, row: PgRow) -> Result<Document> {
        let id: String = row.try_get("id")?;
        match row.try_get::<Value, _>("data")? {
            Value::Object(data) => Ok(Document::new(DocumentRef::new(collection, id), data)),
            _ => Err(StoreError::InvalidDocument(format!("{collection}/{id}"))),
        }
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn query(&self, query: &DocumentQuery) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            r#"
            SELECT id, data
            FROM documents
            WHERE collection = $1
            ORDER BY id COLLATE "C" ASC
            "#,
        )
        .bind(&query.collection)
        .fetch_all(&self.pool)
        .await?;

        let docs = rows
            .into_iter()
            .map(|row| Self::row_to_document(&query.collection, row))
            .collect::<Result<Vec<_>>>()?;

        Ok(query.apply(docs))
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, data
            FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| Self::row_to_document(collection, row))
            .transpose()
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        value: Map<String, Value>,
        options: SetOptions,
    ) -> Result<()> {
        let sql = if options.overwrite {
            r#"
            INSERT INTO documents (collection, id, data, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (collection, id) DO UPDATE SET
                data = EXCLUDED.data,
                updated_at = EXCLUDED.updated_at
            "#
        } else {
            r#"
            INSERT INTO documents (collection, id, data, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (collection, id) DO UPDATE SET
                data = documents.data || EXCLUDED.data,
                updated_at = EXCLUDED.updated_at
            "#
        };

        sqlx::query(sql)
            .bind(collection)
            .bind(id)
            .bind(Value::Object(value))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<DocumentRef>> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"SELECT id FROM documents WHERE collection = $1 ORDER BY id COLLATE "C" ASC"#,
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids
            .into_iter()
            .map(|id| DocumentRef::new(collection, id))
            .collect())
    }
}
