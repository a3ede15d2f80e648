use crate::merge::deep_merge;
use crate::traits::{ensure_object, DocumentStore, DocumentStoreResult};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};

/// PostgreSQL-backed document store.
///
/// All collections share one `documents` table keyed by `(collection, id)`;
/// bodies are stored as JSONB.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool and apply pending migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> DocumentStoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!(max_connections, "Document store connected");

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    #[tracing::instrument(skip(self, document), fields(db.table = "documents", db.operation = "upsert"))]
    async fn replace(&self, collection: &str, id: &str, document: Value) -> DocumentStoreResult<()> {
        ensure_object(&document)?;

        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, body, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (collection, id)
            DO UPDATE SET body = EXCLUDED.body, updated_at = NOW()
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Json(document))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self, partial), fields(db.table = "documents", db.operation = "merge"))]
    async fn merge_into(
        &self,
        collection: &str,
        id: &str,
        partial: Value,
    ) -> DocumentStoreResult<()> {
        ensure_object(&partial)?;

        let mut tx = self.pool.begin().await?;

        // Make sure a row exists so concurrent merges serialize on its lock
        sqlx::query(
            "INSERT INTO documents (collection, id) VALUES ($1, $2) ON CONFLICT (collection, id) DO NOTHING",
        )
        .bind(collection)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let Json(mut body) = sqlx::query_scalar::<Postgres, Json<Value>>(
            "SELECT body FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE",
        )
        .bind(collection)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        deep_merge(&mut body, partial);

        sqlx::query(
            "UPDATE documents SET body = $3, updated_at = NOW() WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .bind(Json(body))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "documents", db.operation = "delete"))]
    async fn delete(&self, collection: &str, id: &str) -> DocumentStoreResult<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "documents", db.operation = "select"))]
    async fn get(&self, collection: &str, id: &str) -> DocumentStoreResult<Option<Value>> {
        let body = sqlx::query_scalar::<Postgres, Json<Value>>(
            "SELECT body FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(body.map(|Json(value)| value))
    }
}
