use async_trait::async_trait;
use pgvector::Vector as PgVector;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use super::{ChunkRecord, SourceDocument, StoreError, VectorStore};

/// pgvector-backed store over `doctalk.chunk` (see `migrations/`).
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[async_trait]
impl VectorStore for PgStore {
    async fn add(&self, records: Vec<ChunkRecord>) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await?;
        insert_records(&mut tx, &records).await?;
        tx.commit().await?;
        Ok(records.len())
    }

    async fn replace_all(&self, records: Vec<ChunkRecord>) -> Result<(u64, usize), StoreError> {
        let mut tx = self.pool.begin().await?;
        // concurrent replacers queue here; readers keep the old rows until commit
        sqlx::query("LOCK TABLE doctalk.chunk IN EXCLUSIVE MODE").execute(&mut *tx).await?;
        let removed = sqlx::query("DELETE FROM doctalk.chunk").execute(&mut *tx).await?.rows_affected();
        insert_records(&mut tx, &records).await?;
        tx.commit().await?;
        Ok((removed, records.len()))
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        let res = sqlx::query("DELETE FROM doctalk.chunk").execute(&self.pool).await?;
        Ok(res.rows_affected())
    }

    async fn delete(&self, ids: &[Uuid]) -> Result<u64, StoreError> {
        if ids.is_empty() { return Ok(0); }
        let res = sqlx::query("DELETE FROM doctalk.chunk WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SourceDocument>, StoreError> {
        // rows of another dimension cannot be compared with <->
        let rows = sqlx::query(
            r#"
            SELECT id, source, chunk_index, text, (embedding <-> $1) AS distance
            FROM doctalk.chunk
            WHERE dim = $2
            ORDER BY distance ASC, chunk_index ASC
            LIMIT $3
            "#,
        )
        .bind(PgVector::from(query.to_vec()))
        .bind(query.len() as i32)
        .bind(k as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| SourceDocument {
                id: row.get::<Uuid, _>("id"),
                source: row.get::<String, _>("source"),
                chunk_index: row.get::<i32, _>("chunk_index") as usize,
                text: row.get::<String, _>("text"),
                distance: row.get::<f64, _>("distance") as f32,
            })
            .collect())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let n = sqlx::query_scalar::<_, i64>("SELECT count(*) FROM doctalk.chunk")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as u64)
    }

    fn backend(&self) -> &'static str { "postgres" }
}

async fn insert_records(tx: &mut Transaction<'_, Postgres>, records: &[ChunkRecord]) -> Result<(), StoreError> {
    for r in records {
        sqlx::query(
            r#"
            INSERT INTO doctalk.chunk (id, source, chunk_index, text, model, dim, embedding)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(r.id)
        .bind(&r.source)
        .bind(r.chunk_index as i32)
        .bind(&r.text)
        .bind(&r.model)
        .bind(r.embedding.len() as i32)
        .bind(PgVector::from(r.embedding.clone()))
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}
