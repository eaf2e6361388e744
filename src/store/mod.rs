pub mod memory;
pub mod pg;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use pg::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("vector has dimension {got}, index holds {expected}")]
    Dimension { expected: usize, got: usize },
}

/// One embedded chunk handed to the store.
#[derive(Clone, Debug)]
pub struct ChunkRecord {
    pub id: Uuid,
    pub source: String,
    pub chunk_index: usize,
    pub text: String,
    pub model: String,
    pub embedding: Vec<f32>,
}

/// A retrieved chunk. Smaller `distance` is closer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SourceDocument {
    pub id: Uuid,
    pub source: String,
    pub chunk_index: usize,
    pub text: String,
    pub distance: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Returns how many records were stored.
    async fn add(&self, records: Vec<ChunkRecord>) -> Result<usize, StoreError>;
    /// Swap the whole store for `records` atomically. On error nothing changes.
    /// Returns the removed and stored counts.
    async fn replace_all(&self, records: Vec<ChunkRecord>) -> Result<(u64, usize), StoreError>;
    async fn delete_all(&self) -> Result<u64, StoreError>;
    async fn delete(&self, ids: &[Uuid]) -> Result<u64, StoreError>;
    /// Nearest `k` chunks by L2 distance, closest first.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SourceDocument>, StoreError>;
    async fn count(&self) -> Result<u64, StoreError>;
    fn backend(&self) -> &'static str;
}
