use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ChunkRecord, SourceDocument, StoreError, VectorStore};

/// Process-local store with brute-force search. Used by tests and `--store memory`.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<ChunkRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

// every record must match `expected`, or the first record when there is none
fn check_dims(records: &[ChunkRecord], expected: Option<usize>) -> Result<(), StoreError> {
    let Some(expected) = expected.or_else(|| records.first().map(|r| r.embedding.len())) else {
        return Ok(());
    };
    match records.iter().find(|r| r.embedding.len() != expected) {
        Some(bad) => Err(StoreError::Dimension { expected, got: bad.embedding.len() }),
        None => Ok(()),
    }
}

fn l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn add(&self, records: Vec<ChunkRecord>) -> Result<usize, StoreError> {
        let mut guard = self.records.write().await;
        check_dims(&records, guard.first().map(|r| r.embedding.len()))?;
        let n = records.len();
        guard.extend(records);
        Ok(n)
    }

    async fn replace_all(&self, records: Vec<ChunkRecord>) -> Result<(u64, usize), StoreError> {
        let mut guard = self.records.write().await;
        check_dims(&records, None)?;
        let removed = guard.len() as u64;
        let n = records.len();
        *guard = records;
        Ok((removed, n))
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        let mut guard = self.records.write().await;
        let n = guard.len() as u64;
        guard.clear();
        Ok(n)
    }

    async fn delete(&self, ids: &[Uuid]) -> Result<u64, StoreError> {
        let mut guard = self.records.write().await;
        let before = guard.len();
        guard.retain(|r| !ids.contains(&r.id));
        Ok((before - guard.len()) as u64)
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SourceDocument>, StoreError> {
        let guard = self.records.read().await;
        let mut hits: Vec<SourceDocument> = guard
            .iter()
            .filter(|r| r.embedding.len() == query.len())
            .map(|r| SourceDocument {
                id: r.id,
                source: r.source.clone(),
                chunk_index: r.chunk_index,
                text: r.text.clone(),
                distance: l2(&r.embedding, query),
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.chunk_index.cmp(&b.chunk_index)));
        hits.truncate(k);
        Ok(hits)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.records.read().await.len() as u64)
    }

    fn backend(&self) -> &'static str { "memory" }
}
