use std::sync::Arc;

use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::encoder::Embedder;
use crate::error::DocTalkError;
use crate::extract::PdfExtractor;
use crate::pipeline::chunk::{Chunk, ChunkConfig, ChunkingPolicy};
use crate::store::{ChunkRecord, VectorStore};
use crate::telemetry;
use crate::telemetry::ops::ingest::Phase;

pub const DEFAULT_EMBED_BATCH: usize = 64;

/// Extract → chunk → embed → store.
#[derive(Clone)]
pub struct IngestPipeline {
    extractor: Arc<dyn PdfExtractor>,
    chunker: ChunkingPolicy,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    batch: usize,
}

/// Text and chunks of one document, before embedding.
#[derive(Clone, Debug)]
pub struct Prepared {
    pub source: String,
    /// Chars of the extracted text, before normalization.
    pub text_length: usize,
    pub effective: ChunkConfig,
    pub chunks: Vec<Chunk>,
}

#[derive(Clone, Debug, Serialize)]
pub struct IngestReport {
    pub source: String,
    pub text_length: usize,
    pub chunks: usize,
    pub stored_documents: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaced: Option<u64>,
    pub ids: Vec<Uuid>,
}

impl IngestPipeline {
    pub fn new(
        extractor: Arc<dyn PdfExtractor>,
        chunker: ChunkingPolicy,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self { extractor, chunker, embedder, store, batch: DEFAULT_EMBED_BATCH }
    }

    pub fn with_batch(mut self, batch: usize) -> Self {
        self.batch = batch.max(1);
        self
    }

    pub fn prepare(&self, source: &str, bytes: &[u8]) -> Result<Prepared, DocTalkError> {
        prepare_document(self.extractor.as_ref(), &self.chunker, source, bytes)
    }

    /// Embed and store prepared chunks. With `replace`, the new chunks take the
    /// place of everything stored, in one step after embedding succeeded.
    pub async fn store(&self, prepared: Prepared, replace: bool) -> Result<IngestReport, DocTalkError> {
        let log = telemetry::ingest();

        let mut records: Vec<ChunkRecord> = Vec::with_capacity(prepared.chunks.len());
        for batch in prepared.chunks.chunks(self.batch) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self
                .embedder
                .embed_passages(&texts)
                .instrument(log.span(&Phase::Embed))
                .await?;
            if vectors.len() != texts.len() {
                return Err(crate::encoder::EmbedError::Count { expected: texts.len(), got: vectors.len() }.into());
            }
            for (chunk, embedding) in batch.iter().zip(vectors) {
                records.push(ChunkRecord {
                    id: Uuid::new_v4(),
                    source: prepared.source.clone(),
                    chunk_index: chunk.index,
                    text: chunk.text.clone(),
                    model: self.embedder.model_tag().to_string(),
                    embedding,
                });
            }
        }

        let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
        let (replaced, stored) = if replace {
            let (n, stored) = self.store.replace_all(records).instrument(log.span(&Phase::Replace)).await?;
            log.info(format!("Replaced {} existing chunk(s)", n));
            (Some(n), stored)
        } else {
            (None, self.store.add(records).instrument(log.span(&Phase::Store)).await?)
        };
        log.summary(&prepared.source, prepared.text_length, prepared.chunks.len(), stored);

        Ok(IngestReport {
            source: prepared.source,
            text_length: prepared.text_length,
            chunks: prepared.chunks.len(),
            stored_documents: stored,
            replaced,
            ids,
        })
    }

    /// Full run. Extraction and chunking happen off the async executor.
    pub async fn ingest(&self, source: &str, bytes: Vec<u8>, replace: bool) -> Result<IngestReport, DocTalkError> {
        let this = self.clone();
        let name = source.to_string();
        let prepared = tokio::task::spawn_blocking(move || this.prepare(&name, &bytes))
            .await
            .map_err(|e| DocTalkError::Internal(e.to_string()))??;
        self.store(prepared, replace).await
    }
}

/// Extract and chunk. Empty text and zero chunks are reported as errors.
pub fn prepare_document(
    extractor: &dyn PdfExtractor,
    chunker: &ChunkingPolicy,
    source: &str,
    bytes: &[u8],
) -> Result<Prepared, DocTalkError> {
    let log = telemetry::ingest();
    let text = {
        let _s = log.span(&Phase::Extract).entered();
        extractor.extract(bytes)?
    };
    let text_length = text.chars().count();
    if text.trim().is_empty() {
        log.warn(format!("No text extracted from {}", source));
        return Err(DocTalkError::NoText);
    }

    let out = {
        let _s = log.span(&Phase::Split).entered();
        chunker.split_detailed(&text)?
    };
    log.info_kv("chunked", [
        ("source", source.to_string()),
        ("text_length", text_length.to_string()),
        ("chunk_size", out.effective.chunk_size.to_string()),
        ("chunk_overlap", out.effective.chunk_overlap.to_string()),
        ("chunks", out.chunks.len().to_string()),
    ]);
    if out.chunks.is_empty() {
        log.warn(format!("No chunks created from {}", source));
        return Err(DocTalkError::NoChunks);
    }
    Ok(Prepared { source: source.to_string(), text_length, effective: out.effective, chunks: out.chunks })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, SourceDocument, StoreError};
    use crate::testing::{long_document, HashEmbedder, StaticExtractor};

    /// Reads from the wrapped store; every write fails.
    struct ReadOnlyStore(MemoryStore);

    #[async_trait::async_trait]
    impl VectorStore for ReadOnlyStore {
        async fn add(&self, _records: Vec<ChunkRecord>) -> Result<usize, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }
        async fn replace_all(&self, _records: Vec<ChunkRecord>) -> Result<(u64, usize), StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }
        async fn delete_all(&self) -> Result<u64, StoreError> { self.0.delete_all().await }
        async fn delete(&self, ids: &[Uuid]) -> Result<u64, StoreError> { self.0.delete(ids).await }
        async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SourceDocument>, StoreError> {
            self.0.search(query, k).await
        }
        async fn count(&self) -> Result<u64, StoreError> { self.0.count().await }
        fn backend(&self) -> &'static str { "read-only" }
    }

    fn pipeline(text: &str, store: Arc<MemoryStore>) -> IngestPipeline {
        IngestPipeline::new(
            Arc::new(StaticExtractor::text(text)),
            ChunkingPolicy::default(),
            Arc::new(HashEmbedder::default()),
            store,
        )
        .with_batch(2)
    }

    #[tokio::test]
    async fn ingest_stores_every_kept_chunk_with_metadata() {
        let store = Arc::new(MemoryStore::new());
        let text = long_document();
        let report = pipeline(&text, store.clone()).ingest("paper.pdf", b"%PDF".to_vec(), true).await.unwrap();

        assert!(report.chunks >= 3);
        assert_eq!(report.stored_documents, report.chunks);
        assert_eq!(report.text_length, text.chars().count());
        assert_eq!(report.ids.len(), report.chunks);
        assert_eq!(store.count().await.unwrap(), report.chunks as u64);

        let hits = store.search(&HashEmbedder::default().vector("zebra"), 100).await.unwrap();
        let mut indices: Vec<usize> = hits.iter().map(|h| h.chunk_index).collect();
        indices.sort_unstable();
        assert_eq!(indices, (0..report.chunks).collect::<Vec<_>>());
        assert!(hits.iter().all(|h| h.source == "paper.pdf"));
    }

    #[tokio::test]
    async fn replace_clears_previous_documents() {
        let store = Arc::new(MemoryStore::new());
        let text = long_document();
        let first = pipeline(&text, store.clone()).ingest("a.pdf", vec![], false).await.unwrap();
        let second = pipeline(&text, store.clone()).ingest("b.pdf", vec![], true).await.unwrap();
        assert_eq!(second.replaced, Some(first.stored_documents as u64));
        assert_eq!(store.count().await.unwrap(), second.stored_documents as u64);

        let third = pipeline(&text, store.clone()).ingest("c.pdf", vec![], false).await.unwrap();
        assert_eq!(third.replaced, None);
        assert_eq!(store.count().await.unwrap(), (second.stored_documents + third.stored_documents) as u64);
    }

    #[tokio::test]
    async fn failed_replace_leaves_previous_document_searchable() {
        let text = long_document();
        let seed = Arc::new(MemoryStore::new());
        let first = pipeline(&text, seed.clone()).ingest("a.pdf", vec![], false).await.unwrap();
        let Ok(inner) = Arc::try_unwrap(seed) else { panic!("store still shared") };

        let store = Arc::new(ReadOnlyStore(inner));
        let p = IngestPipeline::new(
            Arc::new(StaticExtractor::text(&text)),
            ChunkingPolicy::default(),
            Arc::new(HashEmbedder::default()),
            store.clone(),
        );
        let err = p.ingest("b.pdf", vec![], true).await.unwrap_err();
        assert_eq!(err.kind(), "storage");
        assert_eq!(store.count().await.unwrap(), first.stored_documents as u64);
        let hits = store.search(&HashEmbedder::default().vector("zebra"), 1).await.unwrap();
        assert_eq!(hits[0].source, "a.pdf");
    }

    #[tokio::test]
    async fn whitespace_only_text_is_no_text() {
        let store = Arc::new(MemoryStore::new());
        let err = pipeline("  \n\n ", store.clone()).ingest("blank.pdf", vec![], true).await.unwrap_err();
        assert!(matches!(err, DocTalkError::NoText));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn tiny_text_yields_no_chunks() {
        let store = Arc::new(MemoryStore::new());
        let err = pipeline("Too short to keep.", store).ingest("tiny.pdf", vec![], true).await.unwrap_err();
        assert!(matches!(err, DocTalkError::NoChunks));
    }

    #[tokio::test]
    async fn extraction_failure_is_tagged() {
        let p = IngestPipeline::new(
            Arc::new(StaticExtractor::failing("broken xref")),
            ChunkingPolicy::default(),
            Arc::new(HashEmbedder::default()),
            Arc::new(MemoryStore::new()),
        );
        let err = p.ingest("bad.pdf", vec![], true).await.unwrap_err();
        assert_eq!(err.kind(), "extraction");
    }
}
