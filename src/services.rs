use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use sqlx::postgres::PgPoolOptions;

use crate::answer::{AnswerConfig, Answerer};
use crate::encoder::{E5Encoder, EmbedArgs, Embedder, EmbedderKind, OpenAiEmbedder, OpenAiEmbedderConfig};
use crate::extract::{PdfExtractor, PdfTextExtractor};
use crate::llm::{LlmClient, OpenAiClient, OpenAiClientConfig};
use crate::pipeline::chunk::ChunkingPolicy;
use crate::pipeline::ingest::IngestPipeline;
use crate::speech::{ElevenLabsConfig, ElevenLabsSynthesizer, Synthesizer, Transcriber, WhisperConfig, WhisperTranscriber};
use crate::store::{MemoryStore, PgStore, VectorStore};

#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum StoreKind {
    /// pgvector via --dsn / DATABASE_URL
    #[value(name = "postgres")] Postgres,
    /// Process-local; contents are lost on exit
    #[value(name = "memory")] Memory,
}

#[derive(Args, Clone, Debug)]
pub struct StoreArgs {
    #[arg(long, value_enum, default_value_t = StoreKind::Postgres)]
    pub store: StoreKind,
}

pub async fn connect_pool(dsn: Option<&str>) -> Result<sqlx::PgPool> {
    let dsn = dsn.ok_or_else(|| anyhow!("Please provide --dsn or set DATABASE_URL in .env"))?;
    PgPoolOptions::new()
        .max_connections(5)
        .connect(dsn)
        .await
        .context("connect to Postgres")
}

pub async fn connect_store(dsn: Option<&str>, args: &StoreArgs) -> Result<Arc<dyn VectorStore>> {
    Ok(match args.store {
        StoreKind::Postgres => Arc::new(PgStore::new(connect_pool(dsn).await?)),
        StoreKind::Memory => Arc::new(MemoryStore::new()),
    })
}

pub async fn build_embedder(args: &EmbedArgs) -> Result<Arc<dyn Embedder>> {
    Ok(match args.embedder {
        EmbedderKind::E5 => {
            let (model, onnx, device) = (args.e5_model.clone(), args.onnx_filename.clone(), args.device);
            // model download and session build block
            let enc = tokio::task::spawn_blocking(move || E5Encoder::new(&model, onnx.as_deref(), device))
                .await
                .context("load E5 encoder")??;
            Arc::new(enc)
        }
        EmbedderKind::OpenAi => Arc::new(
            OpenAiEmbedder::new(OpenAiEmbedderConfig::from_env()).context("init OpenAI embedder")?,
        ),
    })
}

/// Collaborators for one process, built once and shared behind `Arc`s.
#[derive(Clone)]
pub struct Services {
    pub extractor: Arc<dyn PdfExtractor>,
    pub chunker: ChunkingPolicy,
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<dyn VectorStore>,
    pub llm: Arc<dyn LlmClient>,
    pub transcriber: Arc<dyn Transcriber>,
    pub synthesizer: Arc<dyn Synthesizer>,
}

impl Services {
    /// Hosted clients read their keys from the environment; a missing key
    /// fails on first use, not here.
    pub async fn connect(dsn: Option<&str>, store: &StoreArgs, embed: &EmbedArgs) -> Result<Self> {
        let store = connect_store(dsn, store).await?;
        let embedder = build_embedder(embed).await?;
        Ok(Self {
            extractor: Arc::new(PdfTextExtractor),
            chunker: ChunkingPolicy::default(),
            embedder,
            store,
            llm: Arc::new(OpenAiClient::new(OpenAiClientConfig::from_env()).context("init LLM client")?),
            transcriber: Arc::new(WhisperTranscriber::new(WhisperConfig::from_env()).context("init transcriber")?),
            synthesizer: Arc::new(ElevenLabsSynthesizer::new(ElevenLabsConfig::from_env()).context("init synthesizer")?),
        })
    }

    pub fn with_chunker(mut self, chunker: ChunkingPolicy) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn ingest_pipeline(&self) -> IngestPipeline {
        IngestPipeline::new(
            Arc::clone(&self.extractor),
            self.chunker.clone(),
            Arc::clone(&self.embedder),
            Arc::clone(&self.store),
        )
    }

    pub fn answerer(&self, cfg: AnswerConfig) -> Answerer {
        Answerer::new(Arc::clone(&self.embedder), Arc::clone(&self.store), Arc::clone(&self.llm), cfg)
    }
}

#[cfg(test)]
impl Services {
    /// Fully offline container: memory store, hashing embedder, mock LLM.
    pub fn offline(extracted: &str, llm: Arc<crate::llm::MockClient>) -> Self {
        use crate::testing::{HashEmbedder, StaticExtractor, StaticSynthesizer, StaticTranscriber};
        Self {
            extractor: Arc::new(StaticExtractor::text(extracted)),
            chunker: ChunkingPolicy::default(),
            embedder: Arc::new(HashEmbedder::default()),
            store: Arc::new(MemoryStore::new()),
            llm,
            transcriber: Arc::new(StaticTranscriber("what is this document about")),
            synthesizer: Arc::new(StaticSynthesizer),
        }
    }
}
