pub mod service;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::encoder::EmbedArgs;
use crate::extract::PdfTextExtractor;
use crate::pipeline::chunk::{ChunkArgs, ChunkConfig};
use crate::services::{Services, StoreArgs};
use crate::telemetry;
use crate::telemetry::ops::ingest::Phase as IngestPhase;

pub use service::{prepare_document, IngestPipeline, IngestReport, Prepared};

#[derive(Args)]
pub struct IngestCmd {
    /// PDF to ingest
    file: PathBuf,
    /// Name stored with each chunk (defaults to the file name)
    #[arg(long)]
    source: Option<String>,
    /// Delete every stored chunk before adding this document
    #[arg(long, default_value_t = false)]
    replace: bool,
    #[arg(long, default_value_t = service::DEFAULT_EMBED_BATCH)]
    batch: usize,
    #[arg(long, default_value_t = false)]
    apply: bool,
    #[arg(long, default_value_t = 10)]
    plan_limit: usize,
    #[command(flatten)]
    chunking: ChunkArgs,
    #[command(flatten)]
    embed: EmbedArgs,
    #[command(flatten)]
    store: StoreArgs,
}

#[derive(Serialize)]
struct IngestPlan {
    source: String,
    text_length: usize,
    effective: ChunkConfig,
    chunks: usize,
    replace: bool,
    sample: Vec<String>,
}

pub async fn run(dsn: Option<&str>, args: IngestCmd) -> Result<()> {
    let log = telemetry::ingest();
    let _g = log.root_span_kv([
        ("file", args.file.display().to_string()),
        ("replace", args.replace.to_string()),
        ("apply", args.apply.to_string()),
        ("store", format!("{:?}", args.store.store)),
        ("embedder", format!("{:?}", args.embed.embedder)),
    ]).entered();

    let policy = args.chunking.policy().context("chunking config")?;
    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("read {}", args.file.display()))?;
    let source = args.source.clone().unwrap_or_else(|| {
        args.file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| args.file.display().to_string())
    });

    if !args.apply {
        let _sp = log.span(&IngestPhase::Plan).entered();
        let prepared = prepare_document(&PdfTextExtractor, &policy, &source, &bytes)
            .context("prepare document")?;
        let sample: Vec<String> = prepared
            .chunks
            .iter()
            .take(args.plan_limit)
            .map(|c| c.text.chars().take(80).collect())
            .collect();
        if telemetry::config::json_mode() {
            log.plan(&IngestPlan {
                source: prepared.source.clone(),
                text_length: prepared.text_length,
                effective: prepared.effective,
                chunks: prepared.chunks.len(),
                replace: args.replace,
                sample,
            })?;
        } else {
            log.info(format!(
                "📝 Ingest plan — source={} text_length={} chunk_size={} overlap={} chunks={} replace={}",
                prepared.source, prepared.text_length, prepared.effective.chunk_size,
                prepared.effective.chunk_overlap, prepared.chunks.len(), args.replace
            ));
            for s in &sample { log.info(format!("  {}", s.replace('\n', " "))); }
            log.info("   Use --apply to embed and store.");
        }
        return Ok(());
    }

    let services = Services::connect(dsn, &args.store, &args.embed).await?.with_chunker(policy);
    let report = services
        .ingest_pipeline()
        .with_batch(args.batch)
        .ingest(&source, bytes, args.replace)
        .await
        .context("ingest document")?;

    if telemetry::config::json_mode() {
        log.result(&report)?;
    }
    Ok(())
}
