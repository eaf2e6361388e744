pub mod logic;
pub mod policy;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::extract::{PdfExtractor, PdfTextExtractor};
use crate::telemetry;
use crate::telemetry::ops::chunk::Phase as ChunkPhase;

pub use policy::{
    normalize_whitespace, split, Chunk, ChunkConfig, ChunkError, Chunked, ChunkingPolicy,
    DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_MIN_CHUNK_LEN,
};

/// Chunking flags shared by chunk, ingest and serve.
#[derive(Args, Clone, Debug)]
pub struct ChunkArgs {
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,
    #[arg(long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
    pub chunk_overlap: usize,
    #[arg(long, default_value_t = DEFAULT_MIN_CHUNK_LEN)]
    pub min_chunk_len: usize,
    /// Keep the extracted whitespace as-is
    #[arg(long, default_value_t = false)]
    pub no_normalize: bool,
}

impl ChunkArgs {
    pub fn policy(&self) -> Result<ChunkingPolicy, ChunkError> {
        let cfg = ChunkConfig::new(self.chunk_size, self.chunk_overlap)?
            .with_min_chunk_len(self.min_chunk_len)
            .with_normalize(!self.no_normalize);
        ChunkingPolicy::new(cfg)
    }
}

#[derive(Args)]
pub struct ChunkCmd {
    /// PDF or plain-text file
    file: PathBuf,
    #[command(flatten)]
    chunking: ChunkArgs,
    /// Characters of each chunk to show
    #[arg(long, default_value_t = 80)]
    preview: usize,
    #[arg(long, default_value_t = 10)]
    plan_limit: usize,
}

#[derive(Serialize)]
struct ChunkRow {
    index: usize,
    start: usize,
    end: usize,
    chars: usize,
    preview: String,
}

#[derive(Serialize)]
struct ChunkReport {
    source: String,
    text_chars: usize,
    effective: ChunkConfig,
    chunks: Vec<ChunkRow>,
}

fn is_pdf(path: &Path) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

fn preview(text: &str, n: usize) -> String {
    let mut out: String = text.chars().take(n).collect();
    if text.chars().count() > n { out.push('…'); }
    out.replace('\n', " ")
}

/// Read-only: show how a document would be chunked.
pub async fn run(args: ChunkCmd) -> Result<()> {
    let log = telemetry::chunk();
    let _g = log.root_span_kv([
        ("file", args.file.display().to_string()),
        ("chunk_size", args.chunking.chunk_size.to_string()),
        ("chunk_overlap", args.chunking.chunk_overlap.to_string()),
        ("min_chunk_len", args.chunking.min_chunk_len.to_string()),
    ]).entered();

    let policy = args.chunking.policy().context("chunking config")?;

    let _s = log.span(&ChunkPhase::Read).entered();
    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("read {}", args.file.display()))?;
    drop(_s);

    let text = if is_pdf(&args.file) {
        let _s = log.span(&ChunkPhase::Extract).entered();
        PdfTextExtractor.extract(&bytes).context("extract PDF text")?
    } else {
        String::from_utf8(bytes).context("file is not UTF-8 text")?
    };

    let _s = log.span(&ChunkPhase::Split).entered();
    let out = policy.split_detailed(&text).context("split text")?;
    drop(_s);

    let text_chars = out.normalized.chars().count();
    log.info(format!(
        "📝 {} — text_chars={} chunk_size={} overlap={} → {} chunk(s)",
        args.file.display(), text_chars, out.effective.chunk_size, out.effective.chunk_overlap, out.chunks.len()
    ));
    for c in out.chunks.iter().take(args.plan_limit) {
        log.info(format!("  #{} [{}..{}] {}", c.index, c.start, c.end, preview(&c.text, args.preview)));
    }
    if out.chunks.len() > args.plan_limit {
        log.info(format!("  ... ({} more)", out.chunks.len() - args.plan_limit));
    }

    if telemetry::config::json_mode() {
        let report = ChunkReport {
            source: args.file.display().to_string(),
            text_chars,
            effective: out.effective,
            chunks: out
                .chunks
                .iter()
                .map(|c| ChunkRow {
                    index: c.index,
                    start: c.start,
                    end: c.end,
                    chars: c.text.chars().count(),
                    preview: preview(&c.text, args.preview),
                })
                .collect(),
        };
        log.result(&report)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_args_build_a_policy() {
        let args = ChunkArgs { chunk_size: 500, chunk_overlap: 100, min_chunk_len: 10, no_normalize: true };
        let cfg = *args.policy().unwrap().config();
        assert_eq!(cfg.chunk_size, 500);
        assert_eq!(cfg.min_chunk_len, 10);
        assert!(!cfg.normalize);

        let bad = ChunkArgs { chunk_size: 100, chunk_overlap: 100, min_chunk_len: 10, no_normalize: false };
        assert!(matches!(bad.policy(), Err(ChunkError::InvalidConfig(_))));
    }

    #[test]
    fn previews_are_single_line_and_capped() {
        assert_eq!(preview("ab\ncd", 10), "ab cd");
        assert_eq!(preview("abcdef", 3), "abc…");
    }

    #[test]
    fn pdf_detection_uses_extension() {
        assert!(is_pdf(Path::new("paper.PDF")));
        assert!(!is_pdf(Path::new("notes.txt")));
    }
}
