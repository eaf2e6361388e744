pub mod prompt;
pub mod service;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::encoder::EmbedArgs;
use crate::services::{Services, StoreArgs};
use crate::telemetry;

pub use prompt::{AnswerFormat, ChatTurn, NO_CONTEXT_ANSWER};
pub use service::{Answer, AnswerConfig, Answerer, DEFAULT_TOP_K};

#[derive(Args)]
pub struct AskCmd {
    question: String,
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    k: usize,
    #[arg(long, value_enum, default_value_t = AnswerFormat::Plain)]
    format: AnswerFormat,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    max_tokens: Option<u32>,
    /// Only show the retrieved chunks; skip the language model
    #[arg(long, default_value_t = false)]
    dry_run: bool,
    #[command(flatten)]
    embed: EmbedArgs,
    #[command(flatten)]
    store: StoreArgs,
}

#[derive(Serialize)]
struct AskPlan<'a> {
    question: &'a str,
    k: usize,
    store: &'static str,
    embed_model: &'a str,
    sources: Vec<crate::store::SourceDocument>,
}

pub async fn run(dsn: Option<&str>, args: AskCmd) -> Result<()> {
    let log = telemetry::ask();
    let _g = log.root_span_kv([
        ("k", args.k.to_string()),
        ("format", format!("{:?}", args.format)),
        ("dry_run", args.dry_run.to_string()),
        ("store", format!("{:?}", args.store.store)),
        ("embedder", format!("{:?}", args.embed.embedder)),
    ]).entered();

    let services = Services::connect(dsn, &args.store, &args.embed).await?;
    let answerer = services.answerer(AnswerConfig {
        k: args.k,
        format: args.format,
        model: args.model.clone(),
        max_tokens: args.max_tokens,
    });

    if args.dry_run {
        let sources = answerer.retrieve(&args.question, args.k.max(1)).await.context("retrieve chunks")?;
        for (rank, s) in sources.iter().enumerate() {
            log.info(format!("  #{} d={:.4} {}[{}]", rank + 1, s.distance, s.source, s.chunk_index));
        }
        if telemetry::config::json_mode() {
            log.plan(&AskPlan {
                question: &args.question,
                k: args.k,
                store: services.store.backend(),
                embed_model: services.embedder.model_tag(),
                sources,
            })?;
        }
        return Ok(());
    }

    let answer = answerer.answer(&args.question, &[]).await.context("answer question")?;
    if telemetry::config::json_mode() {
        log.result(&answer)?;
    } else {
        println!("{}", answer.answer);
        for s in &answer.sources {
            println!("  - {} [chunk {}] d={:.4}", s.source, s.chunk_index, s.distance);
        }
    }
    Ok(())
}
