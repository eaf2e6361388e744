use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use uuid::Uuid;

use crate::services::{connect_store, StoreArgs};
use crate::telemetry;
use crate::telemetry::ops::delete::Phase as DeletePhase;

#[derive(Args)]
pub struct DeleteCmd {
    /// Chunk ids to delete
    ids: Vec<Uuid>,
    /// Delete every stored chunk
    #[arg(long, default_value_t = false, conflicts_with = "ids")]
    all: bool,
    #[arg(long, default_value_t = false)]
    apply: bool,
    #[command(flatten)]
    store: StoreArgs,
}

#[derive(Serialize)]
struct DeletePlan {
    all: bool,
    ids: Vec<Uuid>,
    stored: u64,
}

#[derive(Serialize)]
struct DeleteResult {
    deleted: u64,
    remaining: u64,
}

pub async fn run(dsn: Option<&str>, args: DeleteCmd) -> Result<()> {
    let log = telemetry::delete();
    let _g = log.root_span_kv([
        ("all", args.all.to_string()),
        ("ids", args.ids.len().to_string()),
        ("apply", args.apply.to_string()),
    ]).entered();

    if !args.all && args.ids.is_empty() {
        bail!("nothing to delete: pass chunk ids or --all");
    }
    let store = connect_store(dsn, &args.store).await?;

    if !args.apply {
        let _sp = log.span(&DeletePhase::Plan).entered();
        let stored = store.count().await.context("count chunks")?;
        if telemetry::config::json_mode() {
            log.plan(&DeletePlan { all: args.all, ids: args.ids.clone(), stored })?;
        } else if args.all {
            log.info(format!("📝 Delete plan — all {} stored chunk(s)", stored));
            log.info("   Use --apply to delete.");
        } else {
            log.info(format!("📝 Delete plan — {} id(s) of {} stored chunk(s)", args.ids.len(), stored));
            for id in &args.ids { log.info(format!("  id={}", id)); }
            log.info("   Use --apply to delete.");
        }
        return Ok(());
    }

    let deleted = {
        let _s = log.span(&DeletePhase::Delete).entered();
        if args.all {
            store.delete_all().await.context("delete all chunks")?
        } else {
            store.delete(&args.ids).await.context("delete chunks")?
        }
    };
    let remaining = store.count().await.context("count chunks")?;
    log.info(format!("🗑️  deleted={} remaining={}", deleted, remaining));
    if telemetry::config::json_mode() {
        log.result(&DeleteResult { deleted, remaining })?;
    }
    Ok(())
}
