use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::services::connect_pool;
use crate::telemetry;
use crate::telemetry::ops::init::Phase as InitPhase;

#[derive(Args)]
pub struct InitCmd {}

#[derive(Serialize)]
struct InitResult {
    migrations: usize,
}

/// Create the `doctalk` schema and chunk table. Idempotent.
pub async fn run(dsn: Option<&str>, _args: InitCmd) -> Result<()> {
    let log = telemetry::init();
    let _g = log.root_span().entered();

    let pool = {
        let _s = log.span(&InitPhase::Connect).entered();
        connect_pool(dsn).await?
    };

    let migrator = sqlx::migrate!();
    {
        let _s = log.span(&InitPhase::Migrate).entered();
        migrator.run(&pool).await.context("apply migrations")?;
    }

    log.info("Database initialized successfully");
    if telemetry::config::json_mode() {
        log.result(&InitResult { migrations: migrator.iter().count() })?;
    }
    Ok(())
}
