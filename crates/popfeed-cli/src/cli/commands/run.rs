//! `popfeed run` – start the jobs and shut down in order on Ctrl-C.

use anyhow::{Context, Result};
use popfeed_core::config::PopfeedConfig;
use popfeed_core::runtime::Runtime;
use popfeed_core::source::HttpSourceClient;
use popfeed_core::store::StatusDb;
use std::sync::Arc;

pub async fn run_daemon(cfg: &PopfeedConfig) -> Result<()> {
    cfg.validate()?;
    let source = HttpSourceClient::from_config(&cfg.source)?;
    let db = StatusDb::open_default()
        .await
        .context("open record database")?;

    let runtime = Runtime::start(cfg, Arc::new(source), Arc::new(db)).await?;
    println!(
        "Tracking language '{}' (top {}). Press Ctrl-C to stop.",
        cfg.language_key, cfg.capacity
    );

    tokio::signal::ctrl_c()
        .await
        .context("wait for Ctrl-C")?;
    println!("Stopping, saving current state...");

    let report = runtime.shutdown().await?;
    let cached = runtime.cache().len().await;
    println!(
        "Saved {} posts ({} inserted, {} updated, {} deleted, {} failed).",
        cached, report.inserted, report.updated, report.deleted, report.failed
    );
    Ok(())
}
