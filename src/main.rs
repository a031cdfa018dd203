use anyhow::Result;
use kankoscraper::{
    config::UpdateConfig,
    store::RowStore,
    update::{monthly, tcd},
};
use reqwest::Client;
use std::{fs, time::Duration};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) configure ────────────────────────────────────────────────
    let cfg = UpdateConfig::from_env();
    fs::create_dir_all(&cfg.data_dir)?;
    let client = Client::builder()
        .timeout(Duration::from_secs(120))
        .build()?;
    let mut store = RowStore::open(cfg.sqlite_path())?;

    // ─── 3) monthly wide table ───────────────────────────────────────
    let monthly_res = monthly::run(&client, &cfg, &mut store).await;
    match &monthly_res {
        Ok(monthly::MonthlyOutcome::Unchanged) => {
            info!("monthly: no change, source file hash unchanged")
        }
        Ok(monthly::MonthlyOutcome::Updated {
            rows,
            min_ym,
            max_ym,
        }) => info!(rows, %min_ym, %max_ym, "monthly: updated"),
        Err(e) => error!("monthly update failed: {e:#}"),
    }

    // ─── 4) nights-stayed table ──────────────────────────────────────
    let tcd_res = tcd::run(&client, &cfg, &mut store).await;
    match &tcd_res {
        Ok(tcd::TcdOutcome::Unchanged) => {
            info!("tcd: no change, source file hash set unchanged")
        }
        Ok(tcd::TcdOutcome::Updated {
            rows,
            files,
            periods,
        }) => info!(rows, files, periods, "tcd: updated"),
        Err(e) => error!("tcd update failed: {e:#}"),
    }

    // one pipeline failing must not stop the other, but the run as a
    // whole still reports failure
    monthly_res?;
    tcd_res?;

    info!("all done");
    Ok(())
}
