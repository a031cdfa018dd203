// src/update/monthly.rs
//
// Update of the prefecture × month wide table. A single workbook carries the
// whole series, so the cache degenerates to one content hash: unchanged hash
// means the run is a no-op.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::Result;
use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};
use chrono::Utc;
use reqwest::Client;
use tracing::info;

use crate::config::UpdateConfig;
use crate::fetch::files::download_file;
use crate::fetch::urls::{fetch_page, find_trend_table_url};
use crate::history::MonthlyMeta;
use crate::process::monthly::{build_wide_from_three_sheets, WideRecord};
use crate::process::ParseError;
use crate::store::RowStore;

// The trend workbook's fixed sheet names: total / domestic / foreign.
const SHEET_TOTAL: &str = "1-2";
const SHEET_JP: &str = "2-2";
const SHEET_FOREIGN: &str = "3-2";

pub enum MonthlyOutcome {
    Unchanged,
    Updated {
        rows: usize,
        min_ym: String,
        max_ym: String,
    },
}

fn sheet(wb: &mut Sheets<BufReader<File>>, name: &str) -> Result<Range<Data>> {
    wb.worksheet_range(name)
        .map_err(|_| ParseError::SheetNotFound(name.to_string()).into())
}

/// Open the trend workbook and build the full wide table.
pub fn parse_trend_workbook(path: &Path) -> Result<Vec<WideRecord>> {
    let mut wb = open_workbook_auto(path)?;
    let total = sheet(&mut wb, SHEET_TOTAL)?;
    let jp = sheet(&mut wb, SHEET_JP)?;
    let foreign = sheet(&mut wb, SHEET_FOREIGN)?;
    Ok(build_wide_from_three_sheets(&total, &jp, &foreign)?)
}

/// One full update run. Any extraction failure here is fatal for the run:
/// nothing is persisted and the previous dataset stays authoritative.
pub async fn run(
    client: &Client,
    cfg: &UpdateConfig,
    store: &mut RowStore,
) -> Result<MonthlyOutcome> {
    let html = fetch_page(client, &cfg.monthly_page_url).await?;
    let xlsx_url = find_trend_table_url(&html, &cfg.monthly_page_url, &cfg.monthly_name_hint)?;
    info!(url = %xlsx_url, "resolved trend-table workbook");

    let tmp = tempfile::tempdir()?;
    let dest = tmp.path().join("ts_table.xlsx");
    let sha256 = download_file(client, &xlsx_url, &dest).await?;

    let prev = MonthlyMeta::load(&cfg.data_dir)?;
    if prev.source_sha256 == sha256 {
        return Ok(MonthlyOutcome::Unchanged);
    }

    let rows = tokio::task::spawn_blocking(move || parse_trend_workbook(&dest)).await??;

    // rows come back sorted by (ym, pref_code)
    let min_ym = rows.first().map(|r| r.ym.clone()).unwrap_or_default();
    let max_ym = rows.last().map(|r| r.ym.clone()).unwrap_or_default();

    store.replace_monthly(&rows)?;
    let meta = MonthlyMeta {
        source_page_url: cfg.monthly_page_url.clone(),
        source_xlsx_url: xlsx_url,
        source_sha256: sha256,
        fetched_at_utc: Utc::now().to_rfc3339(),
        rows: rows.len(),
        min_ym: min_ym.clone(),
        max_ym: max_ym.clone(),
    };
    meta.save(&cfg.data_dir)?;

    Ok(MonthlyOutcome::Updated {
        rows: rows.len(),
        min_ym,
        max_ym,
    })
}
