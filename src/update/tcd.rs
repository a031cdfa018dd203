// src/update/tcd.rs
//
// Incremental update of the nights-stayed table. The source page republishes
// a growing set of workbooks; re-parsing is the expensive, failure-prone
// step, so previously parsed rows are reused for any file whose content hash
// is unchanged and only changed or new files are opened at all.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::Result;
use calamine::{open_workbook_auto, Reader, Sheets};
use chrono::Utc;
use reqwest::Client;
use tracing::{info, warn};

use crate::config::UpdateConfig;
use crate::fetch::files::download_file;
use crate::fetch::urls::{extract_tcd_links, fetch_page};
use crate::history::{ProcessedFileEntry, TcdMeta};
use crate::process::grid::SheetGrid;
use crate::process::period::parse_title_metadata;
use crate::process::sections::{extract_stay_rows, SourceInfo, TcdRecord, NIGHTS_BIN_ORDER};
use crate::process::select::available_periods;
use crate::process::ParseError;
use crate::store::RowStore;
use crate::update::NoParsableFiles;

const T06_SHEET: &str = "T06";
const TITLE_SHEET: &str = "表題";

/// A downloaded candidate workbook.
#[derive(Debug, Clone)]
pub struct FetchedFile {
    pub url: String,
    pub link_text: String,
    pub sha256: String,
    pub path: PathBuf,
}

/// Result of opening and parsing one workbook. The title is reported even
/// when section extraction fails, so the manifest entry can still carry it.
pub struct ParseOutcome {
    pub title: Option<String>,
    pub rows: Result<Vec<TcdRecord>>,
}

/// Everything a successful run persists.
#[derive(Debug, Clone)]
pub struct TcdUpdatePlan {
    pub rows: Vec<TcdRecord>,
    pub processed: Vec<ProcessedFileEntry>,
    pub last_checked_at: String,
}

pub enum TcdOutcome {
    Unchanged,
    Updated {
        rows: usize,
        files: usize,
        periods: usize,
    },
}

/// The cache/diff core, separated from I/O so it can be driven with stub
/// parsers. Returns `Ok(None)` when the run is a no-op.
pub fn plan_update(
    fetched: &[FetchedFile],
    prev_meta: &TcdMeta,
    prev_rows: &[TcdRecord],
    fetched_at: &str,
    mut parse: impl FnMut(&FetchedFile) -> ParseOutcome,
) -> Result<Option<TcdUpdatePlan>> {
    let old_hashes: BTreeMap<&str, &str> = prev_meta.hashes().collect();

    let old_urls: BTreeSet<&str> = old_hashes.keys().copied().collect();
    let current_urls: BTreeSet<&str> = fetched.iter().map(|f| f.url.as_str()).collect();
    let set_changed = old_urls != current_urls;
    let hash_changed = fetched
        .iter()
        .any(|f| old_hashes.get(f.url.as_str()).copied() != Some(f.sha256.as_str()));

    if !set_changed && !hash_changed && !prev_rows.is_empty() {
        return Ok(None);
    }

    let mut rows: Vec<TcdRecord> = Vec::new();
    let mut processed: Vec<ProcessedFileEntry> = Vec::new();

    for file in fetched {
        let mut title = prev_meta.title_for(&file.url).unwrap_or_default().to_string();

        let unchanged = old_hashes.get(file.url.as_str()).copied() == Some(file.sha256.as_str());
        if unchanged {
            let reused: Vec<TcdRecord> = prev_rows
                .iter()
                .filter(|r| r.source_url == file.url && r.source_sha256 == file.sha256)
                .cloned()
                .collect();
            if !reused.is_empty() {
                title = reused[0].source_title.clone();
                info!(url = %file.url, rows = reused.len(), "reused cached rows");
                rows.extend(reused);
                processed.push(ProcessedFileEntry {
                    url: file.url.clone(),
                    sha256: file.sha256.clone(),
                    title,
                    fetched_at: fetched_at.to_string(),
                });
                continue;
            }
        }

        let outcome = parse(file);
        if let Some(fresh_title) = outcome.title {
            title = fresh_title;
        }
        processed.push(ProcessedFileEntry {
            url: file.url.clone(),
            sha256: file.sha256.clone(),
            title,
            fetched_at: fetched_at.to_string(),
        });
        match outcome.rows {
            Ok(parsed) => {
                info!(url = %file.url, rows = parsed.len(), "parsed");
                rows.extend(parsed);
            }
            Err(e) => {
                warn!(url = %file.url, "skipped (non-target/unsupported): {e:#}");
            }
        }
    }

    if rows.is_empty() {
        return Err(NoParsableFiles.into());
    }

    sort_rows(&mut rows);
    Ok(Some(TcdUpdatePlan {
        rows,
        processed,
        last_checked_at: fetched_at.to_string(),
    }))
}

fn nights_sort_index(bin: &str) -> usize {
    NIGHTS_BIN_ORDER
        .iter()
        .position(|b| *b == bin)
        .unwrap_or(NIGHTS_BIN_ORDER.len())
}

fn sort_rows(rows: &mut [TcdRecord]) {
    rows.sort_by(|a, b| {
        (
            a.period_type,
            &a.period_key,
            a.release_type.label(),
            nights_sort_index(&a.nights_bin),
            a.segment.as_str(),
            &a.source_url,
        )
            .cmp(&(
                b.period_type,
                &b.period_key,
                b.release_type.label(),
                nights_sort_index(&b.nights_bin),
                b.segment.as_str(),
                &b.source_url,
            ))
    });
}

/// Workbook title: cell A1 of the 表題 sheet, or of the first sheet when no
/// 表題 sheet exists.
fn workbook_title(wb: &mut Sheets<BufReader<File>>) -> String {
    let names = wb.sheet_names().to_owned();
    let name = if names.iter().any(|n| n == TITLE_SHEET) {
        TITLE_SHEET.to_string()
    } else {
        match names.first() {
            Some(n) => n.clone(),
            None => return String::new(),
        }
    };
    wb.worksheet_range(&name)
        .ok()
        .and_then(|range| range.cell_str(1, 1))
        .unwrap_or_default()
}

/// Open and fully parse one downloaded workbook.
pub fn parse_workbook(file: &FetchedFile) -> ParseOutcome {
    let mut wb = match open_workbook_auto(&file.path) {
        Ok(wb) => wb,
        Err(e) => {
            return ParseOutcome {
                title: None,
                rows: Err(anyhow::Error::new(e).context("opening workbook")),
            }
        }
    };
    let title = workbook_title(&mut wb);

    let rows = (|| -> Result<Vec<TcdRecord>> {
        let (period, release) = parse_title_metadata(&title, &file.link_text)?;
        let range = wb
            .worksheet_range(T06_SHEET)
            .map_err(|_| ParseError::SheetNotFound(T06_SHEET.to_string()))?;
        let source = SourceInfo {
            url: &file.url,
            title: &title,
            sha256: &file.sha256,
        };
        Ok(extract_stay_rows(&range, &source, &period, release)?)
    })();

    ParseOutcome {
        title: Some(title),
        rows,
    }
}

/// One full incremental run: resolve candidates, download, plan, persist.
pub async fn run(client: &Client, cfg: &UpdateConfig, store: &mut RowStore) -> Result<TcdOutcome> {
    let html = fetch_page(client, &cfg.tcd_page_url).await?;
    let links = extract_tcd_links(&html, &cfg.tcd_page_url)?;
    info!(candidates = links.len(), "resolved candidate workbooks");

    let fetched_at = Utc::now().to_rfc3339();
    let prev_meta = TcdMeta::load(&cfg.data_dir)?;
    let prev_rows = store.read_tcd()?;

    let tmp = tempfile::tempdir()?;
    let mut fetched: Vec<FetchedFile> = Vec::new();
    let mut failed: Vec<ProcessedFileEntry> = Vec::new();
    for (idx, link) in links.iter().enumerate() {
        let dest = tmp.path().join(format!("tcd_{idx:03}.xlsx"));
        match download_file(client, &link.url, &dest).await {
            Ok(sha256) => fetched.push(FetchedFile {
                url: link.url.clone(),
                link_text: link.link_text.clone(),
                sha256,
                path: dest,
            }),
            Err(e) => {
                warn!(url = %link.url, "skipped (download failed): {e:#}");
                failed.push(ProcessedFileEntry {
                    url: link.url.clone(),
                    sha256: String::new(),
                    title: prev_meta.title_for(&link.url).unwrap_or_default().to_string(),
                    fetched_at: fetched_at.clone(),
                });
            }
        }
    }

    let plan = {
        let fetched = fetched.clone();
        let prev_meta = prev_meta.clone();
        let prev_rows = prev_rows.clone();
        let fetched_at = fetched_at.clone();
        tokio::task::spawn_blocking(move || {
            plan_update(&fetched, &prev_meta, &prev_rows, &fetched_at, parse_workbook)
        })
        .await?
    }?;

    let Some(mut plan) = plan else {
        return Ok(TcdOutcome::Unchanged);
    };
    plan.processed.extend(failed);

    let periods = available_periods(&plan.rows);
    store.replace_tcd(&plan.rows)?;
    let meta = TcdMeta {
        source_page_url: cfg.tcd_page_url.clone(),
        last_checked_at: plan.last_checked_at.clone(),
        processed_files: plan.processed.clone(),
        available_periods: periods.clone(),
    };
    meta.save(&cfg.data_dir)?;

    Ok(TcdOutcome::Updated {
        rows: plan.rows.len(),
        files: plan.processed.len(),
        periods: periods.len(),
    })
}
