// src/history/mod.rs
//
// Process-wide state carried between runs: one JSON manifest per dataset
// under the data directory, read once at startup and written once at the end
// of a successful run. Writes go through a temp file and rename so a crashed
// run never leaves a half-written manifest.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::process::select::AvailablePeriod;

const MONTHLY_META_FILE: &str = "meta.json";
const TCD_META_FILE: &str = "meta_tcd.json";

/// One source file attempted in a run, success or failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedFileEntry {
    pub url: String,
    pub sha256: String,
    pub title: String,
    pub fetched_at: String,
}

/// Manifest for the monthly wide table (single source workbook).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyMeta {
    pub source_page_url: String,
    pub source_xlsx_url: String,
    pub source_sha256: String,
    pub fetched_at_utc: String,
    pub rows: usize,
    pub min_ym: String,
    pub max_ym: String,
}

/// Manifest for the nights-stayed table (many source workbooks).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TcdMeta {
    pub source_page_url: String,
    pub last_checked_at: String,
    pub processed_files: Vec<ProcessedFileEntry>,
    pub available_periods: Vec<AvailablePeriod>,
}

impl MonthlyMeta {
    pub fn load(data_dir: &Path) -> Result<Self> {
        load_json(&data_dir.join(MONTHLY_META_FILE))
    }

    pub fn save(&self, data_dir: &Path) -> Result<()> {
        save_json(&data_dir.join(MONTHLY_META_FILE), self)
    }
}

impl TcdMeta {
    pub fn load(data_dir: &Path) -> Result<Self> {
        load_json(&data_dir.join(TCD_META_FILE))
    }

    pub fn save(&self, data_dir: &Path) -> Result<()> {
        save_json(&data_dir.join(TCD_META_FILE), self)
    }

    /// Previous run's `url → sha256` map.
    pub fn hashes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.processed_files
            .iter()
            .map(|e| (e.url.as_str(), e.sha256.as_str()))
    }

    pub fn title_for(&self, url: &str) -> Option<&str> {
        self.processed_files
            .iter()
            .find(|e| e.url == url)
            .map(|e| e.title.as_str())
    }
}

fn load_json<T: Default + DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(tmp.as_file(), value)
        .with_context(|| format!("serializing {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}
