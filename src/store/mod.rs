// src/store/mod.rs
//
// SQLite row store with replace+index semantics: each dataset is replaced
// wholesale inside one transaction, never appended to, so readers either see
// the previous complete dataset or the new one.

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection};
use std::fs;
use std::path::Path;

use crate::process::monthly::WideRecord;
use crate::process::period::{PeriodType, ReleaseType};
use crate::process::sections::{Segment, TcdRecord};

pub const MONTHLY_TABLE: &str = "market_stats";
pub const TCD_TABLE: &str = "tcd_stay_nights";

pub struct RowStore {
    conn: Connection,
}

impl RowStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening sqlite db {}", path.display()))?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    fn table_exists(&self, name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Replace the monthly wide table and rebuild its indexes.
    pub fn replace_monthly(&mut self, rows: &[WideRecord]) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(&format!("DROP TABLE IF EXISTS {MONTHLY_TABLE}"), [])?;
        tx.execute(
            &format!(
                "CREATE TABLE {MONTHLY_TABLE} (
                     ym TEXT NOT NULL,
                     pref_code TEXT NOT NULL,
                     pref_name TEXT NOT NULL,
                     total REAL NOT NULL,
                     jp REAL NOT NULL,
                     \"foreign\" REAL NOT NULL
                 )"
            ),
            [],
        )?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {MONTHLY_TABLE} \
                 (ym, pref_code, pref_name, total, jp, \"foreign\") \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ))?;
            for r in rows {
                stmt.execute(params![r.ym, r.pref_code, r.pref_name, r.total, r.jp, r.foreign])?;
            }
        }
        tx.execute(
            &format!("CREATE INDEX idx_{MONTHLY_TABLE}_ym ON {MONTHLY_TABLE}(ym)"),
            [],
        )?;
        tx.execute(
            &format!("CREATE INDEX idx_{MONTHLY_TABLE}_pref ON {MONTHLY_TABLE}(pref_code)"),
            [],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn read_monthly(&self) -> Result<Vec<WideRecord>> {
        if !self.table_exists(MONTHLY_TABLE)? {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT ym, pref_code, pref_name, total, jp, \"foreign\" \
             FROM {MONTHLY_TABLE} ORDER BY ym, pref_code"
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(WideRecord {
                    ym: row.get(0)?,
                    pref_code: row.get(1)?,
                    pref_name: row.get(2)?,
                    total: row.get(3)?,
                    jp: row.get(4)?,
                    foreign: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Replace the nights-stayed table and rebuild its indexes.
    pub fn replace_tcd(&mut self, rows: &[TcdRecord]) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(&format!("DROP TABLE IF EXISTS {TCD_TABLE}"), [])?;
        tx.execute(
            &format!(
                "CREATE TABLE {TCD_TABLE} (
                     period_type TEXT NOT NULL,
                     period_key TEXT NOT NULL,
                     period_label TEXT NOT NULL,
                     release_type TEXT NOT NULL,
                     segment TEXT NOT NULL,
                     nights_bin TEXT NOT NULL,
                     value REAL NOT NULL,
                     source_url TEXT NOT NULL,
                     source_title TEXT NOT NULL,
                     source_sha256 TEXT NOT NULL
                 )"
            ),
            [],
        )?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {TCD_TABLE} \
                 (period_type, period_key, period_label, release_type, segment, \
                  nights_bin, value, source_url, source_title, source_sha256) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ))?;
            for r in rows {
                stmt.execute(params![
                    r.period_type.as_str(),
                    r.period_key,
                    r.period_label,
                    r.release_type.label(),
                    r.segment.as_str(),
                    r.nights_bin,
                    r.value,
                    r.source_url,
                    r.source_title,
                    r.source_sha256,
                ])?;
            }
        }
        tx.execute(
            &format!(
                "CREATE INDEX idx_{TCD_TABLE}_period ON {TCD_TABLE}(period_type, period_key)"
            ),
            [],
        )?;
        tx.execute(
            &format!("CREATE INDEX idx_{TCD_TABLE}_release ON {TCD_TABLE}(release_type)"),
            [],
        )?;
        tx.execute(
            &format!(
                "CREATE INDEX idx_{TCD_TABLE}_source ON {TCD_TABLE}(source_url, source_sha256)"
            ),
            [],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn read_tcd(&self) -> Result<Vec<TcdRecord>> {
        if !self.table_exists(TCD_TABLE)? {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT period_type, period_key, period_label, release_type, segment, \
             nights_bin, value, source_url, source_title, source_sha256 \
             FROM {TCD_TABLE}"
        ))?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, f64>(6)?,
                    row.get::<_, String>(7)?,
                    row.get::<_, String>(8)?,
                    row.get::<_, String>(9)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        raw.into_iter()
            .map(|(pt, key, label, release, segment, bin, value, url, title, sha)| {
                Ok(TcdRecord {
                    period_type: match pt.as_str() {
                        "annual" => PeriodType::Annual,
                        "quarter" => PeriodType::Quarter,
                        other => return Err(anyhow!("unknown period_type in store: {other}")),
                    },
                    period_key: key,
                    period_label: label,
                    release_type: ReleaseType::from_label(&release)
                        .ok_or_else(|| anyhow!("unknown release_type in store: {release}"))?,
                    segment: Segment::from_label(&segment)
                        .ok_or_else(|| anyhow!("unknown segment in store: {segment}"))?,
                    nights_bin: bin,
                    value,
                    source_url: url,
                    source_title: title,
                    source_sha256: sha,
                })
            })
            .collect()
    }
}
