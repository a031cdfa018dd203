// src/process/sections.rs
//
// The consumption-trend workbooks stack several reporting periods on one
// sheet (T06). Each period's block starts at a fixed anchor cell ('宿泊数')
// followed by eight nights-stayed rows; the period itself is written
// somewhere above the anchor, not at a fixed offset.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::process::grid::SheetGrid;
use crate::process::period::{parse_period, Period, PeriodType, ReleaseType};
use crate::process::ParseError;

/// Section-start marker in column 1.
const SECTION_ANCHOR: &str = "宿泊数";

/// How far above an anchor to look for its period label, and how many
/// leading columns to check per row.
const PERIOD_SCAN_ROWS: u32 = 20;
const PERIOD_SCAN_COLS: u32 = 6;

/// Nights rows sit directly below the anchor.
const NIGHTS_ROW_SPAN: u32 = 8;

/// Canonical nights-stayed bins in display order.
pub const NIGHTS_BIN_ORDER: [&str; 8] =
    ["1泊", "2泊", "3泊", "4泊", "5泊", "6泊", "7泊", "8泊以上"];

static NIGHTS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([1-7])泊").unwrap());

/// Traveler segment columns extracted from each section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    DomesticTotal,
    DomesticBusiness,
}

impl Segment {
    pub const ALL: [Segment; 2] = [Segment::DomesticTotal, Segment::DomesticBusiness];

    pub fn column(self) -> u32 {
        match self {
            Segment::DomesticTotal => 2,
            Segment::DomesticBusiness => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Segment::DomesticTotal => "domestic_total",
            Segment::DomesticBusiness => "domestic_business",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "domestic_total" => Some(Segment::DomesticTotal),
            "domestic_business" => Some(Segment::DomesticBusiness),
            _ => None,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One nights-stayed value, tagged with its period, release and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcdRecord {
    pub period_type: PeriodType,
    pub period_key: String,
    pub period_label: String,
    pub release_type: ReleaseType,
    pub segment: Segment,
    pub nights_bin: String,
    pub value: f64,
    pub source_url: String,
    pub source_title: String,
    pub source_sha256: String,
}

/// Provenance carried onto every extracted record.
#[derive(Debug, Clone, Copy)]
pub struct SourceInfo<'a> {
    pub url: &'a str,
    pub title: &'a str,
    pub sha256: &'a str,
}

fn strip_spaces(s: &str) -> String {
    s.chars().filter(|c| *c != ' ' && *c != '　').collect()
}

/// Scan column 1 for section anchors. A sheet carries one anchor per
/// reporting period published on it.
pub fn find_section_rows<G: SheetGrid>(grid: &G) -> Vec<u32> {
    let mut rows = Vec::new();
    for r in 1..=grid.max_row() {
        if let Some(v) = grid.cell_str(r, 1) {
            if strip_spaces(&v) == SECTION_ANCHOR {
                rows.push(r);
            }
        }
    }
    rows
}

/// Search upward from the anchor for the first cell carrying a period
/// expression. Section-local labels are usually present but occasionally
/// omitted when a whole sheet covers one period, hence the fallback.
pub fn period_for_section<G: SheetGrid>(grid: &G, section_row: u32, fallback: &Period) -> Period {
    let stop = section_row.saturating_sub(PERIOD_SCAN_ROWS);
    for r in (stop + 1..section_row).rev() {
        for c in 1..=PERIOD_SCAN_COLS {
            let Some(text) = grid.cell_str(r, c) else {
                continue;
            };
            if let Some(period) = parse_period(&text) {
                return period;
            }
        }
    }
    fallback.clone()
}

/// Canonicalize a nights-bin cell: '８泊以上', '3泊 ' etc → fixed bin labels.
pub fn normalize_nights_bin(value: &str) -> Option<&'static str> {
    let s = strip_spaces(value);
    if s.is_empty() {
        return None;
    }
    if s.contains("8泊") && s.contains("以上") {
        return Some("8泊以上");
    }
    if let Some(caps) = NIGHTS_RE.captures(&s) {
        let idx: usize = caps[1].parse().ok()?;
        return NIGHTS_BIN_ORDER.get(idx - 1).copied();
    }
    NIGHTS_BIN_ORDER.iter().find(|b| **b == s).copied()
}

/// Numeric value of a cell, also accepting comma-formatted text.
fn to_float<G: SheetGrid>(grid: &G, row: u32, col: u32) -> Option<f64> {
    if let Some(v) = grid.cell_num(row, col) {
        return Some(v);
    }
    let s = grid.cell_str(row, col)?.replace(',', "");
    s.trim().parse().ok()
}

/// Extract every section's nights-stayed rows from a T06-style sheet.
pub fn extract_stay_rows<G: SheetGrid>(
    grid: &G,
    source: &SourceInfo<'_>,
    title_period_fallback: &Period,
    release_type: ReleaseType,
) -> Result<Vec<TcdRecord>, ParseError> {
    let section_rows = find_section_rows(grid);
    if section_rows.is_empty() {
        return Err(ParseError::NoSectionsFound);
    }

    let mut records = Vec::new();
    for section_row in section_rows {
        let period = period_for_section(grid, section_row, title_period_fallback);

        for offset in 1..=NIGHTS_ROW_SPAN {
            let row = section_row + offset;
            let Some(nights_bin) = grid
                .cell_str(row, 1)
                .as_deref()
                .and_then(normalize_nights_bin)
            else {
                continue;
            };

            for segment in Segment::ALL {
                let Some(value) = to_float(grid, row, segment.column()) else {
                    continue;
                };
                records.push(TcdRecord {
                    period_type: period.period_type,
                    period_key: period.key.clone(),
                    period_label: period.label.clone(),
                    release_type,
                    segment,
                    nights_bin: nights_bin.to_string(),
                    value,
                    source_url: source.url.to_string(),
                    source_title: source.title.to_string(),
                    source_sha256: source.sha256.to_string(),
                });
            }
        }
    }

    if records.is_empty() {
        return Err(ParseError::NoDataParsed("stay-nights sections".to_string()));
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::grid::VecGrid;

    fn source() -> SourceInfo<'static> {
        SourceInfo {
            url: "https://example.jp/content/t06.xlsx",
            title: "2025年1-3月期（確報）集計表",
            sha256: "deadbeef",
        }
    }

    fn fallback() -> Period {
        parse_period("2025年1-3月期").unwrap()
    }

    /// One section: period label above the anchor, eight nights rows below.
    fn put_section(g: &mut VecGrid, anchor_row: u32, period_text: Option<&str>) {
        if let Some(text) = period_text {
            g.put(anchor_row - 2, 2, text);
        }
        g.put(anchor_row, 1, "宿泊数");
        for (i, bin) in NIGHTS_BIN_ORDER.iter().enumerate() {
            let row = anchor_row + 1 + i as u32;
            g.put(row, 1, bin);
            g.put_num(row, 2, 100.0 + i as f64);
            g.put_num(row, 5, 10.0 + i as f64);
        }
    }

    #[test]
    fn locates_every_anchor() {
        let mut g = VecGrid::new();
        put_section(&mut g, 5, Some("2024年10-12月期"));
        put_section(&mut g, 20, Some("2025年1-3月期"));
        g.put(30, 1, "宿 泊 数");
        assert_eq!(find_section_rows(&g), vec![5, 20, 30]);
    }

    #[test]
    fn no_anchor_is_an_error() {
        let mut g = VecGrid::new();
        g.put(1, 1, "表題のみ");
        assert!(matches!(
            extract_stay_rows(&g, &source(), &fallback(), ReleaseType::Final),
            Err(ParseError::NoSectionsFound)
        ));
    }

    #[test]
    fn section_local_period_beats_fallback() {
        let mut g = VecGrid::new();
        put_section(&mut g, 5, Some("2024年10-12月期"));
        let period = period_for_section(&g, 5, &fallback());
        assert_eq!(period.key, "2024Q4");
    }

    #[test]
    fn missing_local_period_uses_title_fallback() {
        let mut g = VecGrid::new();
        put_section(&mut g, 5, None);
        let period = period_for_section(&g, 5, &fallback());
        assert_eq!(period.key, "2025Q1");
    }

    #[test]
    fn nights_bin_normalization() {
        assert_eq!(normalize_nights_bin("1泊"), Some("1泊"));
        assert_eq!(normalize_nights_bin("3泊 "), Some("3泊"));
        assert_eq!(normalize_nights_bin("8泊以上"), Some("8泊以上"));
        assert_eq!(normalize_nights_bin("8 泊 以 上"), Some("8泊以上"));
        assert_eq!(normalize_nights_bin("宿泊数"), None);
        assert_eq!(normalize_nights_bin(""), None);
        assert_eq!(normalize_nights_bin("9泊"), None);
    }

    #[test]
    fn extracts_both_segments_for_every_bin() {
        let mut g = VecGrid::new();
        put_section(&mut g, 5, Some("2024年10-12月期"));
        put_section(&mut g, 20, Some("2025年1-3月期"));

        let rows = extract_stay_rows(&g, &source(), &fallback(), ReleaseType::Final).unwrap();
        // 2 sections × 8 bins × 2 segments
        assert_eq!(rows.len(), 32);

        let q4_business: Vec<&TcdRecord> = rows
            .iter()
            .filter(|r| r.period_key == "2024Q4" && r.segment == Segment::DomesticBusiness)
            .collect();
        assert_eq!(q4_business.len(), 8);
        assert_eq!(q4_business[0].nights_bin, "1泊");
        assert_eq!(q4_business[0].value, 10.0);
        assert_eq!(rows[0].source_sha256, "deadbeef");
    }

    #[test]
    fn comma_formatted_text_values_parse() {
        let mut g = VecGrid::new();
        g.put(3, 2, "2025年1-3月期");
        g.put(5, 1, "宿泊数");
        g.put(6, 1, "1泊");
        g.put(6, 2, "1,234.5");

        let rows = extract_stay_rows(&g, &source(), &fallback(), ReleaseType::Final).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, 1234.5);
    }
}
