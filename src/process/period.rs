// src/process/period.rs
//
// Period expressions as published: a quarter written as a month range
// ("2025年1-3月期"), an explicit quarter code ("2025年Q1"), or a plain year
// ("2024年"). Dash variants are folded before matching so fullwidth
// punctuation in titles does not matter.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::process::ParseError;

static QUARTER_RANGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(20\d{2})年\s*([1-9]|1[0-2])\s*-\s*([1-9]|1[0-2])月").unwrap());
static QUARTER_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(20\d{2})年\s*Q([1-4])").unwrap());
static ANNUAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(20\d{2})年").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Annual,
    Quarter,
}

impl PeriodType {
    pub fn as_str(self) -> &'static str {
        match self {
            PeriodType::Annual => "annual",
            PeriodType::Quarter => "quarter",
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved reporting period: type, sortable key and display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub period_type: PeriodType,
    pub key: String,
    pub label: String,
}

/// The closed set of period shapes a cell can carry. Parsing goes through
/// this enum so each shape's construction rule is testable on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodExpr {
    QuarterRange { year: i32, start_month: u32 },
    QuarterCode { year: i32, quarter: u32 },
    Annual { year: i32 },
}

impl PeriodExpr {
    /// Try the three shapes in order of specificity.
    pub fn parse(text: &str) -> Option<Self> {
        let normalized: String = text
            .chars()
            .map(|c| match c {
                '〜' | '～' | '−' | '－' | '―' => '-',
                other => other,
            })
            .collect();

        if let Some(caps) = QUARTER_RANGE_RE.captures(&normalized) {
            return Some(PeriodExpr::QuarterRange {
                year: caps[1].parse().ok()?,
                start_month: caps[2].parse().ok()?,
            });
        }
        if let Some(caps) = QUARTER_CODE_RE.captures(&normalized) {
            return Some(PeriodExpr::QuarterCode {
                year: caps[1].parse().ok()?,
                quarter: caps[2].parse().ok()?,
            });
        }
        if let Some(caps) = ANNUAL_RE.captures(&normalized) {
            return Some(PeriodExpr::Annual {
                year: caps[1].parse().ok()?,
            });
        }
        None
    }

    pub fn to_period(self) -> Period {
        match self {
            PeriodExpr::QuarterRange { year, start_month } => {
                let quarter = (start_month - 1) / 3 + 1;
                quarter_period(year, quarter)
            }
            PeriodExpr::QuarterCode { year, quarter } => quarter_period(year, quarter),
            PeriodExpr::Annual { year } => Period {
                period_type: PeriodType::Annual,
                key: format!("{year}"),
                label: format!("{year}年"),
            },
        }
    }
}

fn quarter_period(year: i32, quarter: u32) -> Period {
    Period {
        period_type: PeriodType::Quarter,
        key: format!("{year}Q{quarter}"),
        label: format!("{year}年Q{quarter}"),
    }
}

/// Parse free text into a period, if it contains one.
pub fn parse_period(text: &str) -> Option<Period> {
    PeriodExpr::parse(text).map(PeriodExpr::to_period)
}

/// Chronological order for period keys: (year, quarter), annual keys sorting
/// with quarter 0. Unrecognized keys sort first.
pub fn period_sort_key(key: &str) -> (i32, u32) {
    static KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})(?:Q([1-4]))?$").unwrap());
    let Some(caps) = KEY_RE.captures(key) else {
        return (0, 0);
    };
    let year = caps[1].parse().unwrap_or(0);
    let quarter = caps
        .get(2)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
    (year, quarter)
}

/// Whether a period's figures are final or a second-preliminary estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReleaseType {
    #[serde(rename = "確報")]
    Final,
    #[serde(rename = "2次速報")]
    SecondPreliminary,
}

impl ReleaseType {
    pub fn label(self) -> &'static str {
        match self {
            ReleaseType::Final => "確報",
            ReleaseType::SecondPreliminary => "2次速報",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "確報" => Some(ReleaseType::Final),
            "2次速報" => Some(ReleaseType::SecondPreliminary),
            _ => None,
        }
    }
}

impl fmt::Display for ReleaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify title or link text by its release-type wording.
pub fn parse_release_type(text: &str) -> Option<ReleaseType> {
    if text.contains("確報") {
        return Some(ReleaseType::Final);
    }
    if text.contains("2次速報") || text.contains("２次速報") {
        return Some(ReleaseType::SecondPreliminary);
    }
    None
}

/// Resolve a workbook's document-level period and release type from its
/// title cell, falling back to the page link text for the release wording.
pub fn parse_title_metadata(
    title: &str,
    link_text: &str,
) -> Result<(Period, ReleaseType), ParseError> {
    let period = parse_period(title).ok_or_else(|| ParseError::PeriodParse(title.to_string()))?;
    let release = parse_release_type(title)
        .or_else(|| parse_release_type(link_text))
        .ok_or_else(|| ParseError::UnsupportedReleaseType {
            title: title.to_string(),
            link_text: link_text.to_string(),
        })?;
    Ok((period, release))
}
