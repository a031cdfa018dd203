// src/process/era.rs
use once_cell::sync::Lazy;
use regex::Regex;

use crate::process::ParseError;

// '平成23年', '令和元年' — whitespace-tolerant, 元 = year 1.
static ERA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(昭和|平成|令和)\s*([0-9]{1,2}|元)\s*年\s*$").unwrap());

/// Parse an era-year label like `平成23年` into `("平成", 23)`.
pub fn parse_era_label(label: &str) -> Result<(&str, u32), ParseError> {
    let caps = ERA_RE
        .captures(label)
        .ok_or_else(|| ParseError::MalformedEraLabel(label.to_string()))?;
    let era = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let year_raw = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
    let year = if year_raw == "元" {
        1
    } else {
        year_raw
            .parse()
            .map_err(|_| ParseError::MalformedEraLabel(label.to_string()))?
    };
    Ok((era, year))
}

/// Convert an era name and era-relative year to a Gregorian year.
/// Showa 1 = 1926, Heisei 1 = 1989, Reiwa 1 = 2019.
pub fn era_to_gregorian(era: &str, year: u32) -> Result<i32, ParseError> {
    let base = match era {
        "昭和" => 1925,
        "平成" => 1988,
        "令和" => 2018,
        _ => return Err(ParseError::UnknownEra(era.to_string())),
    };
    Ok(base + year as i32)
}

/// Full label → Gregorian year, e.g. `令和6年` → 2024.
pub fn era_label_to_year(label: &str) -> Result<i32, ParseError> {
    let (era, year) = parse_era_label(label)?;
    era_to_gregorian(era, year)
}
