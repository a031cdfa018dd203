// src/process/select.rs
//
// The agency publishes a second-preliminary figure first and a final figure
// later for the same period. Downstream consumers should always see the best
// available figure for the latest period, never both.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::process::period::{period_sort_key, PeriodType, ReleaseType};
use crate::process::sections::TcdRecord;

/// Derived summary of one published period and which releases exist for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailablePeriod {
    pub period_type: PeriodType,
    pub period_key: String,
    pub period_label: String,
    pub releases: Vec<ReleaseType>,
}

/// Chronologically latest period key among rows of the requested type.
pub fn latest_period_key(rows: &[TcdRecord], period_type: PeriodType) -> Option<String> {
    rows.iter()
        .filter(|r| r.period_type == period_type)
        .map(|r| r.period_key.as_str())
        .max_by_key(|key| period_sort_key(key))
        .map(str::to_string)
}

/// Keep only the best available release: final if any row has it, else
/// second-preliminary, else whatever single release is present.
pub fn prefer_final(rows: Vec<TcdRecord>) -> Vec<TcdRecord> {
    for wanted in [ReleaseType::Final, ReleaseType::SecondPreliminary] {
        if rows.iter().any(|r| r.release_type == wanted) {
            return rows
                .into_iter()
                .filter(|r| r.release_type == wanted)
                .collect();
        }
    }
    rows
}

/// Rows for the latest period of `period_type`, final-preferred.
pub fn latest_rows(rows: &[TcdRecord], period_type: PeriodType) -> Vec<TcdRecord> {
    let Some(key) = latest_period_key(rows, period_type) else {
        return Vec::new();
    };
    let in_period: Vec<TcdRecord> = rows
        .iter()
        .filter(|r| r.period_type == period_type && r.period_key == key)
        .cloned()
        .collect();
    prefer_final(in_period)
}

/// Group rows into the per-period summary persisted in the manifest,
/// newest period first, releases final-first within each period.
pub fn available_periods(rows: &[TcdRecord]) -> Vec<AvailablePeriod> {
    let mut grouped: BTreeMap<(PeriodType, String, String), Vec<ReleaseType>> = BTreeMap::new();
    for row in rows {
        let releases = grouped
            .entry((
                row.period_type,
                row.period_key.clone(),
                row.period_label.clone(),
            ))
            .or_default();
        if !releases.contains(&row.release_type) {
            releases.push(row.release_type);
        }
    }

    let mut periods: Vec<AvailablePeriod> = grouped
        .into_iter()
        .map(|((period_type, period_key, period_label), mut releases)| {
            releases.sort_by_key(|r| match r {
                ReleaseType::Final => 0,
                ReleaseType::SecondPreliminary => 1,
            });
            AvailablePeriod {
                period_type,
                period_key,
                period_label,
                releases,
            }
        })
        .collect();
    periods.sort_by_key(|p| std::cmp::Reverse(period_sort_key(&p.period_key)));
    periods
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::sections::Segment;

    fn row(period_type: PeriodType, key: &str, release: ReleaseType) -> TcdRecord {
        TcdRecord {
            period_type,
            period_key: key.to_string(),
            period_label: format!("{key}期"),
            release_type: release,
            segment: Segment::DomesticTotal,
            nights_bin: "1泊".to_string(),
            value: 1.0,
            source_url: "u".to_string(),
            source_title: "t".to_string(),
            source_sha256: "s".to_string(),
        }
    }

    #[test]
    fn latest_quarter_by_year_then_quarter() {
        let rows = vec![
            row(PeriodType::Quarter, "2024Q4", ReleaseType::Final),
            row(PeriodType::Quarter, "2025Q1", ReleaseType::SecondPreliminary),
            row(PeriodType::Annual, "2024", ReleaseType::Final),
        ];
        assert_eq!(
            latest_period_key(&rows, PeriodType::Quarter).as_deref(),
            Some("2025Q1")
        );
        assert_eq!(
            latest_period_key(&rows, PeriodType::Annual).as_deref(),
            Some("2024")
        );
    }

    #[test]
    fn final_preferred_over_second_preliminary() {
        let rows = vec![
            row(PeriodType::Quarter, "2025Q1", ReleaseType::SecondPreliminary),
            row(PeriodType::Quarter, "2025Q1", ReleaseType::Final),
            row(PeriodType::Quarter, "2025Q1", ReleaseType::SecondPreliminary),
        ];
        let kept = latest_rows(&rows, PeriodType::Quarter);
        assert_eq!(kept.len(), 1);
        assert!(kept.iter().all(|r| r.release_type == ReleaseType::Final));
    }

    #[test]
    fn single_release_periods_pass_through() {
        let rows = vec![row(
            PeriodType::Quarter,
            "2025Q1",
            ReleaseType::SecondPreliminary,
        )];
        let kept = latest_rows(&rows, PeriodType::Quarter);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].release_type, ReleaseType::SecondPreliminary);
    }

    #[test]
    fn no_rows_of_requested_type() {
        let rows = vec![row(PeriodType::Annual, "2024", ReleaseType::Final)];
        assert!(latest_rows(&rows, PeriodType::Quarter).is_empty());
    }

    #[test]
    fn available_periods_newest_first_final_first() {
        let rows = vec![
            row(PeriodType::Quarter, "2024Q4", ReleaseType::Final),
            row(PeriodType::Quarter, "2025Q1", ReleaseType::SecondPreliminary),
            row(PeriodType::Quarter, "2025Q1", ReleaseType::Final),
            row(PeriodType::Annual, "2024", ReleaseType::Final),
        ];
        let periods = available_periods(&rows);
        let keys: Vec<&str> = periods.iter().map(|p| p.period_key.as_str()).collect();
        assert_eq!(keys, ["2025Q1", "2024Q4", "2024"]);
        assert_eq!(
            periods[0].releases,
            [ReleaseType::Final, ReleaseType::SecondPreliminary]
        );
    }
}
