// src/process/monthly.rs
//
// Long-form extraction for one metric sheet, and the three-sheet merge into
// the wide prefecture × month table.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::process::grid::SheetGrid;
use crate::process::layout::{build_ym_columns, detect_layout, pref_rows};
use crate::process::ParseError;

/// Which of the three trend sheets a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Total,
    Jp,
    Foreign,
}

impl Metric {
    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Total => "total",
            Metric::Jp => "jp",
            Metric::Foreign => "foreign",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One numeric cell in long form.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub ym: String,
    pub pref_code: String,
    pub pref_name: String,
    pub metric: Metric,
    pub value: f64,
}

/// One (ym, prefecture) row holding all three metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WideRecord {
    pub ym: String,
    pub pref_code: String,
    pub pref_name: String,
    pub total: f64,
    pub jp: f64,
    pub foreign: f64,
}

/// Cross the detected header columns with the prefecture rows and emit one
/// record per numeric cell. Sparse edges (empty or annotated cells) are
/// expected and skipped silently.
pub fn parse_sheet_long<G: SheetGrid>(
    grid: &G,
    metric: Metric,
) -> Result<Vec<MetricRecord>, ParseError> {
    let layout = detect_layout(grid)?;
    let ym_cols = build_ym_columns(grid, &layout)?;

    let mut records = Vec::new();
    for pref in pref_rows(grid, layout.month_row + 1) {
        for ym_col in &ym_cols {
            let Some(value) = grid.cell_num(pref.row, ym_col.col) else {
                continue;
            };
            records.push(MetricRecord {
                ym: ym_col.ym.clone(),
                pref_code: pref.pref_code.clone(),
                pref_name: pref.pref_name.clone(),
                metric,
                value,
            });
        }
    }

    if records.is_empty() {
        return Err(ParseError::NoDataParsed(metric.to_string()));
    }
    Ok(records)
}

/// Pivot the three long frames into wide records and regenerate the national
/// row. The source sheets carry their own 全国 row, but it is dropped and
/// recomputed as the sum of prefecture rows per ym so the table stays
/// internally consistent even when the source's own total drifts.
pub fn merge_wide(
    total: Vec<MetricRecord>,
    jp: Vec<MetricRecord>,
    foreign: Vec<MetricRecord>,
) -> Vec<WideRecord> {
    // Keyed map doubles as the final (ym, pref_code) sort.
    let mut wide: BTreeMap<(String, String), WideRecord> = BTreeMap::new();
    for rec in total.into_iter().chain(jp).chain(foreign) {
        let entry = wide
            .entry((rec.ym.clone(), rec.pref_code.clone()))
            .or_insert_with(|| WideRecord {
                ym: rec.ym.clone(),
                pref_code: rec.pref_code.clone(),
                pref_name: rec.pref_name.clone(),
                total: 0.0,
                jp: 0.0,
                foreign: 0.0,
            });
        match rec.metric {
            Metric::Total => entry.total += rec.value,
            Metric::Jp => entry.jp += rec.value,
            Metric::Foreign => entry.foreign += rec.value,
        }
    }

    wide.retain(|(_, code), _| code != "00");

    let mut national: BTreeMap<String, (f64, f64, f64)> = BTreeMap::new();
    for rec in wide.values() {
        let sums = national.entry(rec.ym.clone()).or_insert((0.0, 0.0, 0.0));
        sums.0 += rec.total;
        sums.1 += rec.jp;
        sums.2 += rec.foreign;
    }
    for (ym, (t, j, f)) in national {
        wide.insert(
            (ym.clone(), "00".to_string()),
            WideRecord {
                ym,
                pref_code: "00".to_string(),
                pref_name: "全国".to_string(),
                total: t,
                jp: j,
                foreign: f,
            },
        );
    }

    wide.into_values().collect()
}

/// Parse the three metric sheets and merge them.
pub fn build_wide_from_three_sheets<G: SheetGrid>(
    total: &G,
    jp: &G,
    foreign: &G,
) -> Result<Vec<WideRecord>, ParseError> {
    let df_t = parse_sheet_long(total, Metric::Total)?;
    let df_j = parse_sheet_long(jp, Metric::Jp)?;
    let df_f = parse_sheet_long(foreign, Metric::Foreign)?;
    Ok(merge_wide(df_t, df_j, df_f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::grid::VecGrid;

    /// Trend sheet with one merged 令和-era year header per three months and
    /// the given prefecture rows of values.
    fn trend_sheet(prefs: &[(&str, &[f64])]) -> VecGrid {
        let mut g = VecGrid::new();
        g.put(3, 2, "令和5年");
        g.put(3, 5, "令和6年");
        for (i, m) in [1u32, 2, 3, 1, 2, 3].iter().enumerate() {
            g.put(4, 2 + i as u32, &format!("{m}月"));
        }
        for (ri, (label, values)) in prefs.iter().enumerate() {
            let row = 5 + ri as u32;
            g.put(row, 1, label);
            for (ci, v) in values.iter().enumerate() {
                g.put_num(row, 2 + ci as u32, *v);
            }
        }
        g
    }

    #[test]
    fn merged_header_scenario_pairs_ym_with_values() {
        let g = trend_sheet(&[("13東京都", &[10.0, 20.0, 30.0, 40.0, 50.0, 60.0])]);
        let recs = parse_sheet_long(&g, Metric::Total).unwrap();
        let got: Vec<(&str, f64)> = recs.iter().map(|r| (r.ym.as_str(), r.value)).collect();
        assert_eq!(
            got,
            [
                ("2023-01", 10.0),
                ("2023-02", 20.0),
                ("2023-03", 30.0),
                ("2024-01", 40.0),
                ("2024-02", 50.0),
                ("2024-03", 60.0)
            ]
        );
    }

    #[test]
    fn sheet_with_no_numeric_cells_is_fatal() {
        let g = trend_sheet(&[("13東京都", &[])]);
        assert!(matches!(
            parse_sheet_long(&g, Metric::Jp),
            Err(ParseError::NoDataParsed(m)) if m == "jp"
        ));
    }

    #[test]
    fn three_sheet_round_trip_and_national_sum() {
        let prefs: &[(&str, &[f64])] = &[
            ("01北海道", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
            ("13東京都", &[10.0, 20.0, 30.0, 40.0, 50.0, 60.0]),
        ];
        let g_total = trend_sheet(prefs);
        let g_jp = trend_sheet(&[
            ("01北海道", &[0.5, 1.0, 1.5, 2.0, 2.5, 3.0]),
            ("13東京都", &[5.0, 10.0, 15.0, 20.0, 25.0, 30.0]),
        ]);
        let g_foreign = trend_sheet(&[
            ("01北海道", &[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]),
            ("13東京都", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
        ]);

        let wide = build_wide_from_three_sheets(&g_total, &g_jp, &g_foreign).unwrap();

        // 6 months × (2 prefectures + national)
        assert_eq!(wide.len(), 18);

        // every input triple reproduced
        let tokyo_jan: &WideRecord = wide
            .iter()
            .find(|r| r.ym == "2023-01" && r.pref_code == "13")
            .unwrap();
        assert_eq!(
            (tokyo_jan.total, tokyo_jan.jp, tokyo_jan.foreign),
            (10.0, 5.0, 1.0)
        );

        // national rows equal the sum of all prefecture rows per ym
        for ym in ["2023-01", "2023-02", "2023-03", "2024-01", "2024-02", "2024-03"] {
            let nat = wide
                .iter()
                .find(|r| r.ym == ym && r.pref_code == "00")
                .unwrap();
            let (mut t, mut j, mut f) = (0.0, 0.0, 0.0);
            for r in wide.iter().filter(|r| r.ym == ym && r.pref_code != "00") {
                t += r.total;
                j += r.jp;
                f += r.foreign;
            }
            assert_eq!((nat.total, nat.jp, nat.foreign), (t, j, f));
            assert_eq!(nat.pref_name, "全国");
        }

        // sorted by (ym, pref_code) ascending
        let keys: Vec<(&str, &str)> = wide
            .iter()
            .map(|r| (r.ym.as_str(), r.pref_code.as_str()))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn source_national_row_is_distrusted() {
        // Source 全国 row deliberately off by a wide margin.
        let g_total = trend_sheet(&[
            ("全　国", &[999.0, 999.0, 999.0, 999.0, 999.0, 999.0]),
            ("01北海道", &[1.0, 1.0, 1.0, 1.0, 1.0, 1.0]),
            ("13東京都", &[2.0, 2.0, 2.0, 2.0, 2.0, 2.0]),
        ]);
        let g_other = trend_sheet(&[
            ("01北海道", &[1.0, 1.0, 1.0, 1.0, 1.0, 1.0]),
            ("13東京都", &[2.0, 2.0, 2.0, 2.0, 2.0, 2.0]),
        ]);

        let wide = build_wide_from_three_sheets(&g_total, &g_other, &g_other).unwrap();
        let nat = wide
            .iter()
            .find(|r| r.ym == "2023-01" && r.pref_code == "00")
            .unwrap();
        assert_eq!(nat.total, 3.0);
    }

    #[test]
    fn missing_metric_coverage_fills_zero() {
        // jp sheet misses 北海道 entirely; its jp column must come out 0.0.
        let g_total = trend_sheet(&[
            ("01北海道", &[1.0, 1.0, 1.0, 1.0, 1.0, 1.0]),
            ("13東京都", &[2.0, 2.0, 2.0, 2.0, 2.0, 2.0]),
        ]);
        let g_jp = trend_sheet(&[("13東京都", &[2.0, 2.0, 2.0, 2.0, 2.0, 2.0])]);
        let g_foreign = trend_sheet(&[
            ("01北海道", &[1.0, 1.0, 1.0, 1.0, 1.0, 1.0]),
            ("13東京都", &[2.0, 2.0, 2.0, 2.0, 2.0, 2.0]),
        ]);

        let wide = build_wide_from_three_sheets(&g_total, &g_jp, &g_foreign).unwrap();
        let hokkaido = wide
            .iter()
            .find(|r| r.ym == "2023-01" && r.pref_code == "01")
            .unwrap();
        assert_eq!(hokkaido.jp, 0.0);
        assert_eq!(hokkaido.total, 1.0);
    }
}
