// src/process/layout.rs
//
// Structure inference for the monthly trend sheets (1-2 / 2-2 / 3-2). The
// header is two stacked rows: an era-year row with merged cells over the
// twelve month cells below it. Nothing about the header position is fixed
// across releases, so it is scanned for rather than read at offsets.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::process::era::era_label_to_year;
use crate::process::grid::SheetGrid;
use crate::process::ParseError;

static MONTH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d{1,2})\s*月\s*$").unwrap());
static PREF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{2})(.+)$").unwrap());
static WESTERN_YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d{4})\s*年\s*$").unwrap());

const SCAN_ROWS: u32 = 30;
const SCAN_COLS: u32 = 80;
const MAX_YM_COLS: u32 = 200;
const MAX_PREF_ROWS: u32 = 200;

/// Where the month header sits in a trend sheet. The era-year labels are
/// always the row directly above the month labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderLayout {
    pub year_row: u32,
    pub month_row: u32,
    pub first_data_col: u32,
}

/// One data column of the header: sheet column and its `YYYY-MM` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YmColumn {
    pub col: u32,
    pub ym: String,
}

/// One prefecture row below the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefRow {
    pub row: u32,
    pub pref_code: String,
    pub pref_name: String,
}

/// Scan a bounded window row-major for the first month label ('1月' etc).
/// That cell fixes the whole header geometry.
pub fn detect_layout<G: SheetGrid>(grid: &G) -> Result<HeaderLayout, ParseError> {
    for r in 1..=SCAN_ROWS {
        for c in 1..=SCAN_COLS {
            let Some(v) = grid.cell_str(r, c) else {
                continue;
            };
            if MONTH_RE.is_match(&v) {
                return Ok(HeaderLayout {
                    year_row: r - 1,
                    month_row: r,
                    first_data_col: c,
                });
            }
        }
    }
    Err(ParseError::LayoutNotFound)
}

/// Walk the header left to right, propagating merged era-year labels: a
/// non-empty year cell applies to its own column and every following column
/// until the next non-empty year cell.
pub fn build_ym_columns<G: SheetGrid>(
    grid: &G,
    layout: &HeaderLayout,
) -> Result<Vec<YmColumn>, ParseError> {
    let mut columns: Vec<YmColumn> = Vec::new();
    let mut current_year_label: Option<String> = None;

    for c in layout.first_data_col..layout.first_data_col + MAX_YM_COLS {
        let Some(month_v) = grid.cell_str(layout.month_row, c) else {
            // Tolerate a lone gap; two consecutive empties end the header.
            if !columns.is_empty() && grid.cell_str(layout.month_row, c + 1).is_none() {
                break;
            }
            continue;
        };

        let Some(caps) = MONTH_RE.captures(&month_v) else {
            // Non-month text after data means the header is over.
            if !columns.is_empty() {
                break;
            }
            continue;
        };

        if let Some(year_v) = grid.cell_str(layout.year_row, c) {
            current_year_label = Some(year_v);
        }
        let label = current_year_label
            .as_deref()
            .ok_or(ParseError::MissingYearLabel { col: c })?;

        let year = year_label_to_year(label)?;
        let month: u32 = caps
            .get(1)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        columns.push(YmColumn {
            col: c,
            ym: format!("{year:04}-{month:02}"),
        });
    }

    if columns.is_empty() {
        return Err(ParseError::NoYmColumns);
    }
    Ok(columns)
}

/// Year labels in the header are usually era-based ('令和5年') but some
/// releases use plain Gregorian years ('2023年').
fn year_label_to_year(label: &str) -> Result<i32, ParseError> {
    if let Some(caps) = WESTERN_YEAR_RE.captures(label) {
        if let Ok(y) = caps[1].parse() {
            return Ok(y);
        }
    }
    era_label_to_year(label)
}

/// Walk rows below the header yielding prefecture rows. The national summary
/// row ('全国', sometimes spaced '全 国') maps to the reserved pseudo-code
/// "00". Annotation rows are skipped; two consecutive empty first-column
/// cells end the block.
pub fn pref_rows<G: SheetGrid>(grid: &G, start_row: u32) -> Vec<PrefRow> {
    let mut rows = Vec::new();

    for r in start_row..start_row + MAX_PREF_ROWS {
        let Some(v) = grid.cell_str(r, 1) else {
            if grid.cell_str(r + 1, 1).is_none() {
                break;
            }
            continue;
        };

        let s: String = v.chars().filter(|c| *c != ' ' && *c != '　').collect();
        if s.is_empty() {
            continue;
        }

        if s.starts_with('全') {
            rows.push(PrefRow {
                row: r,
                pref_code: "00".to_string(),
                pref_name: "全国".to_string(),
            });
            continue;
        }

        if let Some(caps) = PREF_RE.captures(&s) {
            rows.push(PrefRow {
                row: r,
                pref_code: caps[1].to_string(),
                pref_name: caps[2].to_string(),
            });
        }
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::grid::VecGrid;

    fn month_header(grid: &mut VecGrid, row: u32, first_col: u32, months: &[u32]) {
        for (i, m) in months.iter().enumerate() {
            grid.put(row, first_col + i as u32, &format!("{m}月"));
        }
    }

    #[test]
    fn detects_header_from_first_month_cell() {
        let mut g = VecGrid::new();
        g.put(1, 1, "第1表 延べ宿泊者数");
        g.put(3, 4, "令和5年");
        month_header(&mut g, 4, 4, &[1, 2, 3]);

        let layout = detect_layout(&g).unwrap();
        assert_eq!(
            layout,
            HeaderLayout {
                year_row: 3,
                month_row: 4,
                first_data_col: 4
            }
        );
    }

    #[test]
    fn layout_not_found_is_fatal_for_sheet() {
        let mut g = VecGrid::new();
        g.put(1, 1, "タイトルだけのシート");
        assert!(matches!(detect_layout(&g), Err(ParseError::LayoutNotFound)));
    }

    #[test]
    fn single_year_label_covers_all_month_columns() {
        let mut g = VecGrid::new();
        g.put(1, 2, "令和5年");
        month_header(&mut g, 2, 2, &[1, 2, 3, 4, 5, 6]);
        let layout = detect_layout(&g).unwrap();

        let cols = build_ym_columns(&g, &layout).unwrap();
        assert_eq!(cols.len(), 6);
        let yms: Vec<&str> = cols.iter().map(|c| c.ym.as_str()).collect();
        assert_eq!(
            yms,
            ["2023-01", "2023-02", "2023-03", "2023-04", "2023-05", "2023-06"]
        );
        for pair in cols.windows(2) {
            assert!(pair[0].col < pair[1].col);
            assert!(pair[0].ym < pair[1].ym);
        }
    }

    #[test]
    fn merged_year_labels_propagate_until_overwritten() {
        let mut g = VecGrid::new();
        // 令和5年 spans three months, then 令和6年 takes over.
        g.put(1, 2, "令和5年");
        g.put(1, 5, "令和6年");
        month_header(&mut g, 2, 2, &[1, 2, 3, 1, 2, 3]);
        let layout = detect_layout(&g).unwrap();

        let yms: Vec<String> = build_ym_columns(&g, &layout)
            .unwrap()
            .into_iter()
            .map(|c| c.ym)
            .collect();
        assert_eq!(
            yms,
            ["2023-01", "2023-02", "2023-03", "2024-01", "2024-02", "2024-03"]
        );
    }

    #[test]
    fn western_year_labels_accepted() {
        let mut g = VecGrid::new();
        g.put(1, 2, "2023年");
        month_header(&mut g, 2, 2, &[1, 2, 3]);
        let layout = detect_layout(&g).unwrap();

        let yms: Vec<String> = build_ym_columns(&g, &layout)
            .unwrap()
            .into_iter()
            .map(|c| c.ym)
            .collect();
        assert_eq!(yms, ["2023-01", "2023-02", "2023-03"]);
    }

    #[test]
    fn month_without_year_label_fails() {
        let mut g = VecGrid::new();
        month_header(&mut g, 2, 2, &[1, 2]);
        let layout = detect_layout(&g).unwrap();
        assert!(matches!(
            build_ym_columns(&g, &layout),
            Err(ParseError::MissingYearLabel { col: 2 })
        ));
    }

    #[test]
    fn header_terminates_on_trailing_text() {
        let mut g = VecGrid::new();
        g.put(1, 2, "令和5年");
        month_header(&mut g, 2, 2, &[1, 2]);
        g.put(2, 4, "年計");
        let layout = detect_layout(&g).unwrap();
        assert_eq!(build_ym_columns(&g, &layout).unwrap().len(), 2);
    }

    #[test]
    fn pref_rows_classify_national_pref_and_annotations() {
        let mut g = VecGrid::new();
        g.put(5, 1, "全　国");
        g.put(6, 1, "01北海道");
        g.put(7, 1, "13東京都");
        g.put(8, 1, "※ 注記: 速報値を含む");
        g.put(9, 1, "47沖縄県");

        let rows = pref_rows(&g, 5);
        let got: Vec<(&str, &str)> = rows
            .iter()
            .map(|p| (p.pref_code.as_str(), p.pref_name.as_str()))
            .collect();
        assert_eq!(
            got,
            [
                ("00", "全国"),
                ("01", "北海道"),
                ("13", "東京都"),
                ("47", "沖縄県")
            ]
        );
    }

    #[test]
    fn pref_scan_stops_after_two_consecutive_blanks() {
        let mut g = VecGrid::new();
        g.put(5, 1, "01北海道");
        // rows 6 and 7 empty, row 8 would otherwise match
        g.put(8, 1, "02青森県");
        let rows = pref_rows(&g, 5);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pref_code, "01");
    }
}
