// src/process/grid.rs
use calamine::{Data, Range};

/// Read-only view over a rectangular sheet, 1-based (row, col) like the
/// published workbooks are discussed in. Implemented for calamine ranges in
/// production and for an in-memory grid in tests, so the structure-inference
/// code never touches the spreadsheet library directly.
pub trait SheetGrid {
    /// Text content of a cell, trimmed; `None` for empty/blank cells.
    /// Numeric cells are rendered as text (merged year headers are sometimes
    /// stored as numbers).
    fn cell_str(&self, row: u32, col: u32) -> Option<String>;

    /// Numeric content of a cell; `None` for anything not numeric-typed.
    fn cell_num(&self, row: u32, col: u32) -> Option<f64>;

    fn max_row(&self) -> u32;

    fn max_col(&self) -> u32;
}

impl SheetGrid for Range<Data> {
    fn cell_str(&self, row: u32, col: u32) -> Option<String> {
        if row == 0 || col == 0 {
            return None;
        }
        match self.get_value((row - 1, col - 1))? {
            Data::String(s) => {
                let t = s.trim();
                if t.is_empty() {
                    None
                } else {
                    Some(t.to_string())
                }
            }
            Data::Int(i) => Some(i.to_string()),
            Data::Float(f) => {
                if f.fract() == 0.0 {
                    Some(format!("{}", *f as i64))
                } else {
                    Some(f.to_string())
                }
            }
            _ => None,
        }
    }

    fn cell_num(&self, row: u32, col: u32) -> Option<f64> {
        if row == 0 || col == 0 {
            return None;
        }
        match self.get_value((row - 1, col - 1))? {
            Data::Int(i) => Some(*i as f64),
            Data::Float(f) => Some(*f),
            _ => None,
        }
    }

    fn max_row(&self) -> u32 {
        self.end().map(|(r, _)| r + 1).unwrap_or(0)
    }

    fn max_col(&self) -> u32 {
        self.end().map(|(_, c)| c + 1).unwrap_or(0)
    }
}

#[cfg(test)]
pub use self::test_grid::VecGrid;

#[cfg(test)]
mod test_grid {
    use super::SheetGrid;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone)]
    enum Cell {
        Str(String),
        Num(f64),
    }

    /// In-memory sheet for building synthetic layouts in tests.
    #[derive(Debug, Default, Clone)]
    pub struct VecGrid {
        cells: BTreeMap<(u32, u32), Cell>,
    }

    impl VecGrid {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn put(&mut self, row: u32, col: u32, text: &str) -> &mut Self {
            self.cells.insert((row, col), Cell::Str(text.to_string()));
            self
        }

        pub fn put_num(&mut self, row: u32, col: u32, value: f64) -> &mut Self {
            self.cells.insert((row, col), Cell::Num(value));
            self
        }
    }

    impl SheetGrid for VecGrid {
        fn cell_str(&self, row: u32, col: u32) -> Option<String> {
            match self.cells.get(&(row, col))? {
                Cell::Str(s) => {
                    let t = s.trim();
                    if t.is_empty() {
                        None
                    } else {
                        Some(t.to_string())
                    }
                }
                Cell::Num(f) => {
                    if f.fract() == 0.0 {
                        Some(format!("{}", *f as i64))
                    } else {
                        Some(f.to_string())
                    }
                }
            }
        }

        fn cell_num(&self, row: u32, col: u32) -> Option<f64> {
            match self.cells.get(&(row, col))? {
                Cell::Num(f) => Some(*f),
                Cell::Str(_) => None,
            }
        }

        fn max_row(&self) -> u32 {
            self.cells.keys().map(|(r, _)| *r).max().unwrap_or(0)
        }

        fn max_col(&self) -> u32 {
            self.cells.keys().map(|(_, c)| *c).max().unwrap_or(0)
        }
    }
}
