// src/process/mod.rs
pub mod era;
pub mod grid;
pub mod layout;
pub mod monthly;
pub mod period;
pub mod sections;
pub mod select;

use thiserror::Error;

/// Errors raised while inferring structure from a workbook. These are local
/// to one source file: the update layer catches them at the per-file
/// boundary and records the file as skipped instead of aborting the run.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unknown era: {0}")]
    UnknownEra(String),

    #[error("unsupported era-year label: {0:?}")]
    MalformedEraLabel(String),

    #[error("failed to detect month header row/col (e.g. '1月')")]
    LayoutNotFound,

    #[error("missing year label around column {col}")]
    MissingYearLabel { col: u32 },

    #[error("no year-month columns detected")]
    NoYmColumns,

    #[error("no data rows parsed from {0}")]
    NoDataParsed(String),

    #[error("section marker '宿泊数' not found in sheet")]
    NoSectionsFound,

    #[error("failed to parse period from text: {0:?}")]
    PeriodParse(String),

    #[error("unsupported release type in title/link: {title:?} / {link_text:?}")]
    UnsupportedReleaseType { title: String, link_text: String },

    #[error("sheet {0:?} not found in workbook")]
    SheetNotFound(String),
}
