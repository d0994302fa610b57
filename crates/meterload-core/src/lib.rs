//! meterload-core: Core library for importing and aggregating metering exports
//!
//! This library provides functionality to:
//! - Load the first sheet of CSV and workbook files into a cell grid
//! - Normalize loosely formatted numbers and timestamps
//! - Extract readings through a row/column mapping and merge many files
//! - Aggregate readings hourly and re-bucket them daily or monthly
//! - Export `;`-separated reports and save/restore project snapshots

pub mod aggregator;
pub mod error;
pub mod export;
pub mod extractor;
pub mod grid;
pub mod job;
pub mod mapping;
pub mod merger;
pub mod number;
pub mod parser;
pub mod project;
pub mod reading;
pub mod scanner;
pub mod timestamp;

pub use aggregator::{aggregate_hourly, summarize, HourlyRecord, QuantityStats, SeriesSummary};
pub use error::{Error, Result};
pub use export::{
    aggregate_periods, render_rows, to_csv_string, write_csv, write_export, ExportSpec,
    ExportTable, PeriodRecord, Resolution,
};
pub use extractor::{extract, read_cpe, Extraction};
pub use grid::{CellAccessor, CellValue, Grid};
pub use job::{run_job, JobFile, JobReport};
pub use mapping::{CellRef, FieldMapping};
pub use merger::{import_files, merge_grids, ImportOptions, MergeOutcome};
pub use number::parse_number;
pub use parser::{load_grid, parse_csv, parse_workbook, SourceFormat};
pub use project::{Dataset, ProjectMetadata, ProjectSnapshot};
pub use reading::{Quantity, RawReading};
pub use scanner::collect_inputs;
pub use timestamp::resolve_timestamp;
