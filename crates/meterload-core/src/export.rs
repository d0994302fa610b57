//! Period re-aggregation and delimited export
//!
//! Hourly records are re-bucketed to the requested resolution and rendered as
//! `;`-separated text with comma decimals, prefixed with a byte-order mark so
//! spreadsheet tools pick up the encoding.
//!
//! At hourly resolution the values are the hour's average power. At daily and
//! monthly resolution each quantity is the sum of the hourly averages in the
//! period, i.e. accumulated energy.

use crate::aggregator::HourlyRecord;
use crate::error::Result;
use crate::reading::Quantity;
use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Byte-order mark written at the start of every export
pub const BOM: &str = "\u{feff}";

/// Field separator
pub const SEPARATOR: char = ';';

/// Export granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Hourly,
    Daily,
    Monthly,
}

impl Resolution {
    pub fn name(&self) -> &'static str {
        match self {
            Resolution::Hourly => "hourly",
            Resolution::Daily => "daily",
            Resolution::Monthly => "monthly",
        }
    }

    /// Start of the period containing `hour`
    pub fn period_start(&self, hour: NaiveDateTime) -> NaiveDateTime {
        match self {
            Resolution::Hourly => hour,
            Resolution::Daily => hour.date().and_time(NaiveTime::MIN),
            Resolution::Monthly => {
                let first = hour.date() - Duration::days(i64::from(hour.day0()));
                first.and_time(NaiveTime::MIN)
            }
        }
    }

    /// Label used for a period starting at `start`
    pub fn label(&self, start: NaiveDateTime) -> String {
        let format = match self {
            Resolution::Hourly => "%d/%m/%Y %H:%M",
            Resolution::Daily => "%d/%m/%Y",
            Resolution::Monthly => "%m/%Y",
        };
        start.format(format).to_string()
    }

    fn unit(&self, quantity: Quantity) -> &'static str {
        match (self, quantity) {
            (Resolution::Hourly, Quantity::Active) => "kW",
            (Resolution::Hourly, _) => "kvar",
            (_, Quantity::Active) => "kWh",
            (_, _) => "kvarh",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hourly" | "hour" => Ok(Resolution::Hourly),
            "daily" | "day" => Ok(Resolution::Daily),
            "monthly" | "month" => Ok(Resolution::Monthly),
            other => Err(format!(
                "unknown resolution '{other}', expected hourly, daily or monthly"
            )),
        }
    }
}

fn all_columns() -> Vec<Quantity> {
    Quantity::ALL.to_vec()
}

/// What to export and how to lay it out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSpec {
    pub resolution: Resolution,
    /// Put the time of day in its own column (hourly resolution only)
    #[serde(default)]
    pub split_date_time: bool,
    /// Enabled quantities; rendered in fixed active/inductive/capacitive order
    #[serde(default = "all_columns")]
    pub columns: Vec<Quantity>,
}

impl ExportSpec {
    /// All quantities, combined date/time column
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            split_date_time: false,
            columns: all_columns(),
        }
    }

    /// Enabled quantities in output order, without duplicates
    pub fn enabled_columns(&self) -> Vec<Quantity> {
        Quantity::ALL
            .into_iter()
            .filter(|q| self.columns.contains(q))
            .collect()
    }

    fn splits_time(&self) -> bool {
        self.split_date_time && self.resolution == Resolution::Hourly
    }
}

/// One re-bucketed period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodRecord {
    pub period_start: NaiveDateTime,
    pub label: String,
    pub active: f64,
    pub inductive: f64,
    pub capacitive: f64,
}

impl PeriodRecord {
    pub fn get(&self, quantity: Quantity) -> f64 {
        match quantity {
            Quantity::Active => self.active,
            Quantity::Inductive => self.inductive,
            Quantity::Capacitive => self.capacitive,
        }
    }
}

/// Re-bucket hourly records.
///
/// Hourly resolution passes the averages through one to one. Daily and
/// monthly sum the hourly averages per calendar period. Output is sorted by
/// `period_start`.
pub fn aggregate_periods(hourly: &[HourlyRecord], resolution: Resolution) -> Vec<PeriodRecord> {
    let mut sums: BTreeMap<NaiveDateTime, [f64; 3]> = BTreeMap::new();
    for record in hourly {
        let slot = sums
            .entry(resolution.period_start(record.hour_start))
            .or_insert([0.0; 3]);
        for (sum, quantity) in slot.iter_mut().zip(Quantity::ALL) {
            *sum += record.stats(quantity).avg;
        }
    }

    sums.into_iter()
        .map(|(start, [active, inductive, capacitive])| PeriodRecord {
            period_start: start,
            label: resolution.label(start),
            active,
            inductive,
            capacitive,
        })
        .collect()
}

/// Rendered export, ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct ExportTable {
    pub resolution: Resolution,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Render hourly records as text rows according to `spec`
pub fn render_rows(hourly: &[HourlyRecord], spec: &ExportSpec) -> ExportTable {
    let columns = spec.enabled_columns();
    let split = spec.splits_time();

    let mut header = Vec::with_capacity(columns.len() + 2);
    if split {
        header.push("Date".to_string());
        header.push("Time".to_string());
    } else if spec.resolution == Resolution::Hourly {
        header.push("Date/Time".to_string());
    } else {
        header.push("Date".to_string());
    }
    for quantity in &columns {
        header.push(column_title(*quantity, spec.resolution));
    }

    let rows = aggregate_periods(hourly, spec.resolution)
        .iter()
        .map(|period| {
            let mut row = Vec::with_capacity(header.len());
            if split {
                row.push(period.period_start.format("%d/%m/%Y").to_string());
                row.push(period.period_start.format("%H:%M").to_string());
            } else {
                row.push(period.label.clone());
            }
            row.extend(columns.iter().map(|q| format_value(period.get(*q))));
            row
        })
        .collect();

    ExportTable {
        resolution: spec.resolution,
        header,
        rows,
    }
}

fn column_title(quantity: Quantity, resolution: Resolution) -> String {
    let name = match quantity {
        Quantity::Active => "Active",
        Quantity::Inductive => "Inductive",
        Quantity::Capacitive => "Capacitive",
    };
    format!("{name} ({})", resolution.unit(quantity))
}

/// Two decimals with a comma decimal separator
pub fn format_value(value: f64) -> String {
    let text = format!("{value:.2}").replace('.', ",");
    // Tiny negatives round to "-0,00"
    if text == "-0,00" {
        "0,00".to_string()
    } else {
        text
    }
}

/// Write the BOM, header and rows
pub fn write_csv<W: Write>(table: &ExportTable, mut writer: W) -> Result<()> {
    writer.write_all(BOM.as_bytes())?;
    write_line(&mut writer, &table.header)?;
    for row in &table.rows {
        write_line(&mut writer, row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Render to an in-memory string (BOM included)
pub fn to_csv_string(table: &ExportTable) -> String {
    let mut out = String::from(BOM);
    for line in std::iter::once(&table.header).chain(&table.rows) {
        out.push_str(&join_fields(line));
        out.push('\n');
    }
    out
}

fn write_line<W: Write>(writer: &mut W, fields: &[String]) -> Result<()> {
    writeln!(writer, "{}", join_fields(fields))?;
    Ok(())
}

fn join_fields(fields: &[String]) -> String {
    fields
        .iter()
        .map(|f| escape_field(f))
        .collect::<Vec<_>>()
        .join(&SEPARATOR.to_string())
}

fn escape_field(s: &str) -> String {
    if s.contains(SEPARATOR) || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// `<product>_export_<resolution>.csv`, with path-unsafe characters replaced
pub fn export_file_name(product: &str, resolution: Resolution) -> String {
    let product: String = product
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let product = if product.is_empty() {
        "meterload".to_string()
    } else {
        product
    };
    format!("{product}_export_{resolution}.csv")
}

/// Write an export into `output_dir` (created if missing) and return its path
pub fn write_export<P: AsRef<Path>>(
    output_dir: P,
    product: &str,
    table: &ExportTable,
) -> Result<PathBuf> {
    let output_dir = output_dir.as_ref();
    fs::create_dir_all(output_dir)?;

    let path = output_dir.join(export_file_name(product, table.resolution));
    let file = File::create(&path)?;
    write_csv(table, BufWriter::new(file))?;

    tracing::info!(
        path = %path.display(),
        resolution = %table.resolution,
        rows = table.rows.len(),
        "wrote export"
    );
    Ok(path)
}
