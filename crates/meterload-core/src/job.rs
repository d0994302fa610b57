//! Job files: a declarative import-and-export run
//!
//! A job names its inputs, the mapping to apply and the exports to produce,
//! so a recurring report can be regenerated with one command.

use crate::aggregator::{summarize, SeriesSummary};
use crate::error::{Error, Result};
use crate::export::{render_rows, write_export, ExportSpec, Resolution};
use crate::mapping::FieldMapping;
use crate::merger::{import_files, ImportOptions, DEFAULT_READ_TIMEOUT};
use crate::project::Dataset;
use crate::scanner::collect_inputs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_read_timeout_secs() -> u64 {
    DEFAULT_READ_TIMEOUT.as_secs()
}

/// A job file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFile {
    /// Product or site name, used in export file names
    pub product: String,
    /// Source files and directories, in import order
    pub inputs: Vec<PathBuf>,
    pub mapping: FieldMapping,
    /// Exports to write
    pub exports: Vec<ExportSpec>,
    /// Output directory for exports
    pub output_dir: PathBuf,
    /// Where to save a project snapshot, if anywhere
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<PathBuf>,
    /// Per-file load limit
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
}

impl JobFile {
    /// Load a job file from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the job file to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// An editable example covering every field
    pub fn template() -> Self {
        Self {
            product: "site".to_string(),
            inputs: vec![PathBuf::from("data")],
            mapping: FieldMapping::template(),
            exports: vec![
                ExportSpec {
                    resolution: Resolution::Hourly,
                    split_date_time: true,
                    ..ExportSpec::new(Resolution::Hourly)
                },
                ExportSpec::new(Resolution::Daily),
                ExportSpec::new(Resolution::Monthly),
            ],
            output_dir: PathBuf::from("exports"),
            snapshot: Some(PathBuf::from("exports/project.json")),
            read_timeout_secs: default_read_timeout_secs(),
        }
    }

    /// Resolve relative paths against `base` (normally the job file's directory)
    pub fn relative_to(mut self, base: &Path) -> Self {
        let resolve = |p: PathBuf| if p.is_relative() { base.join(p) } else { p };
        self.inputs = self.inputs.into_iter().map(resolve).collect();
        self.output_dir = resolve(self.output_dir);
        self.snapshot = self.snapshot.map(resolve);
        self
    }

    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            read_timeout: Duration::from_secs(self.read_timeout_secs),
        }
    }
}

/// What a job run produced
#[derive(Debug, Clone)]
pub struct JobReport {
    pub sources: Vec<PathBuf>,
    pub cpe: Option<String>,
    pub readings: usize,
    pub skipped_rows: usize,
    pub summary: Option<SeriesSummary>,
    /// Export files written, in job order
    pub exports: Vec<PathBuf>,
    pub snapshot: Option<PathBuf>,
}

/// Run a job: import, aggregate, write every export, then the snapshot
pub async fn run_job(job: &JobFile) -> Result<JobReport> {
    job.mapping.validate()?;

    let inputs = collect_inputs(&job.inputs)?;
    tracing::info!(product = %job.product, files = inputs.len(), "running job");

    let outcome = import_files(&inputs, &job.mapping, &job.import_options()).await?;
    let skipped_rows = outcome.skipped_rows;
    let dataset = Dataset::from_merge(outcome);

    let mut exports = Vec::with_capacity(job.exports.len());
    for spec in &job.exports {
        let table = render_rows(&dataset.hourly, spec);
        exports.push(write_export(&job.output_dir, &job.product, &table)?);
    }

    if let Some(path) = &job.snapshot {
        dataset.snapshot(&job.product, Some(&job.mapping)).save(path)?;
    }

    Ok(JobReport {
        summary: summarize(&dataset.hourly),
        sources: dataset.sources,
        cpe: dataset.cpe,
        readings: dataset.readings.len(),
        skipped_rows,
        exports,
        snapshot: job.snapshot.clone(),
    })
}
