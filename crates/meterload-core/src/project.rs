//! Project snapshots and the in-memory dataset they restore
//!
//! A snapshot stores metadata plus the full reading and hourly series as
//! JSON. Timestamps are ISO-8601 strings and are parsed back to instants on
//! load; a snapshot that fails to parse never touches the current dataset.

use crate::aggregator::{aggregate_hourly, HourlyRecord};
use crate::error::{Error, Result};
use crate::mapping::FieldMapping;
use crate::merger::MergeOutcome;
use crate::reading::RawReading;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Current snapshot layout version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Descriptive part of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    /// Product or site name, used for export file names
    pub product: String,
    #[serde(default)]
    pub cpe: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Files the readings were imported from
    #[serde(default)]
    pub sources: Vec<PathBuf>,
    /// Mapping used for the import, if known
    #[serde(default)]
    pub mapping: Option<FieldMapping>,
    pub version: u32,
}

/// A saved project: metadata, raw readings and hourly records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub metadata: ProjectMetadata,
    pub readings: Vec<RawReading>,
    pub hourly: Vec<HourlyRecord>,
}

impl ProjectSnapshot {
    /// Load and validate a snapshot
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut snapshot: ProjectSnapshot =
            serde_json::from_str(&content).map_err(|e| Error::ProjectLoad {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        if snapshot.metadata.version > SNAPSHOT_VERSION {
            return Err(Error::ProjectLoad {
                path: path.to_path_buf(),
                message: format!(
                    "snapshot version {} is newer than supported version {}",
                    snapshot.metadata.version, SNAPSHOT_VERSION
                ),
            });
        }

        snapshot.readings.sort_by_key(|r| r.timestamp);
        if snapshot.hourly.is_empty() && !snapshot.readings.is_empty() {
            snapshot.hourly = aggregate_hourly(&snapshot.readings);
        } else {
            snapshot.hourly.sort_by_key(|r| r.hour_start);
        }

        tracing::debug!(
            path = %path.display(),
            readings = snapshot.readings.len(),
            hours = snapshot.hourly.len(),
            "loaded snapshot"
        );
        Ok(snapshot)
    }

    /// Save the snapshot as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        tracing::info!(path = %path.display(), "saved snapshot");
        Ok(())
    }
}

/// The current series: readings, their hourly aggregate and the CPE
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub readings: Vec<RawReading>,
    pub hourly: Vec<HourlyRecord>,
    pub cpe: Option<String>,
    pub sources: Vec<PathBuf>,
}

impl Dataset {
    /// Create an empty dataset
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a dataset from a merge, aggregating it hourly
    pub fn from_merge(outcome: MergeOutcome) -> Self {
        let hourly = aggregate_hourly(&outcome.readings);
        Self {
            readings: outcome.readings,
            hourly,
            cpe: outcome.cpe,
            sources: outcome.sources,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Replace the whole series with a new one
    pub fn replace(&mut self, other: Dataset) {
        *self = other;
    }

    /// Restore a snapshot into this dataset.
    ///
    /// The file is fully parsed first; on any error `self` is unchanged.
    pub fn load_snapshot<P: AsRef<Path>>(&mut self, path: P) -> Result<ProjectMetadata> {
        let snapshot = ProjectSnapshot::load(path)?;
        self.replace(Dataset {
            readings: snapshot.readings,
            hourly: snapshot.hourly,
            cpe: snapshot.metadata.cpe.clone(),
            sources: snapshot.metadata.sources.clone(),
        });
        Ok(snapshot.metadata)
    }

    /// Capture the dataset as a snapshot
    pub fn snapshot(&self, product: &str, mapping: Option<&FieldMapping>) -> ProjectSnapshot {
        ProjectSnapshot {
            metadata: ProjectMetadata {
                product: product.to_string(),
                cpe: self.cpe.clone(),
                created_at: Utc::now(),
                sources: self.sources.clone(),
                mapping: mapping.cloned(),
                version: SNAPSHOT_VERSION,
            },
            readings: self.readings.clone(),
            hourly: self.hourly.clone(),
        }
    }
}
