//! Multi-file merge: extract every source and build one time-ordered series

use crate::error::{Error, Result};
use crate::extractor::{extract, read_cpe, Extraction};
use crate::grid::Grid;
use crate::mapping::FieldMapping;
use crate::parser::load_grid;
use crate::reading::RawReading;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Default per-file load limit
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// The consolidated series from one import
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// All readings, stably sorted by timestamp; duplicates are kept
    pub readings: Vec<RawReading>,
    /// Installation identifier from the first source, if mapped and present
    pub cpe: Option<String>,
    /// Sources in input order
    pub sources: Vec<PathBuf>,
    /// Rows dropped across all sources because their timestamp did not resolve
    pub skipped_rows: usize,
}

/// Options for [`import_files`]
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Limit for loading and extracting a single file
    pub read_timeout: Duration,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// Extraction result for one source
#[derive(Debug)]
struct SourcePart {
    path: PathBuf,
    extraction: Extraction,
    cpe: Option<String>,
}

/// Merge already-loaded grids, in input order.
///
/// Overlapping sources are not de-duplicated: a timestamp present in two
/// grids appears twice in the result.
pub fn merge_grids(grids: &[Grid], mapping: &FieldMapping) -> Result<MergeOutcome> {
    let parts = grids
        .iter()
        .enumerate()
        .map(|(index, grid)| extract_part(index, grid, mapping))
        .collect();

    combine(parts)
}

/// Load, extract and merge source files.
///
/// Files are loaded in parallel, each on its own reader thread and under
/// `options.read_timeout`. The first failing file aborts the import; results
/// are concatenated in input order before the final stable sort, so the
/// outcome does not depend on which file finished first.
pub async fn import_files(
    paths: &[PathBuf],
    mapping: &FieldMapping,
    options: &ImportOptions,
) -> Result<MergeOutcome> {
    let handles: Vec<JoinHandle<Result<SourcePart>>> = paths
        .iter()
        .enumerate()
        .map(|(index, path)| {
            tokio::spawn(load_part(
                index,
                path.clone(),
                mapping.clone(),
                options.read_timeout,
            ))
        })
        .collect();

    let mut parts = Vec::with_capacity(handles.len());
    let mut pending = handles.into_iter();
    while let Some(handle) = pending.next() {
        let part = match handle.await {
            Ok(Ok(part)) => part,
            Ok(Err(e)) => {
                pending.for_each(|h| h.abort());
                return Err(e);
            }
            Err(e) => {
                pending.for_each(|h| h.abort());
                return Err(Error::Task(e.to_string()));
            }
        };
        parts.push(part);
    }

    combine(parts)
}

/// Load and extract one file under `limit`.
///
/// The read runs on its own detached thread rather than the runtime's
/// blocking pool: a read stuck on a pipe or a dead network share cannot be
/// interrupted, and the runtime waits for blocking-pool tasks on shutdown.
/// On timeout the thread is abandoned and its result discarded.
async fn load_part(
    index: usize,
    path: PathBuf,
    mapping: FieldMapping,
    limit: Duration,
) -> Result<SourcePart> {
    let (tx, rx) = oneshot::channel();
    let task_path = path.clone();
    std::thread::Builder::new()
        .name(format!("meterload-read-{index}"))
        .spawn(move || {
            let part = load_grid(&task_path).map(|grid| extract_part(index, &grid, &mapping));
            // The receiver is gone after a timeout
            let _ = tx.send(part);
        })?;

    match tokio::time::timeout(limit, rx).await {
        Ok(Ok(part)) => part,
        Ok(Err(_)) => Err(Error::Task(format!(
            "reader for '{}' exited without a result",
            path.display()
        ))),
        Err(_) => {
            tracing::warn!(path = %path.display(), seconds = limit.as_secs(), "read timed out");
            Err(Error::ReadTimeout {
                path,
                seconds: limit.as_secs(),
            })
        }
    }
}

fn extract_part(index: usize, grid: &Grid, mapping: &FieldMapping) -> SourcePart {
    let extraction = extract(grid, mapping);
    // The identifier is only ever taken from the first source
    let cpe = if index == 0 {
        read_cpe(grid, mapping)
    } else {
        None
    };

    if extraction.readings.is_empty() {
        tracing::warn!(
            path = %grid.source_path.display(),
            "no readings extracted; check the mapping against this file's layout"
        );
    } else {
        tracing::debug!(
            path = %grid.source_path.display(),
            readings = extraction.readings.len(),
            skipped = extraction.skipped_rows,
            "extracted source"
        );
    }

    SourcePart {
        path: grid.source_path.clone(),
        extraction,
        cpe,
    }
}

fn combine(parts: Vec<SourcePart>) -> Result<MergeOutcome> {
    let mut outcome = MergeOutcome {
        readings: Vec::new(),
        cpe: None,
        sources: Vec::with_capacity(parts.len()),
        skipped_rows: 0,
    };

    for (index, part) in parts.into_iter().enumerate() {
        if index == 0 {
            outcome.cpe = part.cpe;
        }
        outcome.sources.push(part.path);
        outcome.skipped_rows += part.extraction.skipped_rows;
        outcome.readings.extend(part.extraction.readings);
    }

    if outcome.readings.is_empty() {
        return Err(Error::NoValidData);
    }

    // Stable: equal timestamps keep their input order
    outcome.readings.sort_by_key(|r| r.timestamp);

    tracing::info!(
        sources = outcome.sources.len(),
        readings = outcome.readings.len(),
        skipped = outcome.skipped_rows,
        "merged readings"
    );
    Ok(outcome)
}
