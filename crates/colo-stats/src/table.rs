//! Append-only per-metric CSV tables

use crate::metrics::{Metric, WorkerMetrics};
use crate::Result;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Value of the `load` column for every appended row
pub const DEFAULT_LOAD: f64 = 1.0;

/// Leading columns of every table
pub const KEY_COLUMNS: [&str; 2] = ["mode", "load"];

/// Render a float with the shortest representation that round-trips
pub fn format_value(value: f64) -> String {
    format!("{:?}", value)
}

/// How a row landed in its table file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The file did not exist; header and row were written
    Created,
    /// The row was appended below a matching header
    Appended,
    /// The row was appended although the existing header differs
    HeaderMismatch { existing: Vec<String> },
}

/// One metric's header and the row this invocation contributes
#[derive(Debug, Clone, PartialEq)]
pub struct MetricTable {
    pub metric: Metric,
    pub header: Vec<String>,
    pub row: Vec<String>,
}

impl MetricTable {
    /// Build the table for `metric` with one column per worker, in the order
    /// given. Workers without a value get an empty cell.
    pub fn build(metric: Metric, mode: &str, workers: &[WorkerMetrics]) -> Self {
        let mut header: Vec<String> = KEY_COLUMNS.iter().map(|c| c.to_string()).collect();
        let mut row = vec![mode.to_string(), format_value(DEFAULT_LOAD)];

        for worker in workers {
            header.push(worker.column());
            row.push(worker.value(metric).map(format_value).unwrap_or_default());
        }

        Self {
            metric,
            header,
            row,
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.csv", self.metric.name())
    }

    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }

    /// Append the row to `<dir>/<metric>.csv`, writing the header only when
    /// the file is new. Callers hold the directory lock.
    pub fn append_to(&self, dir: &Path) -> Result<AppendOutcome> {
        let path = self.path_in(dir);
        let has_content = std::fs::metadata(&path)
            .map(|meta| meta.len() > 0)
            .unwrap_or(false);

        let outcome = if has_content {
            let existing = read_header(&path)?;
            if existing == self.header {
                AppendOutcome::Appended
            } else {
                warn!(
                    "Header of {} differs from this run's columns ({} vs {}); appending anyway",
                    path.display(),
                    existing.join(","),
                    self.header.join(",")
                );
                AppendOutcome::HeaderMismatch { existing }
            }
        } else {
            AppendOutcome::Created
        };

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(file);

        if outcome == AppendOutcome::Created {
            writer.write_record(&self.header)?;
        }
        writer.write_record(&self.row)?;
        writer.flush()?;

        debug!("Appended {} row to {}", self.metric, path.display());
        Ok(outcome)
    }
}

/// First record of a table file
pub fn read_header(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    Ok(reader.headers()?.iter().map(String::from).collect())
}

/// Header and data rows of a table file
pub fn read_table(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let header = reader.headers()?.iter().map(String::from).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(String::from).collect());
    }
    Ok((header, rows))
}
