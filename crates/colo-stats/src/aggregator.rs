//! Turns a batch of run records into appended metric rows

use crate::lock::DirLock;
use crate::metrics::{Metric, WorkerMetrics};
use crate::table::{AppendOutcome, MetricTable};
use crate::{Result, StatsError};
use colo_core::config::DEFAULT_LOCK_FILE_NAME;
use colo_core::{HarnessConfig, RunRecord, WorkerId};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What one aggregation appended
#[derive(Debug, Clone)]
pub struct AggregateReport {
    /// Worker metrics in column order
    pub workers: Vec<WorkerMetrics>,

    /// Appended tables in metric order, with how each append went
    pub tables: Vec<(MetricTable, AppendOutcome)>,
}

impl AggregateReport {
    /// Table for `metric`, if it was written
    pub fn table(&self, metric: Metric) -> Option<&MetricTable> {
        self.tables
            .iter()
            .map(|(table, _)| table)
            .find(|table| table.metric == metric)
    }
}

/// Appends one row per metric to the tables of a result directory
#[derive(Debug, Clone)]
pub struct Aggregator {
    mode: String,
    result_dir: PathBuf,
    lock_file_name: String,
}

impl Aggregator {
    pub fn new(mode: impl Into<String>, result_dir: impl Into<PathBuf>) -> Self {
        Self {
            mode: mode.into(),
            result_dir: result_dir.into(),
            lock_file_name: DEFAULT_LOCK_FILE_NAME.to_string(),
        }
    }

    pub fn from_harness(
        harness: &HarnessConfig,
        mode: impl Into<String>,
        result_dir: impl Into<PathBuf>,
    ) -> Self {
        Self::new(mode, result_dir).with_lock_file_name(harness.lock_file_name.clone())
    }

    pub fn with_lock_file_name(mut self, name: impl Into<String>) -> Self {
        self.lock_file_name = name.into();
        self
    }

    pub fn mode(&self) -> &str {
        &self.mode
    }

    pub fn result_dir(&self) -> &Path {
        &self.result_dir
    }

    pub fn lock_path(&self) -> PathBuf {
        self.result_dir.join(&self.lock_file_name)
    }

    /// Aggregate `records` into the result directory.
    ///
    /// Missing inputs are reported before anything is created. Decode and
    /// consistency failures happen under the lock but before the first write,
    /// so a failed aggregation leaves every table untouched.
    pub fn aggregate<P: AsRef<Path>>(&self, records: &[P]) -> Result<AggregateReport> {
        if records.is_empty() {
            return Err(StatsError::NoRecords);
        }
        let missing = records
            .iter()
            .map(|path| path.as_ref())
            .find(|path: &&Path| !path.exists());
        if let Some(missing) = missing {
            return Err(StatsError::MissingRecord(missing.to_path_buf()));
        }

        std::fs::create_dir_all(&self.result_dir)?;
        let _lock = DirLock::acquire(self.lock_path())?;

        let mut decoded = Vec::with_capacity(records.len());
        for path in records {
            let path = path.as_ref();
            let record = RunRecord::read_from(path)?;
            debug!(tid = record.tid, "Decoded {} from {}", record.stats.model_id, path.display());
            decoded.push(record);
        }

        let workers = collect_workers(&decoded)?;
        let tables: Vec<MetricTable> = Metric::ALL
            .iter()
            .map(|metric| MetricTable::build(*metric, &self.mode, &workers))
            .collect();

        let mut appended = Vec::with_capacity(tables.len());
        for table in tables {
            let outcome = table.append_to(&self.result_dir)?;
            appended.push((table, outcome));
        }

        info!(
            mode = %self.mode,
            workers = workers.len(),
            "Appended {} metric rows to {}",
            appended.len(),
            self.result_dir.display()
        );

        Ok(AggregateReport {
            workers,
            tables: appended,
        })
    }
}

/// Check unit ids per slot and order workers by slot.
///
/// A later record for an already-seen slot replaces the earlier one's numbers
/// as long as both name the same unit.
pub fn collect_workers(records: &[RunRecord]) -> Result<Vec<WorkerMetrics>> {
    let mut by_tid: BTreeMap<WorkerId, WorkerMetrics> = BTreeMap::new();

    for record in records {
        if let Some(previous) = by_tid.get(&record.tid) {
            if previous.model_id != record.stats.model_id {
                return Err(StatsError::InconsistentUnit {
                    tid: record.tid,
                    expected: previous.model_id.clone(),
                    found: record.stats.model_id.clone(),
                });
            }
            warn!(tid = record.tid, "Duplicate record for slot; keeping the later one");
        }
        by_tid.insert(record.tid, WorkerMetrics::from_record(record));
    }

    Ok(by_tid.into_values().collect())
}
