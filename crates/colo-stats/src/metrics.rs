//! Per-worker metrics derived from a run record

use crate::percentile::{percentiles, REPORTED_PERCENTILES};
use colo_core::{RunRecord, WorkerId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Metrics written by the aggregator, one table each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Tput,
    TotalP0,
    TotalP50,
    TotalP90,
    TotalP99,
    TotalP100,
}

impl Metric {
    /// All metrics in table order
    pub const ALL: [Metric; 6] = [
        Metric::Tput,
        Metric::TotalP0,
        Metric::TotalP50,
        Metric::TotalP90,
        Metric::TotalP99,
        Metric::TotalP100,
    ];

    /// Table name, also the CSV file stem
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Tput => "tput",
            Metric::TotalP0 => "total_p0",
            Metric::TotalP50 => "total_p50",
            Metric::TotalP90 => "total_p90",
            Metric::TotalP99 => "total_p99",
            Metric::TotalP100 => "total_p100",
        }
    }

    /// Latency percentile this metric reports, if any
    pub fn percentile(&self) -> Option<f64> {
        match self {
            Metric::Tput => None,
            Metric::TotalP0 => Some(0.0),
            Metric::TotalP50 => Some(50.0),
            Metric::TotalP90 => Some(90.0),
            Metric::TotalP99 => Some(99.0),
            Metric::TotalP100 => Some(100.0),
        }
    }

    pub fn from_name(name: &str) -> Option<Metric> {
        Metric::ALL.into_iter().find(|metric| metric.name() == name)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Metrics of one worker, keyed by its slot
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerMetrics {
    pub tid: WorkerId,
    pub model_id: String,
    pub throughput: f64,

    /// Latency percentiles in milliseconds, aligned with
    /// [`REPORTED_PERCENTILES`]; `None` when nothing was measured
    pub latency_ms: Option<Vec<f64>>,
}

impl WorkerMetrics {
    pub fn from_record(record: &RunRecord) -> Self {
        let latencies_ms: Vec<f64> = record
            .stats
            .latencies_s
            .iter()
            .map(|seconds| seconds * 1000.0)
            .collect();

        Self {
            tid: record.tid,
            model_id: record.stats.model_id.clone(),
            throughput: record.stats.throughput,
            latency_ms: percentiles(&latencies_ms, &REPORTED_PERCENTILES),
        }
    }

    /// Table column of this worker, `{tid}_{model-id}`
    pub fn column(&self) -> String {
        format!("{}_{}", self.tid, self.model_id)
    }

    /// Value of `metric`, `None` for a percentile without samples
    pub fn value(&self, metric: Metric) -> Option<f64> {
        match metric.percentile() {
            None => Some(self.throughput),
            Some(p) => {
                let index = REPORTED_PERCENTILES.iter().position(|q| *q == p)?;
                self.latency_ms.as_ref().map(|values| values[index])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colo_core::RunStats;

    fn record(tid: WorkerId, latencies_s: Vec<f64>) -> RunRecord {
        RunRecord::new(
            tid,
            RunStats {
                model_id: "bert-1".to_string(),
                throughput: 42.0,
                latencies_s,
            },
        )
    }

    #[test]
    fn test_metric_names() {
        let names: Vec<_> = Metric::ALL.iter().map(Metric::name).collect();
        assert_eq!(
            names,
            ["tput", "total_p0", "total_p50", "total_p90", "total_p99", "total_p100"]
        );
        assert_eq!(Metric::from_name("total_p99"), Some(Metric::TotalP99));
        assert_eq!(Metric::from_name("p99"), None);
    }

    #[test]
    fn test_worker_metrics() {
        let metrics = WorkerMetrics::from_record(&record(3, vec![0.010, 0.020, 0.030]));
        assert_eq!(metrics.column(), "3_bert-1");
        assert_eq!(metrics.value(Metric::Tput), Some(42.0));
        for (metric, expected) in [
            (Metric::TotalP0, 10.0),
            (Metric::TotalP50, 20.0),
            (Metric::TotalP100, 30.0),
        ] {
            assert!((metrics.value(metric).unwrap() - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_empty_latencies_have_no_percentiles() {
        let metrics = WorkerMetrics::from_record(&record(0, Vec::new()));
        assert_eq!(metrics.value(Metric::Tput), Some(42.0));
        assert_eq!(metrics.value(Metric::TotalP50), None);
    }
}
