//! Lockstep release of a worker mix

use crate::launcher::{default_worker_program, WorkerCommand, WorkerGroup};
use crate::mix::MixConfig;
use crate::{Result, SyncError};
use colo_core::{HarnessConfig, ScratchPaths, WorkerId, START_SIGNAL, STOP_SIGNAL};
use colo_stats::{AggregateReport, Aggregator};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{error, info, warn};

/// One worker after a successful run
#[derive(Debug, Clone)]
pub struct WorkerRun {
    pub tid: WorkerId,
    pub pid: u32,
    pub record: PathBuf,
}

/// Outcome of a synchronized run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub workers: Vec<WorkerRun>,
    pub report: AggregateReport,

    /// From the start broadcast until the last worker exited
    pub measured: Duration,
}

/// Launches a mix, waits for every readiness marker, releases all workers at
/// once and aggregates their records.
#[derive(Debug, Clone)]
pub struct RunSynchronizer {
    mix: MixConfig,
    harness: HarnessConfig,
    worker_program: Option<PathBuf>,
    poll_interval: Duration,
    keep_scratch: bool,
    log_level: String,
    inherit_output: bool,
}

impl RunSynchronizer {
    pub fn new(mix: MixConfig, harness: HarnessConfig) -> Self {
        Self {
            mix,
            harness,
            worker_program: None,
            poll_interval: Duration::from_millis(50),
            keep_scratch: false,
            log_level: "info".to_string(),
            inherit_output: true,
        }
    }

    /// Run this program instead of the `colo-worker` next to the current
    /// executable
    pub fn with_worker_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.worker_program = Some(program.into());
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Leave markers and records in place after aggregation
    pub fn keep_scratch(mut self, keep: bool) -> Self {
        self.keep_scratch = keep;
        self
    }

    pub fn with_worker_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Silence worker stdout and stderr
    pub fn quiet_workers(mut self) -> Self {
        self.inherit_output = false;
        self
    }

    pub fn mix(&self) -> &MixConfig {
        &self.mix
    }

    fn scratch_dir(&self) -> PathBuf {
        self.mix
            .scratch_dir
            .clone()
            .unwrap_or_else(|| self.harness.scratch_dir.clone())
    }

    /// Run the mix end to end
    pub async fn run(&self) -> Result<RunSummary> {
        self.mix.validate()?;

        let scratch_dir = self.scratch_dir();
        std::fs::create_dir_all(&scratch_dir)?;
        let paths = ScratchPaths::new(&scratch_dir);

        let program = match &self.worker_program {
            Some(program) => program.clone(),
            None => default_worker_program()?,
        };
        let mut command = WorkerCommand::new(program, &scratch_dir);
        command.log_level = self.log_level.clone();
        command.inherit_output = self.inherit_output;

        info!(
            mix = %self.mix.name(),
            workers = self.mix.workers.len(),
            "Launching mix on device {}",
            self.mix.device_id
        );
        let mut group = WorkerGroup::launch(&command, &self.mix)?;

        if let Err(e) = self.wait_until_ready(&mut group, &paths).await {
            error!("Mix never became ready: {}", e);
            group.kill_all();
            return Err(e);
        }

        group.broadcast(START_SIGNAL, false)?;
        let released = Instant::now();

        if let Some(duration) = self.mix.duration() {
            tokio::time::sleep(duration).await;
            // Budgeted workers may have finished already
            group.broadcast(STOP_SIGNAL, true)?;
        }

        let statuses = group.wait_all(self.poll_interval).await?;
        let measured = released.elapsed();

        let workers: Vec<WorkerRun> = group
            .workers()
            .iter()
            .map(|worker| WorkerRun {
                tid: worker.tid(),
                pid: worker.pid,
                record: worker.record(&paths),
            })
            .collect();

        let failures: Vec<String> = statuses
            .iter()
            .filter(|(_, status)| !status.success())
            .map(|(tid, status)| format!("worker {} {}", tid, status))
            .collect();
        if !failures.is_empty() {
            let records = workers
                .iter()
                .map(|worker| worker.record.clone())
                .filter(|record| record.exists())
                .collect();
            return Err(SyncError::WorkerFailed { failures, records });
        }

        let records: Vec<PathBuf> = workers.iter().map(|worker| worker.record.clone()).collect();
        let report = Aggregator::from_harness(&self.harness, &self.mix.mode, &self.mix.result_dir)
            .aggregate(&records)?;

        if self.keep_scratch {
            info!("Keeping scratch files in {}", scratch_dir.display());
        } else {
            group.clean_scratch(&paths);
        }

        Ok(RunSummary {
            workers,
            report,
            measured,
        })
    }

    /// Poll until every worker's marker exists.
    ///
    /// Fails when a worker exits first or the mix's ready timeout elapses.
    async fn wait_until_ready(&self, group: &mut WorkerGroup, paths: &ScratchPaths) -> Result<()> {
        let ready_timeout = self.mix.ready_timeout();
        let started = Instant::now();

        let waited = timeout(
            ready_timeout,
            poll_markers(group, paths, self.poll_interval),
        )
        .await;

        match waited {
            Ok(result) => {
                result?;
                info!(
                    waited_ms = started.elapsed().as_millis() as u64,
                    "All {} workers ready",
                    group.workers().len()
                );
                Ok(())
            }
            Err(_) => {
                let pending = group
                    .workers()
                    .iter()
                    .filter(|worker| !worker.marker(paths).exists())
                    .map(|worker| worker.tid())
                    .collect::<Vec<_>>();
                warn!(?pending, "Timed out waiting for readiness markers");
                Err(SyncError::ReadyTimeout {
                    waited: ready_timeout,
                    pending,
                })
            }
        }
    }
}

/// Sleep-poll until no marker is missing, failing on the first worker that
/// exits without one
async fn poll_markers(group: &mut WorkerGroup, paths: &ScratchPaths, poll: Duration) -> Result<()> {
    loop {
        let mut pending = 0;
        for worker in group.workers_mut() {
            if worker.marker(paths).exists() {
                continue;
            }
            if let Some(status) = worker.try_status()? {
                return Err(SyncError::WorkerExited {
                    tid: worker.tid(),
                    pid: worker.pid,
                    status: status.to_string(),
                });
            }
            pending += 1;
        }
        if pending == 0 {
            return Ok(());
        }
        tokio::time::sleep(poll).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mix::WorkerSpec;
    use colo_core::ModelKind;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    fn mix_in(dir: &Path) -> MixConfig {
        MixConfig {
            mode: "test".to_string(),
            result_dir: dir.join("results"),
            device_id: 0,
            duration_s: None,
            ready_timeout_s: 1,
            scratch_dir: Some(dir.join("scratch")),
            warmup: None,
            release: None,
            workers: vec![WorkerSpec {
                model: ModelKind::Bert,
                batch_size: 1,
                num_infer: Some(5),
                tid: 0,
            }],
        }
    }

    fn script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-worker.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_worker_exiting_before_ready() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "exit 3");

        let err = RunSynchronizer::new(mix_in(dir.path()), HarnessConfig::default())
            .with_worker_program(program)
            .with_poll_interval(Duration::from_millis(10))
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::WorkerExited { tid: 0, .. }));
        assert!(!dir.path().join("results").exists());
    }

    #[tokio::test]
    async fn test_ready_timeout_kills_workers() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "exec sleep 30");

        let started = Instant::now();
        let err = RunSynchronizer::new(mix_in(dir.path()), HarnessConfig::default())
            .with_worker_program(program)
            .with_poll_interval(Duration::from_millis(10))
            .run()
            .await
            .unwrap_err();

        match err {
            SyncError::ReadyTimeout { pending, .. } => assert_eq!(pending, vec![0]),
            other => panic!("unexpected error: {}", other),
        }
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_invalid_mix_is_rejected_before_launch() {
        let dir = tempfile::tempdir().unwrap();
        let mut mix = mix_in(dir.path());
        mix.workers.clear();

        let err = RunSynchronizer::new(mix, HarnessConfig::default())
            .with_worker_program("/nonexistent")
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidMix(_)));
        assert!(!dir.path().join("scratch").exists());
    }
}
