//! Spawning and signalling worker processes

use crate::mix::{MixConfig, WorkerSpec};
use crate::{Result, SyncError};
use colo_core::{ScratchPaths, WorkerId};
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Name of the worker binary looked up next to the current executable
pub const WORKER_BINARY: &str = "colo-worker";

/// Default worker program: `colo-worker` beside the running binary
pub fn default_worker_program() -> Result<PathBuf> {
    Ok(std::env::current_exe()?.with_file_name(WORKER_BINARY))
}

/// How to invoke a worker program
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub scratch_dir: PathBuf,
    pub log_level: String,

    /// Let workers write to this process's stdout and stderr
    pub inherit_output: bool,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            scratch_dir: scratch_dir.into(),
            log_level: "info".to_string(),
            inherit_output: true,
        }
    }

    /// Command line for one worker of `mix`
    pub fn build(&self, mix: &MixConfig, worker: &WorkerSpec) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("--device-id")
            .arg(mix.device_id.to_string())
            .arg("--model")
            .arg(worker.model.as_str())
            .arg("--batch-size")
            .arg(worker.batch_size.to_string())
            .arg("--tid")
            .arg(worker.tid.to_string())
            .arg("--scratch-dir")
            .arg(&self.scratch_dir)
            .arg("--log-level")
            .arg(&self.log_level);

        if let Some(num_infer) = worker.num_infer {
            command.arg("--num-infer").arg(num_infer.to_string());
        }
        if let Some(warmup) = mix.warmup {
            command.arg("--warmup").arg(warmup.to_string());
        }
        if let Some(release) = mix.release {
            command.arg("--release").arg(release.to_string());
        }

        command.stdin(Stdio::null());
        if !self.inherit_output {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }
        command
    }
}

/// A spawned worker
#[derive(Debug)]
pub struct LaunchedWorker {
    pub spec: WorkerSpec,
    pub pid: u32,
    child: Child,
    status: Option<ExitStatus>,
}

impl LaunchedWorker {
    pub fn spawn(command: &WorkerCommand, mix: &MixConfig, spec: &WorkerSpec) -> Result<Self> {
        let child = command
            .build(mix, spec)
            .spawn()
            .map_err(|source| SyncError::Spawn {
                tid: spec.tid,
                program: command.program.clone(),
                source,
            })?;
        let pid = child.id();
        info!(tid = spec.tid, pid, "Launched {} worker", spec.model);

        Ok(Self {
            spec: spec.clone(),
            pid,
            child,
            status: None,
        })
    }

    pub fn tid(&self) -> WorkerId {
        self.spec.tid
    }

    pub fn marker(&self, paths: &ScratchPaths) -> PathBuf {
        paths.marker_for(self.pid)
    }

    pub fn record(&self, paths: &ScratchPaths) -> PathBuf {
        paths.record_for(self.pid)
    }

    /// Exit status if the process has exited, without blocking
    pub fn try_status(&mut self) -> Result<Option<ExitStatus>> {
        if self.status.is_none() {
            self.status = self.child.try_wait()?;
        }
        Ok(self.status)
    }

    pub fn signal(&self, sig: Signal) -> std::result::Result<(), Errno> {
        signal::kill(Pid::from_raw(self.pid as i32), sig)
    }

    /// Kill and reap the process if it is still running
    pub fn kill(&mut self) {
        if matches!(self.try_status(), Ok(Some(_))) {
            return;
        }
        if let Err(e) = self.child.kill() {
            warn!(pid = self.pid, "Failed to kill worker: {}", e);
        }
        match self.child.wait() {
            Ok(status) => self.status = Some(status),
            Err(e) => warn!(pid = self.pid, "Failed to reap worker: {}", e),
        }
    }
}

/// All workers of one mix; any still running are killed on drop
#[derive(Debug, Default)]
pub struct WorkerGroup {
    workers: Vec<LaunchedWorker>,
}

impl WorkerGroup {
    /// Spawn every worker of `mix`. A failed spawn kills the ones already
    /// started.
    pub fn launch(command: &WorkerCommand, mix: &MixConfig) -> Result<Self> {
        let mut group = Self::default();
        for spec in &mix.workers {
            group.workers.push(LaunchedWorker::spawn(command, mix, spec)?);
        }
        Ok(group)
    }

    pub fn workers(&self) -> &[LaunchedWorker] {
        &self.workers
    }

    pub fn workers_mut(&mut self) -> &mut [LaunchedWorker] {
        &mut self.workers
    }

    pub fn pids(&self) -> Vec<u32> {
        self.workers.iter().map(|worker| worker.pid).collect()
    }

    /// Send `sig` to every worker back to back.
    ///
    /// With `tolerate_exited` a worker that already exited is skipped instead
    /// of failing the broadcast.
    pub fn broadcast(&self, sig: Signal, tolerate_exited: bool) -> Result<()> {
        for worker in &self.workers {
            match worker.signal(sig) {
                Ok(()) => debug!(pid = worker.pid, "Sent {}", sig),
                Err(Errno::ESRCH) if tolerate_exited => {
                    debug!(pid = worker.pid, "Worker already gone, skipped {}", sig)
                }
                Err(source) => {
                    return Err(SyncError::Signal {
                        pid: worker.pid,
                        signal: sig,
                        source,
                    })
                }
            }
        }
        info!("Broadcast {} to {} workers", sig, self.workers.len());
        Ok(())
    }

    /// Wait for every worker to exit, polling every `poll`
    pub async fn wait_all(&mut self, poll: Duration) -> Result<Vec<(WorkerId, ExitStatus)>> {
        loop {
            let mut statuses = Vec::with_capacity(self.workers.len());
            for worker in &mut self.workers {
                if let Some(status) = worker.try_status()? {
                    statuses.push((worker.tid(), status));
                }
            }
            if statuses.len() == self.workers.len() {
                return Ok(statuses);
            }
            tokio::time::sleep(poll).await;
        }
    }

    pub fn kill_all(&mut self) {
        for worker in &mut self.workers {
            worker.kill();
        }
    }

    /// Remove markers and records left by these workers
    pub fn clean_scratch(&self, paths: &ScratchPaths) {
        for worker in &self.workers {
            for path in [worker.marker(paths), worker.record(paths)] {
                remove_if_present(&path);
            }
        }
    }
}

impl Drop for WorkerGroup {
    fn drop(&mut self) {
        self.kill_all();
    }
}

fn remove_if_present(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}
