//! Real worker processes released in lockstep and aggregated

use colo_core::{RunRecord, ScratchPaths, START_SIGNAL};
use colo_stats::table::read_table;
use colo_stats::Aggregator;
use colo_sync::{MixConfig, RunSynchronizer, WorkerSpec};
use nix::sys::signal;
use nix::unistd::Pid;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const WORKER: &str = env!("CARGO_BIN_EXE_colo-worker");

fn spawn_worker(scratch: &Path, model: &str, batch: u32, budget: u64, tid: u32) -> Child {
    Command::new(WORKER)
        .args(["--model", model])
        .arg("--batch-size")
        .arg(batch.to_string())
        .arg("--num-infer")
        .arg(budget.to_string())
        .arg("--tid")
        .arg(tid.to_string())
        .args(["--warmup", "2", "--release", "block"])
        .arg("--scratch-dir")
        .arg(scratch)
        .env_remove("COLO_CONFIG")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap()
}

fn wait_for_marker(paths: &ScratchPaths, child: &mut Child) {
    let deadline = Instant::now() + Duration::from_secs(60);
    while !paths.marker_for(child.id()).exists() {
        assert!(child.try_wait().unwrap().is_none(), "worker exited before ready");
        assert!(Instant::now() < deadline, "worker never became ready");
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn two_workers_released_together_produce_one_row_per_metric() {
    let scratch = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    let paths = ScratchPaths::new(scratch.path());

    let mut workers = vec![
        spawn_worker(scratch.path(), "bert", 1, 10, 0),
        spawn_worker(scratch.path(), "gpt", 1, 20, 1),
    ];
    for worker in &mut workers {
        wait_for_marker(&paths, worker);
    }

    // A repeated start must not restart anything
    for _ in 0..2 {
        for worker in &workers {
            signal::kill(Pid::from_raw(worker.id() as i32), START_SIGNAL).unwrap();
        }
    }

    let mut records = Vec::new();
    for mut worker in workers {
        let pid = worker.id();
        assert!(worker.wait().unwrap().success());
        records.push(paths.record_for(pid));
    }

    let first = RunRecord::read_from(&records[0]).unwrap();
    let second = RunRecord::read_from(&records[1]).unwrap();
    assert_eq!((first.tid, first.stats.model_id.as_str()), (0, "bert-1"));
    assert_eq!((second.tid, second.stats.model_id.as_str()), (1, "gpt-1"));
    assert_eq!(first.stats.latencies_s.len(), 10);
    assert_eq!(second.stats.latencies_s.len(), 20);
    assert!(first.stats.throughput > 0.0);

    Aggregator::new("test", results.path())
        .aggregate(&records)
        .unwrap();

    for name in ["tput.csv", "total_p50.csv"] {
        let (header, rows) = read_table(&results.path().join(name)).unwrap();
        assert_eq!(header, ["mode", "load", "0_bert-1", "1_gpt-1"]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], "test");
    }
}

#[test]
fn load_failure_exits_without_marker_or_record() {
    let scratch = tempfile::tempdir().unwrap();
    let mut worker = spawn_worker(scratch.path(), "whisper", 0, 5, 0);

    let status = worker.wait().unwrap();
    assert_eq!(status.code(), Some(1));
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}

fn mix_in(dir: &Path, duration_s: Option<f64>, budgets: [Option<u64>; 2]) -> MixConfig {
    MixConfig {
        mode: "colocated".to_string(),
        result_dir: dir.join("results"),
        device_id: 0,
        duration_s,
        ready_timeout_s: 60,
        scratch_dir: Some(dir.join("scratch")),
        warmup: Some(1),
        release: None,
        workers: vec![
            WorkerSpec {
                model: colo_core::ModelKind::Bert,
                batch_size: 1,
                num_infer: budgets[0],
                tid: 0,
            },
            WorkerSpec {
                model: colo_core::ModelKind::Gpt,
                batch_size: 1,
                num_infer: budgets[1],
                tid: 1,
            },
        ],
    }
}

#[tokio::test]
async fn synchronizer_runs_budgeted_mix() {
    let dir = tempfile::tempdir().unwrap();
    let mix = mix_in(dir.path(), None, [Some(10), Some(20)]);

    let summary = RunSynchronizer::new(mix, colo_core::HarnessConfig::default())
        .with_worker_program(WORKER)
        .with_poll_interval(Duration::from_millis(10))
        .quiet_workers()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.workers.len(), 2);
    assert_eq!(summary.report.workers.len(), 2);
    // Scratch files are cleaned up after aggregation
    assert!(summary.workers.iter().all(|worker| !worker.record.exists()));

    let (header, rows) = read_table(&dir.path().join("results/tput.csv")).unwrap();
    assert_eq!(header, ["mode", "load", "0_bert-1", "1_gpt-1"]);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][..2], ["colocated", "1.0"]);
    assert!(rows[0][2..].iter().all(|cell| cell.parse::<f64>().unwrap() > 0.0));
}

#[tokio::test]
async fn synchronizer_stops_open_ended_mix() {
    let dir = tempfile::tempdir().unwrap();
    let mix = mix_in(dir.path(), Some(0.5), [None, None]);

    let summary = RunSynchronizer::new(mix, colo_core::HarnessConfig::default())
        .with_worker_program(WORKER)
        .with_poll_interval(Duration::from_millis(10))
        .keep_scratch(true)
        .quiet_workers()
        .run()
        .await
        .unwrap();

    assert!(summary.measured >= Duration::from_millis(500));
    for worker in &summary.workers {
        let record = RunRecord::read_from(&worker.record).unwrap();
        assert_eq!(record.tid, worker.tid);
        assert!(!record.stats.latencies_s.is_empty());
    }

    let (_, rows) = read_table(&dir.path().join("results/total_p100.csv")).unwrap();
    assert_eq!(rows.len(), 1);
}
