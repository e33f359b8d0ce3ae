//! Aggregation against a shared result directory

use colo_core::{RunRecord, RunStats};
use colo_stats::table::read_table;
use colo_stats::{Aggregator, Metric};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

fn write_record(dir: &Path, name: &str, tid: u32, model_id: &str) -> PathBuf {
    let path = dir.join(name);
    RunRecord::new(
        tid,
        RunStats {
            model_id: model_id.to_string(),
            throughput: 25.0,
            latencies_s: vec![0.04, 0.05, 0.06],
        },
    )
    .write_to(&path)
    .unwrap();
    path
}

#[test]
fn concurrent_aggregations_serialize_their_appends() {
    let scratch = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    let records = vec![
        write_record(scratch.path(), "0.rec", 0, "bert-1"),
        write_record(scratch.path(), "1.rec", 1, "gpt-1"),
    ];

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let records = records.clone();
            let out = results.path().to_path_buf();
            thread::spawn(move || {
                Aggregator::new(format!("run{}", i), out)
                    .aggregate(&records)
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for metric in Metric::ALL {
        let (header, rows) = read_table(&results.path().join(format!("{}.csv", metric))).unwrap();
        assert_eq!(header, ["mode", "load", "0_bert-1", "1_gpt-1"]);
        assert_eq!(rows.len(), 8);
        assert!(rows.iter().all(|row| row.len() == 4 && row[1] == "1.0"));

        let mut modes: Vec<_> = rows.iter().map(|row| row[0].clone()).collect();
        modes.sort();
        modes.dedup();
        assert_eq!(modes.len(), 8);
    }
}

#[test]
fn concurrent_processes_append_whole_rows() {
    let scratch = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    let records = [
        write_record(scratch.path(), "0.rec", 0, "bert-1"),
        write_record(scratch.path(), "1.rec", 1, "gpt-1"),
        write_record(scratch.path(), "2.rec", 2, "whisper-1"),
    ];

    let children: Vec<_> = (0..12)
        .map(|i| {
            Command::new(env!("CARGO_BIN_EXE_colo-stats"))
                .arg("--mode")
                .arg(format!("proc{}", i))
                .arg("--result-dir")
                .arg(results.path())
                .args(&records)
                .env_remove("COLO_CONFIG")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .unwrap()
        })
        .collect();
    for mut child in children {
        assert!(child.wait().unwrap().success());
    }

    for metric in Metric::ALL {
        let (header, rows) = read_table(&results.path().join(format!("{}.csv", metric))).unwrap();
        assert_eq!(header, ["mode", "load", "0_bert-1", "1_gpt-1", "2_whisper-1"]);
        assert_eq!(rows.len(), 12);
        assert!(rows.iter().all(|row| row.len() == 5 && row[0].starts_with("proc")));

        let mut modes: Vec<_> = rows.iter().map(|row| row[0].clone()).collect();
        modes.sort();
        modes.dedup();
        assert_eq!(modes.len(), 12);
    }
}

#[test]
fn cli_reports_missing_record() {
    let scratch = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    let out = results.path().join("out");
    let present = write_record(scratch.path(), "0.rec", 0, "bert-1");
    let missing = scratch.path().join("31337.rec");

    let output = Command::new(env!("CARGO_BIN_EXE_colo-stats"))
        .arg("--mode")
        .arg("test")
        .arg("--result_dir")
        .arg(&out)
        .arg(&present)
        .arg(&missing)
        .env_remove("COLO_CONFIG")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("31337.rec"), "stderr: {}", stderr);
    assert!(!out.exists());
}

#[test]
fn cli_appends_and_prints_summary() {
    let scratch = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    let record = write_record(scratch.path(), "0.rec", 0, "whisper-2");

    let output = Command::new(env!("CARGO_BIN_EXE_colo-stats"))
        .args(["--mode", "solo", "--result-dir"])
        .arg(results.path())
        .arg(&record)
        .env_remove("COLO_CONFIG")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("tput: 0_whisper-2=25.0"), "stdout: {}", stdout);
    assert!(results.path().join("total_p100.csv").exists());
}
