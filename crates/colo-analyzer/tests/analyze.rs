//! Comparison over a synthetic result tree

use colo_analyzer::{build_comparison, discover, AnalyzerConfig, SharingStyle};
use std::fmt::Write as _;
use std::path::Path;
use std::process::Command;

/// Constant draw sampled every `step_ms`
fn write_power_log(dir: &Path, watts: f64, samples: usize, step_ms: u64) {
    let mut log = String::from("timestamp, power.draw [W]\n");
    for i in 0..samples as u64 {
        let ms = i * step_ms;
        let (h, m, s, frac) = (ms / 3_600_000, ms / 60_000 % 60, ms / 1000 % 60, ms % 1000);
        writeln!(log, "2024/03/01 {:02}:{:02}:{:02}.{:03}, {:.2} W", 10 + h, m, s, frac, watts).unwrap();
    }
    std::fs::write(dir.join("pwr.csv"), log).unwrap();
}

fn write_tables(dir: &Path, mode: &str, columns: &[&str], tput: &[f64], p100_ms: &[f64]) {
    let header = format!("mode,load,{}\n", columns.join(","));
    let line = |values: &[f64]| {
        let cells: Vec<String> = values.iter().map(|v| format!("{:?}", v)).collect();
        format!("{}{},1.0,{}\n", header, mode, cells.join(","))
    };
    std::fs::write(dir.join("tput.csv"), line(tput)).unwrap();
    for name in ["total_p0", "total_p50", "total_p90", "total_p100"] {
        std::fs::write(dir.join(format!("{}.csv", name)), line(p100_ms)).unwrap();
    }
}

fn configuration(root: &Path, device: &str, mix: &str, watts: f64, tput: &[f64], p100_ms: &[f64]) {
    let dir = root.join(device).join(mix).join("0");
    std::fs::create_dir_all(&dir).unwrap();
    // a100 keeps every fourth sample: 250 ms sampling gives 1 s steps
    write_power_log(&dir, watts, 1300, 250);
    let columns: Vec<String> = mix
        .split('-')
        .enumerate()
        .map(|(tid, model)| format!("{}_{}-1", tid, model))
        .collect();
    let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
    let mode = if mix.contains('-') { "colocated" } else { "solo" };
    write_tables(&dir, mode, &columns, tput, p100_ms);
}

fn result_tree(root: &Path) {
    configuration(root, "a100", "bert", 100.0, &[100.0], &[20.0]);
    configuration(root, "a100", "gpt", 200.0, &[10.0], &[200.0]);
    configuration(root, "a100", "bert-gpt", 250.0, &[50.0, 5.0], &[40.0, 400.0]);
}

#[test]
fn comparison_over_discovered_tree() {
    let root = tempfile::tempdir().unwrap();
    result_tree(root.path());

    let config = AnalyzerConfig::default();
    let results = discover(root.path(), &config).unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(
        results.iter().map(|r| r.mix.as_str()).collect::<Vec<_>>(),
        ["bert", "bert-gpt", "gpt"]
    );

    let mix = &results[1];
    assert_eq!(mix.energy.samples, 301);
    assert!((mix.energy.duration_s - 300.0).abs() < 1e-9);
    assert!((mix.energy.joules - 75_000.0).abs() < 1e-6);

    let rows = build_comparison(&results, &["a100".to_string()], &config).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].sharing_style, SharingStyle::SingleGpu);
    assert!((rows[0].energy - 75_000.0).abs() < 1e-6);

    // bert: 30000 J / 30000 requests, 15000 served; gpt: 60000 J / 3000, 1500 served
    assert_eq!(rows[1].sharing_style, SharingStyle::GpuPerModel);
    assert!((rows[1].energy - 45_000.0).abs() < 1e-6);
    assert!((rows[1].latency - 300.0).abs() < 1e-9);
}

#[test]
fn cli_writes_comparison_csv() {
    let root = tempfile::tempdir().unwrap();
    result_tree(root.path());
    let output = root.path().join("out.csv");

    let status = Command::new(env!("CARGO_BIN_EXE_colo-analyze"))
        .arg("compare")
        .arg(root.path())
        .args(["--device", "a100", "--format", "json"])
        .arg("--output")
        .arg(&output)
        .env_remove("RUST_LOG")
        .output()
        .unwrap();
    assert!(status.status.success(), "{}", String::from_utf8_lossy(&status.stderr));

    let rows: serde_json::Value = serde_json::from_slice(&status.stdout).unwrap();
    assert_eq!(rows.as_array().unwrap().len(), 2);
    assert_eq!(rows[1]["sharing_style"], "GPU/model");

    let csv = std::fs::read_to_string(&output).unwrap();
    assert_eq!(csv.lines().count(), 3);
    assert!(csv.starts_with("mix,device,sharing_style,"));
}

#[test]
fn cli_reports_missing_solo_configuration() {
    let root = tempfile::tempdir().unwrap();
    configuration(root.path(), "a100", "bert-gpt", 250.0, &[50.0, 5.0], &[40.0, 400.0]);

    let output = Command::new(env!("CARGO_BIN_EXE_colo-analyze"))
        .arg("compare")
        .arg(root.path())
        .args(["--device", "a100"])
        .arg("--output")
        .arg(root.path().join("out.csv"))
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No solo configuration for job bert"));
}
