use std::process::Command;

fn temp_path(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "binding-shard-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

#[test]
fn cli_list_scenarios_writes_output() {
    let exe = env!("CARGO_BIN_EXE_binding-shard-tester");
    let output_path = temp_path("list");
    let status = Command::new(exe)
        .args(["--list-scenarios", "--output"])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(&output_path).expect("read output");
    assert!(content.contains("Available scenarios"));
    assert!(content.contains("concurrent-kills"));
    let _ = std::fs::remove_file(output_path);
}

#[test]
fn cli_runs_all_scenarios_with_json_report() {
    let exe = env!("CARGO_BIN_EXE_binding-shard-tester");
    let output_path = temp_path("run.json");
    let status = Command::new(exe)
        .args([
            "--scenarios",
            "all",
            "--seeds",
            "1,0x2A",
            "--iterations",
            "2",
            "--workers",
            "50",
            "--report",
            "json",
            "--output",
        ])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(&output_path).expect("read output");
    let report: serde_json::Value = serde_json::from_str(&content).expect("json report");
    assert_eq!(report["total"], report["passed"]);
    assert_eq!(report["total"], 16);
    let _ = std::fs::remove_file(output_path);
}

#[test]
fn cli_sqlite_files_markdown_report() {
    let exe = env!("CARGO_BIN_EXE_binding-shard-tester");
    let db_dir = temp_path("db");
    let output_path = temp_path("run.md");
    let status = Command::new(exe)
        .args([
            "--scenarios",
            "smoke,restart-persistence",
            "--store",
            "sqlite",
            "--report",
            "markdown",
            "--db-dir",
        ])
        .arg(&db_dir)
        .arg("--output")
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(&output_path).expect("read output");
    assert!(content.contains("| smoke | 1337 | Sqlite | ✅ |"));
    assert!(db_dir.join("restart-persistence-1337.sqlite").exists());
    let _ = std::fs::remove_dir_all(db_dir);
    let _ = std::fs::remove_file(output_path);
}

#[test]
fn cli_unknown_scenario_is_reported() {
    let exe = env!("CARGO_BIN_EXE_binding-shard-tester");
    let output = Command::new(exe)
        .args(["--scenarios", "does-not-exist"])
        .output()
        .expect("run cli");
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unknown scenario"));
}
