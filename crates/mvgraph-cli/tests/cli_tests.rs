//! Integration tests for the mvgraph CLI.
//!
//! Every test runs the built binary against the snapshot fixture, so no
//! ClickHouse server is needed.

use rstest::{fixture, rstest};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

// ============================================================================
// Helpers
// ============================================================================

fn snapshot_fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/pipeline.jsonl")
}

/// Run the binary in `dir` with an empty config so local files do not leak in.
fn run_in(dir: &Path, args: &[&str]) -> Output {
    let config = dir.join("mvgraph.yaml");
    if !config.exists() {
        std::fs::write(&config, "{}\n").expect("Failed to write config");
    }
    Command::new(env!("CARGO_BIN_EXE_mvgraph"))
        .args(args)
        .current_dir(dir)
        .env_remove("MVGRAPH_CONFIG")
        .env("NO_COLOR", "1")
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to execute mvgraph binary")
}

fn run_json(dir: &Path, args: &[&str]) -> Value {
    let snapshot = snapshot_fixture();
    let mut full = vec!["--json", "--snapshot", snapshot.to_str().expect("utf-8 path")];
    full.extend_from_slice(args);
    let output = run_in(dir, &full);
    assert!(
        output.status.success(),
        "mvgraph {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

fn run_text(dir: &Path, args: &[&str]) -> String {
    let snapshot = snapshot_fixture();
    let mut full = vec!["--snapshot", snapshot.to_str().expect("utf-8 path")];
    full.extend_from_slice(args);
    let output = run_in(dir, &full);
    assert!(
        output.status.success(),
        "mvgraph {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[fixture]
fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

// ============================================================================
// Help and Version
// ============================================================================

#[rstest]
fn help_lists_commands(temp_dir: TempDir) {
    let output = run_in(temp_dir.path(), &["--help"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["discover", "cycles", "impact", "lineage", "health", "export", "snapshot"] {
        assert!(stdout.contains(command), "help is missing {command}");
    }
}

#[rstest]
fn version_is_printed(temp_dir: TempDir) {
    let output = run_in(temp_dir.path(), &["--version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("0.1.0"));
}

#[rstest]
fn no_command_prints_hint(temp_dir: TempDir) {
    let output = run_in(temp_dir.path(), &[]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("--help"));
}

// ============================================================================
// Analyses
// ============================================================================

#[rstest]
fn discover_reports_counts(temp_dir: TempDir) {
    let value = run_json(temp_dir.path(), &["discover"]);

    assert_eq!(value["nodes"], 7);
    // events -> mv -> agg, agg -> rollup, users -> rollup, a <-> b
    assert_eq!(value["edges"], 6);
    assert_eq!(value["issues"].as_array().map(Vec::len), Some(0));
}

#[rstest]
fn impact_follows_to_clause(temp_dir: TempDir) {
    let value = run_json(temp_dir.path(), &["impact", "raw.events"]);

    assert_eq!(
        value["downstream"],
        serde_json::json!(["analytics.user_rollup", "staging.events_agg", "staging.events_mv"])
    );
    assert_eq!(
        value["affected_views"],
        serde_json::json!(["analytics.user_rollup", "staging.events_mv"])
    );
}

#[rstest]
fn cycles_are_found(temp_dir: TempDir) {
    let value = run_json(temp_dir.path(), &["cycles"]);
    assert_eq!(value["cycles"], serde_json::json!([["loops.a", "loops.b"]]));
}

#[rstest]
fn path_runs_through_target_table(temp_dir: TempDir) {
    let value = run_json(temp_dir.path(), &["path", "raw.events", "analytics.user_rollup"]);
    assert_eq!(
        value["path"],
        serde_json::json!([
            "raw.events",
            "staging.events_mv",
            "staging.events_agg",
            "analytics.user_rollup"
        ])
    );
}

#[rstest]
fn lineage_upstream_only(temp_dir: TempDir) {
    let value = run_json(
        temp_dir.path(),
        &["lineage", "analytics.user_rollup", "--direction", "upstream"],
    );
    assert!(value.get("downstream").is_none());
    assert_eq!(
        value["upstream"],
        serde_json::json!(["raw.events", "raw.users", "staging.events_agg", "staging.events_mv"])
    );
}

#[rstest]
fn expired_lists_ttl_tables(temp_dir: TempDir) {
    let value = run_json(temp_dir.path(), &["--include-temp", "expired"]);
    let tables: Vec<&str> = value
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|e| e["table"].as_str())
        .collect();
    assert_eq!(tables, vec!["analytics.tmp_backfill"]);
}

#[rstest]
fn temporary_tables_are_hidden_by_default(temp_dir: TempDir) {
    let value = run_json(temp_dir.path(), &["expired"]);
    assert_eq!(value, serde_json::json!([]));
}

#[rstest]
fn database_flag_restricts_discovery(temp_dir: TempDir) {
    let value = run_json(temp_dir.path(), &["-d", "analytics", "discover", "--verbose"]);

    let objects = value["objects"].as_array().expect("objects");
    let placeholder = objects
        .iter()
        .find(|o| o["id"] == "staging.events_agg")
        .expect("placeholder for excluded source");
    assert_eq!(placeholder["kind"], "unknown");
}

#[rstest]
fn health_text_has_recommendations(temp_dir: TempDir) {
    let text = run_text(temp_dir.path(), &["health"]);
    assert!(text.contains("Pipeline Health"));
    assert!(text.contains("Cycles:        1"));
    assert!(text.contains("Recommendations"));
}

// ============================================================================
// Export and Snapshot
// ============================================================================

#[rstest]
#[case("json", "graph.json", "\"nodes\"")]
#[case("node-link", "graph.nodelink.json", "\"links\"")]
#[case("dot", "graph.dot", "digraph")]
#[case("graphml", "graph.graphml", "<graphml")]
fn export_writes_file(
    temp_dir: TempDir,
    #[case] format: &str,
    #[case] file: &str,
    #[case] marker: &str,
) {
    let out = temp_dir.path().join(file);
    let value = run_json(
        temp_dir.path(),
        &["export", "--format", format, "-o", out.to_str().expect("utf-8 path")],
    );

    assert_eq!(value["nodes"], 7);
    let content = std::fs::read_to_string(&out).expect("export written");
    assert!(content.contains(marker));
}

#[rstest]
fn export_to_stdout_without_output(temp_dir: TempDir) {
    let text = run_text(temp_dir.path(), &["export", "--format", "dot"]);
    assert!(text.starts_with("digraph"));
}

#[rstest]
fn snapshot_round_trips(temp_dir: TempDir) {
    let out = temp_dir.path().join("copy.jsonl");
    let value = run_json(
        temp_dir.path(),
        &["snapshot", "-o", out.to_str().expect("utf-8 path")],
    );
    assert_eq!(value["rows"], 7);

    let output = run_in(
        temp_dir.path(),
        &["--json", "--snapshot", out.to_str().expect("utf-8 path"), "discover"],
    );
    assert!(output.status.success());
    let value: Value = serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    assert_eq!(value["edges"], 6);
}

// ============================================================================
// Errors
// ============================================================================

#[rstest]
fn missing_snapshot_fails(temp_dir: TempDir) {
    let output = run_in(temp_dir.path(), &["--snapshot", "nope.jsonl", "discover"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("nope.jsonl"));
}

#[rstest]
fn invalid_config_fails(temp_dir: TempDir) {
    std::fs::write(temp_dir.path().join("mvgraph.yaml"), "discovery:\n  concurrency-limit: 0\n")
        .expect("write config");
    let snapshot = snapshot_fixture();
    let output = run_in(
        temp_dir.path(),
        &["--snapshot", snapshot.to_str().expect("utf-8 path"), "discover"],
    );
    assert!(!output.status.success());
}

#[rstest]
fn malformed_snapshot_line_is_an_issue(temp_dir: TempDir) {
    let path = temp_dir.path().join("broken.jsonl");
    std::fs::write(
        &path,
        "{\"database\":\"raw\",\"name\":\"events\",\"engine\":\"MergeTree\"}\nnot json\n",
    )
    .expect("write snapshot");

    let output = run_in(
        temp_dir.path(),
        &["--json", "--snapshot", path.to_str().expect("utf-8 path"), "discover"],
    );
    assert!(output.status.success());
    let value: Value = serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    assert_eq!(value["nodes"], 1);
    assert_eq!(value["issues"][0]["type"], "malformed_snapshot_line");
    assert_eq!(value["issues"][0]["line_number"], 2);
}
