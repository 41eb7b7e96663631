use assert_cmd::Command;
use predicates::str::contains;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const TPA_VARS: &[&str] = &[
    "TPA_CONFIG",
    "TPA_ENGINE_URL",
    "TPA_ENGINE_SECRET",
    "TPA_ENABLED",
    "TPA_ENGINE_TIMEOUT_MS",
    "TPA_SIGNATURE_HEADER",
    "TPA_DB",
    "TPA_BIND",
    "TPA_LOG",
    "TPA_CASES_FILE",
];

fn tpa(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tpa").unwrap();
    for var in TPA_VARS {
        cmd.env_remove(var);
    }
    cmd.current_dir(dir.path()).env("TPA_LOG", "error");
    cmd
}

fn write_enabled_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("tpa.yaml");
    fs::write(
        &path,
        format!(
            r#"
engine_url: "http://127.0.0.1:1"
secret: "s3cret"
enabled: true
timeout_ms: 2000
db_path: "{}"
"#,
            dir.join("runs.db").display()
        ),
    )
    .unwrap();
    path
}

#[test]
fn test_init_writes_sample_config_once() {
    let dir = TempDir::new().unwrap();

    tpa(&dir)
        .args(["init", "--out", "tpa.yaml"])
        .assert()
        .success()
        .stdout(contains("Created tpa.yaml"));
    let written = fs::read_to_string(dir.path().join("tpa.yaml")).unwrap();
    assert!(written.contains("signature_header: \"x-signature\""));

    tpa(&dir)
        .args(["init", "--out", "tpa.yaml"])
        .assert()
        .code(2)
        .stderr(contains("already exists"));

    tpa(&dir)
        .args(["init", "--out", "tpa.yaml", "--force"])
        .assert()
        .success();
}

#[test]
fn test_list_on_empty_database() {
    let dir = TempDir::new().unwrap();
    tpa(&dir)
        .args(["list", "--db", "runs.db"])
        .assert()
        .success()
        .stdout(contains("[]"));
    assert!(dir.path().join("runs.db").exists());
}

#[test]
fn test_show_unknown_run_is_not_found() {
    let dir = TempDir::new().unwrap();
    tpa(&dir)
        .args(["show", "999", "--db", "runs.db"])
        .assert()
        .code(3)
        .stderr(contains("run not found: 999"));
}

#[test]
fn test_run_refuses_when_disabled() {
    let dir = TempDir::new().unwrap();
    tpa(&dir)
        .args(["run", "--case-id", "42", "--db", "runs.db"])
        .assert()
        .code(4)
        .stderr(contains("assistant is disabled"));
}

#[test]
fn test_run_enabled_without_secret_is_config_error() {
    let dir = TempDir::new().unwrap();
    tpa(&dir)
        .env("TPA_ENABLED", "1")
        .args(["run", "--db", "runs.db"])
        .assert()
        .code(2)
        .stderr(contains("secret is required"));
}

#[test]
fn test_unreachable_engine_still_records_run() {
    let dir = TempDir::new().unwrap();
    let config = write_enabled_config(dir.path());

    tpa(&dir)
        .arg("run")
        .arg("--config")
        .arg(&config)
        .args(["--stage", "validate"])
        .assert()
        .code(1)
        .stdout(contains("\"status\": \"error\""))
        .stdout(contains("\"stage\": \"validate\""));

    let out = tpa(&dir)
        .arg("list")
        .arg("--config")
        .arg(&config)
        .output()
        .unwrap();
    assert!(out.status.success());
    let runs: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(runs.as_array().unwrap().len(), 1);
    let id = runs[0]["id"].as_i64().unwrap();

    tpa(&dir)
        .arg("overlay")
        .arg(id.to_string())
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(contains("FeatureCollection"));

    tpa(&dir)
        .arg("list")
        .arg("--config")
        .arg(&config)
        .args(["--format", "text"])
        .assert()
        .success()
        .stdout(contains("validate"))
        .stdout(contains("error"));
}

#[test]
fn test_storage_failure_is_internal_error() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("not-a-db")).unwrap();
    tpa(&dir)
        .args(["list", "--db", "not-a-db"])
        .assert()
        .code(5)
        .stderr(contains("fatal"));
}
