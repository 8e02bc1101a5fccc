//! End-to-end tests for the `mq` binary
//!
//! Every test runs in its own temp dir with HOME and the XDG dirs pointed
//! into it, so no user config or log file is touched.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn config_path(&self) -> PathBuf {
        self.path().join("mq.yml")
    }

    fn environments_path(&self) -> PathBuf {
        self.path().join("environments.json")
    }

    fn write_config(&self, yaml: &str) {
        fs::write(self.config_path(), yaml).expect("Failed to write config");
    }

    fn mq(&self) -> Command {
        let mut cmd = Command::cargo_bin("mq").expect("mq binary");
        cmd.current_dir(self.path())
            .env("HOME", self.path())
            .env("XDG_CONFIG_HOME", self.path().join("config"))
            .env("XDG_DATA_HOME", self.path().join("data"))
            .env_remove("LOGAN_REGION")
            .env_remove("LOGAN_COMPARTMENT_ID")
            .env_remove("LOGAN_NAMESPACE")
            .env_remove("RUST_LOG")
            .env("NO_COLOR", "1")
            .arg("--config")
            .arg(self.config_path())
            .arg("--environments-file")
            .arg(self.environments_path());
        cmd
    }
}

#[test]
fn test_env_list_shows_bootstrap_default() {
    let sandbox = Sandbox::new();

    sandbox
        .mq()
        .args(["env", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("default"))
        .stdout(predicate::str::contains("us-ashburn-1"));
}

#[test]
fn test_env_add_persists_and_lists() {
    let sandbox = Sandbox::new();

    sandbox
        .mq()
        .args(["env", "add", "--id", "emea", "--name", "EMEA", "--region", "eu-frankfurt-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added environment: emea"));

    assert!(sandbox.environments_path().exists());

    let output = sandbox
        .mq()
        .args(["env", "list", "--format", "json"])
        .output()
        .expect("Failed to run mq");
    assert!(output.status.success());

    let listed: serde_json::Value = serde_json::from_slice(&output.stdout).expect("env list json");
    let ids: Vec<&str> = listed
        .as_array()
        .expect("array")
        .iter()
        .map(|env| env["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["default", "emea"]);
}

#[test]
fn test_env_add_over_unreadable_file_warns_and_keeps_backup() {
    let sandbox = Sandbox::new();
    let typo = r#"[{"id": "us", "name": "US", "region": "us-ashburn-1"},]"#;
    fs::write(sandbox.environments_path(), typo).unwrap();

    sandbox
        .mq()
        .args(["env", "add", "--id", "emea", "--name", "EMEA", "--region", "eu-frankfurt-1"])
        .assert()
        .success()
        .stderr(predicate::str::contains("warning: Could not read"));

    let backup = sandbox.path().join("environments.json.bak");
    assert_eq!(fs::read_to_string(backup).unwrap(), typo);

    sandbox
        .mq()
        .args(["env", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("emea"))
        .stderr(predicate::str::contains("warning").not());
}

#[test]
fn test_env_add_duplicate_fails() {
    let sandbox = Sandbox::new();

    sandbox
        .mq()
        .args(["env", "add", "--id", "default", "--name", "Again", "--region", "us-phoenix-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Environment already exists: default"));
}

#[test]
fn test_env_remove_last_fails() {
    let sandbox = Sandbox::new();

    sandbox
        .mq()
        .args(["env", "remove", "default"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("last remaining environment"));
}

#[test]
fn test_env_import_and_default() {
    let sandbox = Sandbox::new();
    let import_file = sandbox.path().join("import.json");
    fs::write(
        &import_file,
        r#"[
            {"id": "us", "name": "US", "region": "us-ashburn-1", "compartmentId": "ocid1.compartment.oc1..us"},
            {"id": "eu", "name": "EU", "region": "eu-frankfurt-1", "authType": "instance_principal"}
        ]"#,
    )
    .unwrap();

    sandbox
        .mq()
        .args(["env", "import"])
        .arg(&import_file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 2 environments"));

    sandbox.mq().args(["env", "default", "eu"]).assert().success();

    sandbox
        .mq()
        .args(["env", "show", "eu"])
        .assert()
        .success()
        .stdout(predicate::str::contains("instance_principal"))
        .stdout(predicate::str::contains("Default:     true"));
}

#[test]
fn test_mode_set_persists() {
    let sandbox = Sandbox::new();

    sandbox
        .mq()
        .args(["mode", "set", "--mode", "sequential", "--timeout-ms", "5000"])
        .assert()
        .success();

    let saved = fs::read_to_string(sandbox.config_path()).expect("config saved");
    assert!(saved.contains("mode: sequential"));
    assert!(saved.contains("timeout-ms: 5000"));

    sandbox
        .mq()
        .args(["mode", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sequential"))
        .stdout(predicate::str::contains("5000ms"));
}

#[test]
fn test_mode_set_rejects_zero_parallelism() {
    let sandbox = Sandbox::new();

    sandbox
        .mq()
        .args(["mode", "set", "--parallelism", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("parallelism limit must be a positive integer"));

    assert!(!sandbox.config_path().exists());
}

#[test]
fn test_query_without_command_fails() {
    let sandbox = Sandbox::new();

    sandbox
        .mq()
        .args(["query", "*"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No query command configured"));
}

#[test]
fn test_query_rejects_zero_timeout() {
    let sandbox = Sandbox::new();
    sandbox.write_config("runner:\n  command: 'echo \"[]\"'\n");

    sandbox
        .mq()
        .args(["query", "*", "--timeout-ms", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("timeout must be greater than zero"));
}

#[cfg(unix)]
#[test]
fn test_query_merges_and_reports_failures() {
    let sandbox = Sandbox::new();
    sandbox.write_config(
        r#"
runner:
  command: 'if [ "$MQ_ENV_ID" = "broken" ]; then echo "503 Service Unavailable" >&2; exit 2; fi; printf "[\"%s\"]" "$MQ_ENV_ID"'
"#,
    );
    sandbox
        .mq()
        .args(["env", "add", "--id", "broken", "--name", "Broken", "--region", "us-phoenix-1"])
        .assert()
        .success();

    let output = sandbox
        .mq()
        .args(["query", "* | head 1", "--format", "json"])
        .output()
        .expect("Failed to run mq");
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("report json");
    assert_eq!(report["success"], true);
    assert_eq!(report["aggregationType"], "merge");
    assert_eq!(report["data"], serde_json::json!(["default"]));
    assert_eq!(report["environmentResults"].as_array().unwrap().len(), 2);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Environment Broken failed: Exit code 2: 503 Service Unavailable"));
}

#[cfg(unix)]
#[test]
fn test_query_fail_fast_aborts() {
    let sandbox = Sandbox::new();
    sandbox.write_config("runner:\n  command: 'echo boom >&2; exit 1'\n");

    sandbox
        .mq()
        .args(["query", "*", "--fail-fast"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Default Environment"))
        .stderr(predicate::str::contains("boom"));
}

#[cfg(unix)]
#[test]
fn test_probe_reports_each_environment() {
    let sandbox = Sandbox::new();
    sandbox.write_config(
        r#"
runner:
  command: |
    case "$MQ_QUERY_STRING" in "'Start Time' > dateRelative(1h) and (* | head 1)") echo "[]" ;; *) exit 1 ;; esac
"#,
    );

    sandbox
        .mq()
        .args(["probe"])
        .assert()
        .success()
        .stdout(predicate::str::contains("connected"));
}
