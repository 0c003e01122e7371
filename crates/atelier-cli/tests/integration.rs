use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn atelier() -> Command {
    Command::cargo_bin("atelier").unwrap()
}

fn write_config(dir: &TempDir, name: &str, yaml: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, yaml).unwrap();
    path.to_string_lossy().into_owned()
}

fn cloud_config(dir: &TempDir) -> String {
    write_config(
        dir,
        "cloud.yaml",
        r#"
agent_id: cloud-architect-01
specialization: cloud_architecture
model: gen-large
temperature: 0.3
capabilities:
  providers: [hetzner, aws, gcp]
outputs:
  required: [plan.md, infra.tf]
"#,
    )
}

// ---------------------------------------------------------------------------
// atelier validate
// ---------------------------------------------------------------------------

#[test]
fn validate_accepts_clean_config() {
    let dir = TempDir::new().unwrap();
    let config = cloud_config(&dir);
    atelier()
        .args(["validate", "--config", &config])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok: cloud-architect-01"));
}

#[test]
fn validate_rejects_malformed_config() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        "bad.yaml",
        "agent_id: a\nspecialization: s\ncapabilities:\n  c: []\noutputs:\n  required: [o]\n",
    );
    atelier()
        .args(["validate", "--config", &config])
        .assert()
        .failure()
        .stderr(predicate::str::contains("zero options"));
}

#[test]
fn validate_reports_soft_warnings() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        "warn.yaml",
        r#"
agent_id: a1
specialization: cloud_architecture
capabilities:
  providers: [aws]
tools:
  - name: terraform
    type: iac
outputs:
  required: [plan.md]
"#,
    );
    atelier()
        .args(["validate", "--config", &config])
        .assert()
        .success()
        .stdout(predicate::str::contains("no version pin"));
}

// ---------------------------------------------------------------------------
// atelier capabilities
// ---------------------------------------------------------------------------

#[test]
fn capabilities_prints_descriptor_json() {
    let dir = TempDir::new().unwrap();
    let config = cloud_config(&dir);
    atelier()
        .args(["capabilities", "--config", &config])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"agent_id\": \"cloud-architect-01\""))
        .stdout(predicate::str::contains("\"specialization\": \"cloud_architecture\""));
}

// ---------------------------------------------------------------------------
// atelier run
// ---------------------------------------------------------------------------

#[test]
fn run_unsupported_task_type_is_a_normal_result() {
    let dir = TempDir::new().unwrap();
    let config = cloud_config(&dir);
    atelier()
        .args(["run", "--config", &config, "--task", "paint_a_mural"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"error\""))
        .stdout(predicate::str::contains("unsupported task type: paint_a_mural"));
}

#[test]
fn run_optimize_architecture_works_offline() {
    let dir = TempDir::new().unwrap();
    let config = cloud_config(&dir);
    atelier()
        .args([
            "run",
            "--config",
            &config,
            "--task",
            "optimize_architecture",
            "--payload",
            r#"{"architecture":"resource single_instance app {}\n# TODO harden\n"}"#,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"ok\""))
        .stdout(predicate::str::contains("\"issues\""))
        .stdout(predicate::str::contains("\"fixes\""));
}

#[test]
fn run_rejects_unknown_specialization() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        "odd.yaml",
        "agent_id: a\nspecialization: interpretive_dance\ncapabilities:\n  c: [x]\noutputs:\n  required: [o]\n",
    );
    atelier()
        .args(["run", "--config", &config, "--task", "anything"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("interpretive_dance"));
}

#[test]
fn run_rejects_non_object_payload() {
    let dir = TempDir::new().unwrap();
    let config = cloud_config(&dir);
    atelier()
        .args([
            "run",
            "--config",
            &config,
            "--task",
            "optimize_architecture",
            "--payload",
            "[1,2,3]",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("JSON object"));
}

#[test]
fn missing_config_fails_with_path_in_message() {
    atelier()
        .args(["validate", "--config", "/nonexistent/agent.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("/nonexistent/agent.yaml"));
}
