mod common;

use assert_cmd::Command;
use common::TestRoot;
use predicates::prelude::*;

#[test]
fn init_creates_data_directory() {
    let root = TestRoot::new();

    Command::new(TestRoot::duende_bin())
        .arg("init")
        .arg(root.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Duende initialized"));

    assert!(root.path().join(".duende").exists());
    assert!(root.path().join(".duende/config.toml").exists());
    assert!(root.path().join(".duende/events.db").exists());
    assert!(root.path().join(".duende/references.toml").exists());
}

#[test]
fn init_json_output() {
    let root = TestRoot::new();

    Command::new(TestRoot::duende_bin())
        .args(["--json", "init"])
        .arg(root.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"initialized\""));
}

#[test]
fn init_twice_fails_without_force() {
    let root = TestRoot::new();
    root.duende_init();

    Command::new(TestRoot::duende_bin())
        .arg("init")
        .arg(root.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("already initialized"));
}

#[test]
fn init_force_reinitializes() {
    let root = TestRoot::new();
    root.duende_init();

    Command::new(TestRoot::duende_bin())
        .args(["init", "--force"])
        .arg(root.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Duende initialized"));
}

#[test]
fn init_default_config_is_valid_toml() {
    let root = TestRoot::new();
    root.duende_init();

    let config_content =
        std::fs::read_to_string(root.path().join(".duende/config.toml")).unwrap();
    let parsed: toml::Value = toml::from_str(&config_content).unwrap();

    assert!(parsed.get("server").is_some());
    assert!(parsed.get("content").is_some());
    assert!(parsed.get("references").is_some());
}

#[test]
fn init_writes_versioned_reference_data() {
    let root = TestRoot::new();
    root.duende_init();

    let references =
        std::fs::read_to_string(root.path().join(".duende/references.toml")).unwrap();
    let parsed: toml::Value = toml::from_str(&references).unwrap();

    assert!(parsed.get("version").is_some());
    let cities = parsed["cities_and_provinces"].as_array().unwrap();
    assert!(cities.iter().any(|c| c.as_str() == Some("Sevilla")));
}

#[test]
fn init_quiet_suppresses_output() {
    let root = TestRoot::new();

    Command::new(TestRoot::duende_bin())
        .args(["--quiet", "init"])
        .arg(root.path())
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn count_on_fresh_root_is_zero() {
    let root = TestRoot::new();
    root.duende_init();

    Command::new(TestRoot::duende_bin())
        .args(["--json", "count"])
        .arg(root.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total\": 0"));
}

#[test]
fn count_requires_initialization() {
    let root = TestRoot::new();

    Command::new(TestRoot::duende_bin())
        .arg("count")
        .arg(root.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}
