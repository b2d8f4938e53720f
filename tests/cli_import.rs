mod common;

use assert_cmd::Command;
use common::TestRoot;
use predicates::prelude::*;

fn write_events(root: &TestRoot) -> std::path::PathBuf {
    let events = serde_json::json!([
        {
            "name": "Noche Flamenca",
            "artist": "Farruquito",
            "date": "2030-03-02",
            "time": "21:00",
            "venue": "Teatro Lope de Vega",
            "city": "Sevilla",
            "province": "Sevilla",
            "country": "España"
        },
        {
            "name": "Recital Antiguo",
            "artist": "Duo Del Mar",
            "date": "2001-01-01",
            "time": "20:00",
            "venue": "Casa Vieja",
            "city": "Madrid"
        }
    ]);
    let path = root.path().join("events.json");
    std::fs::write(&path, serde_json::to_string_pretty(&events).unwrap()).unwrap();
    path
}

#[test]
fn import_then_count_reflects_eligibility() {
    let root = TestRoot::new();
    root.duende_init();
    let file = write_events(&root);

    Command::new(TestRoot::duende_bin())
        .arg("import")
        .arg(&file)
        .arg(root.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("2 events imported"));

    // The 2001 event is not listable, so only one counts.
    Command::new(TestRoot::duende_bin())
        .args(["--json", "count"])
        .arg(root.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total\": 1"));
}

#[test]
fn import_rejects_malformed_json() {
    let root = TestRoot::new();
    root.duende_init();
    let file = root.path().join("broken.json");
    std::fs::write(&file, "{ not json").unwrap();

    Command::new(TestRoot::duende_bin())
        .arg("import")
        .arg(&file)
        .arg(root.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse"));
}

#[test]
fn import_requires_initialization() {
    let root = TestRoot::new();
    let file = write_events(&root);

    Command::new(TestRoot::duende_bin())
        .arg("import")
        .arg(&file)
        .arg(root.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}
