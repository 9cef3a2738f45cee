use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const DOCUMENT: &str = r#"{
  "ingredients": [
    {"name": "Sugar", "code": "978000000011", "supplier": "Acme", "quantity": 10},
    {"name": "Flour", "code": "978000000028"},
    {"name": "Vanilla", "code": "978000000035"}
  ],
  "products": [
    {"name": "Cake", "code": "PRD100", "ingredients": [
      {"code": "978000000011", "quantity_used": 2},
      {"code": "978000000028", "quantity_used": 3}
    ]}
  ]
}"#;

fn base_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("invsearch"));
    cmd.current_dir(dir)
        .env_remove("INVSEARCH_DB")
        .env("RUST_LOG", "warn")
        .env("NO_COLOR", "1");
    cmd
}

/// Temp dir with an imported database.
fn imported() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let doc = tmp.path().join("inventory.json");
    std::fs::write(&doc, DOCUMENT).unwrap();
    let db = tmp.path().join("inventory.db");

    base_cmd(tmp.path())
        .arg("--db")
        .arg(&db)
        .arg("import")
        .arg(&doc)
        .assert()
        .success()
        .stdout(predicate::str::contains("imported 3 ingredients and 1 products"));
    (tmp, db)
}

#[test]
fn query_lists_matches_and_expands_their_products() {
    let (tmp, db) = imported();
    base_cmd(tmp.path())
        .arg("--db")
        .arg(&db)
        .args(["query", "sugar"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ingredient\t978000000011\tSugar"))
        .stdout(predicate::str::contains("product\tPRD100\tCake"))
        .stdout(predicate::str::contains("▾ Cake (1)"))
        .stdout(predicate::str::contains("Flour").not());
}

#[test]
fn query_json_reports_items_groups_and_empty_state() {
    let (tmp, db) = imported();
    let output = base_cmd(tmp.path())
        .arg("--db")
        .arg(&db)
        .args(["query", "PRD1", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["query"], "PRD1");
    assert_eq!(report["empty"], false);
    let items = report["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "Cake");
    // The product row matches but none of its ingredients do.
    assert!(report["groups"].as_array().unwrap().is_empty());
}

#[test]
fn empty_query_restores_persisted_collapse_state() {
    let (tmp, db) = imported();
    base_cmd(tmp.path())
        .arg("--db")
        .arg(&db)
        .args(["query", ""])
        .assert()
        .success()
        .stdout(predicate::str::contains("Vanilla"))
        .stdout(predicate::str::contains("▸ Cake (2)"));
}

#[test]
fn query_without_matches_prints_empty_state() {
    let (tmp, db) = imported();
    base_cmd(tmp.path())
        .arg("--db")
        .arg(&db)
        .args(["query", "zzz"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("No items match \"zzz\""));
}

#[test]
fn query_against_missing_database_fails() {
    let tmp = TempDir::new().unwrap();
    base_cmd(tmp.path())
        .arg("--db")
        .arg(tmp.path().join("absent.db"))
        .args(["query", "sugar"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("database not found"));
}

#[test]
fn import_rejects_malformed_documents() {
    let tmp = TempDir::new().unwrap();
    let doc = tmp.path().join("bad.json");
    std::fs::write(&doc, "{ not json").unwrap();
    base_cmd(tmp.path())
        .arg("--db")
        .arg(tmp.path().join("inventory.db"))
        .arg("import")
        .arg(&doc)
        .assert()
        .failure()
        .stderr(predicate::str::contains("importing"));
}

#[test]
fn db_path_can_come_from_the_environment() {
    let (tmp, db) = imported();
    base_cmd(tmp.path())
        .env("INVSEARCH_DB", &db)
        .args(["query", "vanilla"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Vanilla"));
}

#[test]
fn completions_and_man_page_render() {
    let tmp = TempDir::new().unwrap();
    base_cmd(tmp.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("invsearch"));
    base_cmd(tmp.path())
        .arg("man")
        .assert()
        .success()
        .stdout(predicate::str::contains(".TH"));
}

#[test]
fn tui_once_runs_headless() {
    let (tmp, db) = imported();
    base_cmd(tmp.path())
        .env("TUI_HEADLESS", "1")
        .arg("--db")
        .arg(&db)
        .args(["tui", "--once"])
        .assert()
        .success();
}
