mod common;

use std::fs;

use assert_cmd::Command;
use common::TestWorkspace;
use predicates::str::contains;
use sheetfold::catalog::Catalog;

fn sheetfold() -> Command {
    Command::cargo_bin("sheetfold").expect("binary exists")
}

#[test]
fn ingest_groups_files_and_writes_catalog() {
    let ws = TestWorkspace::new();
    ws.write("in/school/edunomics/a.csv", "id,name,value\n1,Ada,10\n");
    ws.write("in/school/edunomics/b.csv", "id,value,region\n2,20,west\n");
    let out = ws.path().join("out");

    sheetfold()
        .args([
            "ingest",
            "-i",
            ws.path().join("in").to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
            "-g",
            "school_edunomics=^school/edunomics/",
        ])
        .assert()
        .success();

    assert!(out.join("school_edunomics.csv").exists());
    let catalog = Catalog::load(&out.join("schema_metadata.json")).expect("catalog");
    assert_eq!(catalog.entries.len(), 1);
    assert_eq!(catalog.entries[0].file, "school_edunomics.csv");
}

#[test]
fn ingest_reads_settings_from_a_config_file() {
    let ws = TestWorkspace::new();
    ws.write("in/scores.csv", "id,Score\n1,10\n");
    let out = ws.path().join("out");
    let config = ws.write(
        "pipeline.yml",
        &format!(
            "input_root: {}\noutput_root: {}\ntype_overrides:\n  score: float\n",
            ws.path().join("in").display(),
            out.display()
        ),
    );

    sheetfold()
        .args(["ingest", "-c", config.to_str().unwrap()])
        .assert()
        .success();

    let catalog = Catalog::load(&out.join("schema_metadata.json")).expect("catalog");
    let score = catalog.entries[0]
        .columns
        .iter()
        .find(|c| c.name == "score")
        .expect("score column");
    assert_eq!(score.dtype, "float");
}

#[test]
fn ingest_without_roots_fails_with_a_clear_message() {
    sheetfold()
        .arg("ingest")
        .assert()
        .failure()
        .stderr(contains("input root is required"));
}

#[test]
fn probe_prints_schema_json_to_stdout() {
    let ws = TestWorkspace::new();
    let input = ws.write("grades.csv", "id,score\n1,9.5\n");

    let assert = sheetfold()
        .args(["probe", "-i", input.to_str().unwrap()])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf-8");
    let parsed: serde_json::Value = serde_json::from_str(&stdout).expect("schema JSON");
    assert_eq!(parsed[0]["sheet_name"], "grades");
    assert_eq!(parsed[0]["columns"][1]["dtype"], "float");
}

#[test]
fn probe_writes_schema_to_meta_file() {
    let ws = TestWorkspace::new();
    let input = ws.write("grades.csv", "id,score\n1,9.5\n");
    let meta = ws.path().join("grades.schema.json");

    sheetfold()
        .args([
            "probe",
            "-i",
            input.to_str().unwrap(),
            "-m",
            meta.to_str().unwrap(),
        ])
        .assert()
        .success();

    let schema = Catalog::load(&meta).expect("schema file");
    assert_eq!(schema.entries[0].columns[0].name, "id");
}

#[test]
fn catalog_subcommand_scans_a_directory() {
    let ws = TestWorkspace::new();
    ws.write("out/a.csv", "x\n1\n");
    let catalog_path = ws.path().join("schema_metadata.json");

    sheetfold()
        .args([
            "catalog",
            "-i",
            ws.path().join("out").to_str().unwrap(),
            "--catalog",
            catalog_path.to_str().unwrap(),
        ])
        .assert()
        .success();

    let raw = fs::read_to_string(&catalog_path).expect("catalog file");
    assert!(raw.contains("\"a.csv\""));
}

#[test]
fn probe_with_sheet_on_a_sheetless_source_fails() {
    let ws = TestWorkspace::new();
    let input = ws.write("grades.csv", "id,score\n1,9.5\n");

    // A CSV has no sheets, so asking for one must fail instead of falling
    // back to the whole file.
    sheetfold()
        .args([
            "probe",
            "-i",
            input.to_str().unwrap(),
            "--sheet",
            "Q1 Spend",
        ])
        .assert()
        .failure()
        .stderr(contains("No readable table"));
}

#[test]
fn probe_on_missing_file_fails() {
    let ws = TestWorkspace::new();
    sheetfold()
        .args([
            "probe",
            "-i",
            ws.path().join("nope.csv").to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(contains("No readable table"));
}
