use assert_cmd::prelude::*;
use predicates::str::contains;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn summary_mode_prints_the_scene_without_a_gpu() {
    let mut cmd = Command::cargo_bin("pbr-viewer").expect("binary exists");
    cmd.arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("Scene contains 4 objects (3 lights)"))
        .stdout(contains(" - gold-sphere (sphere, gold)"))
        .stdout(contains(" - ground (plane, rubber)"))
        .stdout(contains("Directional intensity 3.0"));
}

#[test]
fn export_writes_material_records() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("materials.json");
    let mut cmd = Command::cargo_bin("pbr-viewer").expect("binary exists");
    cmd.arg("--export-materials").arg(&path);
    cmd.assert()
        .success()
        .stdout(contains("Exported 4 material records"));

    let json = std::fs::read_to_string(&path).expect("export file exists");
    let records: serde_json::Value = serde_json::from_str(&json).expect("valid JSON");
    let records = records.as_array().expect("array of records");
    assert_eq!(records.len(), 4);
    assert!(records
        .iter()
        .any(|record| record["name"] == "gold-sphere" && record["metallic"] == 1.0));
}

#[test]
fn unknown_arguments_are_rejected() {
    let mut cmd = Command::cargo_bin("pbr-viewer").expect("binary exists");
    cmd.arg("--bogus");
    cmd.assert().failure();
}
