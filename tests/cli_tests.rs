//! CLI integration tests
//!
//! These tests verify the CLI commands work correctly by running the binary.

#![cfg(feature = "cli")]

use std::path::PathBuf;
use std::process::Command;

use xsd_model::ResolvedSchema;

fn xsd_model_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_xsd-model"))
}

fn fixtures_dir() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path
}

fn fixture(relative: &str) -> String {
    fixtures_dir().join(relative).to_str().unwrap().to_string()
}

// ============================================================================
// Inspect Command Tests
// ============================================================================

#[test]
fn test_cli_inspect_basic() {
    let output = Command::new(xsd_model_bin())
        .args(["inspect", &fixture("books.xsd")])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "inspect should succeed");
    assert!(stdout.contains("xsd-model v"), "should show version");
    assert!(stdout.contains("urn:books"), "should show namespace");
    assert!(stdout.contains("1:book"), "should list top-level elements");
    assert!(stdout.contains("Definitions:"), "should show definition count");
}

#[test]
fn test_cli_inspect_root_element() {
    let output = Command::new(xsd_model_bin())
        .args(["inspect", &fixture("books.xsd"), "--root-element", "b:chapter"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("1:chapter"));
    assert!(!stdout.contains("1:book "));
}

// ============================================================================
// Resolve Command Tests
// ============================================================================

#[test]
fn test_cli_resolve_stdout() {
    let output = Command::new(xsd_model_bin())
        .args(["resolve", &fixture("notes/notes.xsd")])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "resolve should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let schema = ResolvedSchema::from_json(stdout.trim()).expect("output decodes");
    let note = schema.indexed_name("urn:notes", "Note").unwrap();
    let note = schema.lookup(&note).unwrap();
    assert_eq!(schema[note].children[0], note);
}

#[test]
fn test_cli_resolve_to_file_with_namespace() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("books.json");

    let output = Command::new(xsd_model_bin())
        .args([
            "resolve",
            &fixture("books.xsd"),
            "--namespace",
            "bk=urn:books",
            "--pretty",
            "--worker",
            "--output",
            out.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "resolve should succeed");
    let json = std::fs::read_to_string(&out).unwrap();
    let schema = ResolvedSchema::from_json(&json).unwrap();
    let index = schema.namespace_index("urn:books").unwrap();
    assert_eq!(schema.namespaces()[index].prefix, "bk");
}

#[test]
fn test_cli_resolve_base_path() {
    let output = Command::new(xsd_model_bin())
        .args(["resolve", "notes.xsd", "--base-path", &fixture("notes")])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
}

// ============================================================================
// Error Handling Tests
// ============================================================================

#[test]
fn test_cli_missing_schema() {
    let output = Command::new(xsd_model_bin())
        .args(["resolve", &fixture("absent.xsd")])
        .output()
        .expect("Failed to execute command");

    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "should fail for a missing file");
    assert!(stderr.contains("Error:"));
    assert!(stderr.contains("absent.xsd"));
}

#[test]
fn test_cli_bad_namespace_binding() {
    let output = Command::new(xsd_model_bin())
        .args(["resolve", &fixture("books.xsd"), "--namespace", "no-equals-sign"])
        .output()
        .expect("Failed to execute command");

    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("PREFIX=URI"));
}

#[test]
fn test_cli_help() {
    let output = Command::new(xsd_model_bin())
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("resolve"));
    assert!(stdout.contains("inspect"));
}
