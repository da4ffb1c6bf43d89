//! CLI integration tests for the `exval` subcommands.
//!
//! Uses `assert_cmd` to spawn the `exval` binary and verify exit codes,
//! stdout content, and stderr content. Commands run from this crate's
//! directory so fixture paths are relative to it.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn exval() -> Command {
    let mut cmd = cargo_bin_cmd!("exval");
    cmd.current_dir(Path::new(env!("CARGO_MANIFEST_DIR")));
    cmd
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    exval()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Serialize value graphs as executable source text",
        ));
}

#[test]
fn version_exits_0() {
    exval()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("exval"));
}

#[test]
fn missing_subcommand_fails() {
    exval().assert().failure();
}

// ──────────────────────────────────────────────
// 2. Stringify subcommand
// ──────────────────────────────────────────────

#[test]
fn stringify_plain_record() {
    exval()
        .args(["stringify", "tests/fixtures/point.json"])
        .assert()
        .success()
        .stdout("{x:1,y:2,pow:Math.pow}\n");
}

#[test]
fn stringify_hoists_shared_values() {
    exval()
        .args(["stringify", "tests/fixtures/shared.json"])
        .assert()
        .success()
        .stdout("function(){var a={name:'leaf'};return {left:a,right:a}}()\n");
}

#[test]
fn stringify_patches_cycles() {
    exval()
        .args(["stringify", "tests/fixtures/cyclic.json"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("function(){var a={},b=function(t,s,k){"))
        .stdout(predicate::str::contains("b(a,{self:a});return a}()"));
}

#[test]
fn stringify_drops_callable_names_by_default() {
    exval()
        .args(["stringify", "tests/fixtures/named.json"])
        .assert()
        .success()
        .stdout("function(){ return 1; }\n");
}

#[test]
fn stringify_preserve_names_flag() {
    exval()
        .args(["stringify", "tests/fixtures/named.json", "--preserve-names"])
        .assert()
        .success()
        .stdout(predicate::str::contains("name:{value:'onReady',configurable:true}"));
}

#[test]
fn stringify_json_output() {
    let assert = exval()
        .args(["--output", "json", "stringify", "tests/fixtures/point.json"])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["source"], "{x:1,y:2,pow:Math.pow}");
}

#[test]
fn stringify_nonexistent_file_exits_1() {
    exval()
        .args(["stringify", "nonexistent_graph_xyz.json"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn stringify_dangling_reference_exits_1() {
    exval()
        .args(["stringify", "tests/fixtures/dangling.json"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("unknown object reference: missing"));
}

#[test]
fn stringify_native_callable_exits_1() {
    exval()
        .args(["--output", "json", "stringify", "tests/fixtures/native.json"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("UnparseableCallable"));
}

#[test]
fn quiet_suppresses_text_errors() {
    exval()
        .args(["--quiet", "stringify", "tests/fixtures/dangling.json"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::is_empty());
}

#[test]
fn quiet_suppresses_json_stringify_errors() {
    exval()
        .args(["--quiet", "--output", "json", "stringify", "tests/fixtures/native.json"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::is_empty());
}

#[test]
fn malformed_document_exits_1() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("bad.json");
    fs::write(&path, r#"{"root": 1, "extra": true}"#).unwrap();

    exval()
        .args(["stringify", path.to_str().unwrap()])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid graph document"));
}

// ──────────────────────────────────────────────
// 3. Configuration file
// ──────────────────────────────────────────────

#[test]
fn dense_sequence_by_default() {
    exval()
        .args(["stringify", "tests/fixtures/sparse.json"])
        .assert()
        .success()
        .stdout("[1,,,4]\n");
}

#[test]
fn config_gap_limit_switches_to_sized_form() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("exval.toml");
    fs::write(&config, "sequence_gap_limit = 2\n").unwrap();

    exval()
        .args(["stringify", "tests/fixtures/sparse.json", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout("function(a){a[0]=1;a[3]=4;return a}(new Array(4))\n");
}

#[test]
fn flag_overrides_config() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("exval.toml");
    fs::write(&config, "preserve_callable_names = false\n").unwrap();

    exval()
        .args(["stringify", "tests/fixtures/named.json", "--preserve-names", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("'onReady'"));
}

#[test]
fn invalid_config_exits_1() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("exval.toml");
    fs::write(&config, "no_such_setting = 1\n").unwrap();

    exval()
        .args(["stringify", "tests/fixtures/point.json", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("could not parse"));
}

// ──────────────────────────────────────────────
// 4. Paths subcommand
// ──────────────────────────────────────────────

#[test]
fn paths_lists_builtins() {
    exval()
        .args(["paths", "--filter", "Math."])
        .assert()
        .success()
        .stdout(predicate::str::contains("Math.pow\n"))
        .stdout(predicate::str::contains("Object.create").not());
}

#[test]
fn paths_hide_host_internals_by_default() {
    exval()
        .args(["paths", "--filter", "require"])
        .assert()
        .success()
        .stdout(predicate::str::contains("require.resolve"))
        .stdout(predicate::str::contains("require.cache").not());
}

#[test]
fn paths_include_host_internals_when_configured() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("exval.toml");
    fs::write(&config, "include_host_runtime_internals = false\n").unwrap();

    exval()
        .args(["paths", "--filter", "require", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("require.cache"));
}

#[test]
fn paths_json_output() {
    let assert = exval()
        .args(["--output", "json", "paths", "--filter", "generator"])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["count"], json["paths"].as_array().unwrap().len());
}
