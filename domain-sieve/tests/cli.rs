// domain-sieve/tests/cli.rs

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Command running inside `dir` with no ambient config or `DS_*` overrides.
fn sieve(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("domain-sieve").unwrap();
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join("xdg"))
        .env_remove("RUST_LOG");
    for key in [
        "DS_CHARACTERS",
        "DS_LENGTH",
        "DS_LIMIT",
        "DS_TLD",
        "DS_THREADS",
        "DS_API_LANES",
        "DS_VERIFY_API",
        "DS_CONFIG",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn test_help_lists_flags() {
    let dir = TempDir::new().unwrap();
    sieve(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--verify-api"))
        .stdout(predicate::str::contains("--only-verify-api"))
        .stdout(predicate::str::contains("--api-lanes"))
        .stdout(predicate::str::contains("--failover"))
        .stdout(predicate::str::contains("--check-file"));
}

#[test]
fn test_invalid_arguments_exit_with_status_1() {
    let dir = TempDir::new().unwrap();

    sieve(&dir)
        .args(["--length", "0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Length must be at least 1"));

    sieve(&dir)
        .args(["--letters", "--digits"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("multiple alphabets"));

    sieve(&dir)
        .args(["--threads", "900"])
        .assert()
        .code(1);

    sieve(&dir)
        .args(["--provider", "godaddy"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown provider"));

    // Nothing was written
    assert!(!dir.path().join("checked_domains.csv").exists());
}

#[test]
fn test_invalid_alphabet_is_reported() {
    let dir = TempDir::new().unwrap();
    sieve(&dir)
        .args(["a_b", "--length", "1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration error"));
    assert!(!dir.path().join("checked_domains.csv").exists());
}

#[test]
fn test_verify_only_without_providers_fails() {
    let dir = TempDir::new().unwrap();
    sieve(&dir)
        .arg("--only-verify-api")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no active registrar"));
}

#[test]
fn test_verify_only_on_empty_ledger_with_providers() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("keys.json"),
        r#"{"providers": {"dynadot": {"api_key": "k"}}}"#,
    )
    .unwrap();

    let assert = sieve(&dir)
        .args(["--only-verify-api", "--providers-file", "keys.json", "--json"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["mode"], "verify-only");
    assert_eq!(report["api_checked"], 0);
    assert_eq!(report["generated"], 0);
}

#[test]
fn test_broken_config_file_is_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("domain-sieve.toml"), "[defaults]\nlength = \"four\"\n").unwrap();

    sieve(&dir)
        .arg("--only-verify-api")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_resumed_run_with_full_ledger_generates_nothing() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("checked_domains.csv"),
        "domain,dns_checked,api_verified,available,note\n\
         a.invalid,true,false,false,registered\n\
         b.invalid,true,false,false,registered\n",
    )
    .unwrap();

    let assert = sieve(&dir)
        .args(["ab", "--length", "1", "--tld", ".invalid", "--json"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["generated"], 0);
    assert_eq!(report["ledger_total"], 2);
    assert_eq!(report["cancelled"], false);
}
