//! Tests for the bw-secrets version flags

mod common;

use common::bw_secrets;

/// Helper function to test version output
fn assert_version_output(args: &[&str]) {
    let dir = tempfile::tempdir().unwrap();
    let output = bw_secrets(dir.path())
        .args(args)
        .output()
        .expect("Failed to execute bw-secrets command");

    assert!(output.status.success(), "Command should exit successfully");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(
        stdout.contains("bw-secrets"),
        "Output should contain 'bw-secrets': {}",
        stdout
    );
    assert!(
        stdout.contains(env!("CARGO_PKG_VERSION")),
        "Output should contain version '{}': {}",
        env!("CARGO_PKG_VERSION"),
        stdout
    );
}

#[test]
fn test_version_flag() {
    assert_version_output(&["--version"]);
}

#[test]
fn test_version_flag_short() {
    assert_version_output(&["-v"]);
}
