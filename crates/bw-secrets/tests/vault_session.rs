//! End-to-end runs against a scripted `bw` executable
#![cfg(unix)]

mod common;

use std::{
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    process::Output,
};

use common::bw_secrets;

/// Stand-in for the Bitwarden CLI that appends its arguments to `calls.log`.
const FAKE_BW: &str = r#"#!/bin/sh
echo "$*" >> "$BW_FAKE_CALLS"
case "$1" in
  login) [ -n "$BW_CLIENTSECRET" ] || exit 1 ;;
  unlock) [ "$BW_PASSWORD" = "master-password" ] || exit 1; printf 'session-token\n' ;;
  get)
    [ "$BW_SESSION" = "session-token" ] || { echo "Vault is locked." >&2; exit 1; }
    if [ "$3" = "db" ]; then printf 'hunter2\n'; else echo "Not found." >&2; exit 1; fi
    ;;
esac
exit 0
"#;

const CONFIG: &str = "\
BW_SERVER=https://vault.example.com
BW_CLIENTID=user.1234
BW_CLIENTSECRET='client-secret'
BW_PASSWORD='master-password'
";

struct ScriptedBw {
    dir: tempfile::TempDir,
}

impl ScriptedBw {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("bin");
        std::fs::create_dir(&bin).unwrap();
        let bw = bin.join("bw");
        std::fs::write(&bw, FAKE_BW).unwrap();
        std::fs::set_permissions(&bw, std::fs::Permissions::from_mode(0o755)).unwrap();
        std::fs::write(dir.path().join("bw-secrets-config.conf"), CONFIG).unwrap();
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn calls_log(&self) -> PathBuf {
        self.path().join("calls.log")
    }

    fn run(&self, args: &[&str]) -> Output {
        let config = self.path().join("bw-secrets-config.conf");
        bw_secrets(self.path())
            .env("PATH", self.path().join("bin"))
            .env("BW_FAKE_CALLS", self.calls_log())
            .args(["--no-install", "-c", config.to_str().unwrap()])
            .args(args)
            .output()
            .expect("Failed to execute bw-secrets command")
    }

    fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.calls_log())
            .unwrap_or_default()
            .lines()
            .map(str::to_owned)
            .collect()
    }
}

#[test]
fn test_get_prints_only_the_value() {
    let bw = ScriptedBw::new();

    let output = bw.run(&["get", "db"]);

    assert_eq!(output.status.code(), Some(0), "{output:?}");
    assert_eq!(output.stdout, b"hunter2\n");
    let calls = bw.calls();
    assert!(
        calls.iter().any(|c| c == "get password db --nointeraction"),
        "{calls:?}"
    );
    assert_eq!(calls.last().map(String::as_str), Some("logout --nointeraction"));
    assert!(
        !calls.iter().any(|c| c.contains("client-secret") || c.contains("master-password")),
        "Secrets must not be passed as arguments: {calls:?}"
    );
}

#[test]
fn test_missing_secret_exits_60_and_logs_out() {
    let bw = ScriptedBw::new();

    let output = bw.run(&["get", "nope"]);

    assert_eq!(output.status.code(), Some(60), "{output:?}");
    assert!(output.stdout.is_empty());
    let calls = bw.calls();
    assert_eq!(calls.last().map(String::as_str), Some("logout --nointeraction"));
}
