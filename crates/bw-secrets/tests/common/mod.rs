use std::{path::Path, process::Command};

/// Create a new bw-secrets command that logs into `dir` instead of the shared temp directory
pub fn bw_secrets(dir: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_bw-secrets"));
    command
        .env("BW_SECRETS_LOG", dir.join("bw-secrets.log"))
        .env_remove("RUST_LOG");
    command
}
