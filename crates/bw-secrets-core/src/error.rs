//! Errors that can occur while running a bw-secrets command

use std::path::PathBuf;

use thiserror::Error;

use crate::vault::VaultError;

/// Every failure is fatal to the current invocation. Each variant maps to a fixed process exit
/// code through [`Error::exit_code`] so scripts can tell failures apart.
#[derive(Debug, Error)]
pub enum Error {
    /// The config file does not exist or could not be read.
    #[error("Config file not found: {}{}", .path.display(), io_reason(.source))]
    ConfigNotFound {
        /// Path that was looked up
        path: PathBuf,
        /// Why an existing file could not be read
        source: Option<std::io::Error>,
    },

    /// The config file could be read but is not acceptable.
    #[error("Invalid config: {0}")]
    ConfigInvalid(String),

    /// The vault binary is not installed and installing it was not requested.
    #[error("Bitwarden CLI (`bw`) is not installed; run `bw-secrets install` first")]
    VaultNotInstalled,

    /// A prerequisite of an installation step is missing.
    #[error("Installation prerequisite missing: {0}")]
    InstallToolMissing(String),

    /// Every installation step failed.
    #[error("Failed to install the Bitwarden CLI: {0}")]
    InstallFailed(String),

    /// The vault tool rejected the configured server.
    #[error("Failed to configure vault server: {0}")]
    ServerConfigFailed(#[source] VaultError),

    /// API key login was rejected.
    #[error("Login failed: {0}")]
    LoginFailed(#[source] VaultError),

    /// Unlock failed or did not produce a usable session token.
    #[error("Vault session is invalid: {0}")]
    SessionInvalid(String),

    /// The requested secret does not exist.
    #[error("Secret not found: {name}")]
    SecretNotFound {
        /// Name of the secret that was requested
        name: String,
    },

    /// The requested secret exists but has no value.
    #[error("Secret is empty: {name}")]
    SecretEmpty {
        /// Name of the secret that was requested
        name: String,
    },

    /// The command line could not be used as given.
    #[error("{0}")]
    Usage(String),

    /// The invocation was interrupted by a signal.
    #[error("Interrupted")]
    Interrupted,

    #[error(transparent)]
    #[allow(missing_docs)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    #[allow(missing_docs)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Process exit code reported for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Usage(_) => 1,
            Error::ConfigNotFound { .. } | Error::ConfigInvalid(_) => 10,
            Error::VaultNotInstalled => 20,
            Error::InstallToolMissing(_) | Error::InstallFailed(_) => 30,
            Error::ServerConfigFailed(_) => 40,
            Error::SessionInvalid(_) => 50,
            Error::SecretNotFound { .. } | Error::SecretEmpty { .. } => 60,
            Error::LoginFailed(_) => 70,
            Error::Interrupted => 130,
            Error::Vault(_) | Error::Io(_) => 1,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

fn io_reason(source: &Option<std::io::Error>) -> String {
    source
        .as_ref()
        .map(|e| format!(" ({e})"))
        .unwrap_or_default()
}
