use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use super::{SecretField, SessionToken, VaultClient, VaultError, VaultOperation};
use crate::process::{CommandRunner, Invocation, ProcessOutput};

/// Name of the Bitwarden CLI executable.
pub const BW_BINARY: &str = "bw";

const CLIENT_ID_ENV: &str = "BW_CLIENTID";
const CLIENT_SECRET_ENV: &str = "BW_CLIENTSECRET";
const PASSWORD_ENV: &str = "BW_PASSWORD";
const SESSION_ENV: &str = "BW_SESSION";

/// [`VaultClient`] that drives the Bitwarden CLI (`bw`).
///
/// Credentials, the master password and the session token are handed to `bw` through its
/// environment, never its arguments.
#[derive(Debug, Clone)]
pub struct BwCli<R> {
    runner: R,
    binary: PathBuf,
}

/// Item as returned by `bw list items`.
#[derive(Debug, Deserialize)]
struct ListedItem {
    name: String,
}

impl<R: CommandRunner> BwCli<R> {
    /// Create a client for the `bw` executable at `binary`.
    pub fn new(runner: R, binary: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            binary: binary.into(),
        }
    }

    /// Path of the `bw` executable in use.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn command<'a>(&self, args: impl IntoIterator<Item = &'a str>) -> Invocation {
        Invocation::new(&self.binary)
            .args(args)
            .args(["--nointeraction"])
    }

    async fn run(
        &self,
        operation: VaultOperation,
        invocation: Invocation,
    ) -> Result<ProcessOutput, VaultError> {
        let output = self
            .runner
            .run(&invocation)
            .await
            .map_err(|e| VaultError::new(operation, e.to_string()))?;

        if !output.success {
            return Err(VaultError::new(operation, output.diagnostic()));
        }
        Ok(output)
    }

    /// Run an operation that must print something, returning its trimmed stdout.
    async fn run_for_output(
        &self,
        operation: VaultOperation,
        invocation: Invocation,
    ) -> Result<String, VaultError> {
        let output = self.run(operation, invocation).await?;
        let value = output.stdout.trim_end_matches(['\r', '\n']);
        if value.is_empty() {
            return Err(VaultError::new(operation, "no output"));
        }
        Ok(value.to_owned())
    }
}

#[async_trait::async_trait]
impl<R: CommandRunner> VaultClient for BwCli<R> {
    async fn configure_server(&self, url: &str) -> Result<(), VaultError> {
        self.run(
            VaultOperation::ConfigureServer,
            self.command(["config", "server", url]),
        )
        .await?;
        info!("Configured vault server {url}");
        Ok(())
    }

    async fn login(&self, client_id: &str, client_secret: &str) -> Result<(), VaultError> {
        let invocation = self
            .command(["login", "--apikey"])
            .secret_env(CLIENT_ID_ENV, client_id)
            .secret_env(CLIENT_SECRET_ENV, client_secret);
        self.run(VaultOperation::Login, invocation).await?;
        Ok(())
    }

    async fn unlock(&self, password: &str) -> Result<SessionToken, VaultError> {
        let invocation = self
            .command(["unlock", "--passwordenv", PASSWORD_ENV, "--raw"])
            .secret_env(PASSWORD_ENV, password);
        let token = self
            .run_for_output(VaultOperation::Unlock, invocation)
            .await?;
        Ok(SessionToken::new(token))
    }

    async fn get_secret(
        &self,
        name: &str,
        field: SecretField,
        session: &SessionToken,
    ) -> Result<String, VaultError> {
        let invocation = self
            .command(["get", field.as_str(), name])
            .secret_env(SESSION_ENV, session.expose());
        // An item whose field is blank prints nothing; callers decide what empty means
        let output = self.run(VaultOperation::GetSecret, invocation).await?;
        Ok(output.stdout.trim_end_matches(['\r', '\n']).to_owned())
    }

    async fn list_secret_names(&self, session: &SessionToken) -> Result<Vec<String>, VaultError> {
        let invocation = self
            .command(["list", "items"])
            .secret_env(SESSION_ENV, session.expose());
        let json = self
            .run_for_output(VaultOperation::ListSecrets, invocation)
            .await?;

        let items: Vec<ListedItem> = serde_json::from_str(&json).map_err(|e| {
            VaultError::new(
                VaultOperation::ListSecrets,
                format!("unexpected output: {e}"),
            )
        })?;
        debug!("Listed {} items", items.len());
        Ok(items.into_iter().map(|item| item.name).collect())
    }

    async fn logout(&self) -> Result<(), VaultError> {
        self.run(VaultOperation::Logout, self.command(["logout"]))
            .await?;
        Ok(())
    }
}
