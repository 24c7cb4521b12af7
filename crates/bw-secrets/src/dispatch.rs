use std::{future::Future, path::PathBuf};

use bw_secrets_core::{
    Config, Error, Result,
    install::Installer,
    process::CommandRunner,
    session::SessionManager,
    vault::{BwCli, SecretField, SessionToken, VaultClient},
};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::{command::Commands, render::CommandOutput};

/// What to do once a vault session is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultAction {
    Test,
    List,
    Get { name: String, field: SecretField },
}

impl VaultAction {
    /// Validate the command line of a vault command. Happens before anything else is touched.
    fn from_command(command: Commands) -> Result<Option<Self>> {
        Ok(Some(match command {
            Commands::Install => return Ok(None),
            Commands::Test => VaultAction::Test,
            Commands::List => VaultAction::List,
            Commands::Get { names, field } => {
                let [name] = <[String; 1]>::try_from(names)
                    .map_err(|_| Error::Usage("secret name required".to_owned()))?;
                VaultAction::Get { name, field }
            }
        }))
    }
}

pub struct Dispatcher<R> {
    runner: R,
    installer: Installer<R>,
    config_path: PathBuf,
    no_install: bool,
}

impl<R: CommandRunner + Clone> Dispatcher<R> {
    pub fn new(runner: R, config_path: impl Into<PathBuf>, no_install: bool) -> Self {
        Self {
            installer: Installer::new(runner.clone()),
            runner,
            config_path: config_path.into(),
            no_install,
        }
    }

    #[cfg(test)]
    fn with_installer(mut self, installer: Installer<R>) -> Self {
        self.installer = installer;
        self
    }

    /// Run `command`, stopping early with [`Error::Interrupted`] once `interrupt` completes.
    pub async fn dispatch(
        &self,
        command: Commands,
        interrupt: impl Future<Output = ()>,
    ) -> Result<CommandOutput> {
        let action = VaultAction::from_command(command)?;
        tokio::pin!(interrupt);

        let Some(action) = action else {
            let installed = tokio::select! {
                biased;
                () = interrupt.as_mut() => return Err(Error::Interrupted),
                installed = self.installer.ensure() => installed?,
            };
            info!("bw available at {} ({})", installed.path.display(), installed.method);
            return Ok(installed.path.display().to_string().into());
        };

        let config = Config::load(&self.config_path)?;
        let binary = tokio::select! {
            biased;
            () = interrupt.as_mut() => return Err(Error::Interrupted),
            binary = self.locate_vault_tool() => binary?,
        };

        let client = BwCli::new(self.runner.clone(), binary);
        run_vault_action(&client, &config, action, interrupt).await
    }

    async fn locate_vault_tool(&self) -> Result<PathBuf> {
        if self.no_install {
            return self.installer.locate().ok_or(Error::VaultNotInstalled);
        }
        Ok(self.installer.ensure().await?.path)
    }
}

/// Point the vault tool at the configured server and run `action` inside a session.
pub async fn run_vault_action<V: VaultClient + ?Sized>(
    client: &V,
    config: &Config,
    action: VaultAction,
    interrupt: impl Future<Output = ()>,
) -> Result<CommandOutput> {
    tokio::pin!(interrupt);

    tokio::select! {
        biased;
        () = interrupt.as_mut() => return Err(Error::Interrupted),
        configured = configure_server(client, config.server_url()) => configured?,
    }

    let mut sessions = SessionManager::new(client);
    sessions
        .scoped(config, interrupt, |client, token| async move {
            match action {
                VaultAction::Test => Ok(format!(
                    "Logged in to {} and unlocked the vault",
                    config.server_url()
                )
                .into()),
                VaultAction::List => client
                    .list_secret_names(&token)
                    .await
                    .map(CommandOutput::from)
                    .map_err(|e| Error::SessionInvalid(e.to_string())),
                VaultAction::Get { name, field } => fetch_secret(client, name, field, &token).await,
            }
        })
        .await
}

/// `bw config server` refuses to run while logged in, so a session left behind by an earlier
/// run is cleared first.
async fn configure_server<V: VaultClient + ?Sized>(client: &V, url: &str) -> Result<()> {
    if let Err(e) = client.logout().await {
        debug!("No stale session to clear: {e}");
    }
    client
        .configure_server(url)
        .await
        .map_err(Error::ServerConfigFailed)
}

async fn fetch_secret<V: VaultClient + ?Sized>(
    client: &V,
    name: String,
    field: SecretField,
    token: &SessionToken,
) -> Result<CommandOutput> {
    let value = match client.get_secret(&name, field, token).await {
        Ok(value) => Zeroizing::new(value),
        Err(e) => {
            if !e.is_not_found() {
                warn!("{e}");
            }
            return Err(Error::SecretNotFound { name });
        }
    };

    if value.is_empty() {
        return Err(Error::SecretEmpty { name });
    }
    Ok(CommandOutput::Secret(value))
}
