//! Authentication session lifecycle.
//!
//! A [`SessionManager`] owns the session token for one invocation. It acquires the token with a
//! login followed by an unlock and guarantees that the token is dropped, and the vault tool
//! logged out, on every exit path.

use std::future::Future;

use tracing::{debug, info, warn};

use crate::{
    Config,
    error::{Error, Result},
    vault::{SessionToken, VaultClient},
};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing has been attempted yet.
    Unauthenticated,
    /// API key login in progress.
    LoggingIn,
    /// Unlock in progress.
    Unlocking,
    /// A session token is held.
    Active,
    /// The session was torn down. Terminal.
    Closed,
}

/// Owns the session token for a single invocation.
///
/// Login and unlock are never retried: repeated attempts against a remote vault risk locking the
/// account.
pub struct SessionManager<'a, V: ?Sized> {
    client: &'a V,
    state: SessionState,
    token: Option<SessionToken>,
}

impl<'a, V: VaultClient + ?Sized> SessionManager<'a, V> {
    #[allow(missing_docs)]
    pub fn new(client: &'a V) -> Self {
        Self {
            client,
            state: SessionState::Unauthenticated,
            token: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Token of the active session, if any.
    pub fn token(&self) -> Option<&SessionToken> {
        self.token.as_ref()
    }

    /// Log in and unlock, returning the session token.
    pub async fn open(&mut self, config: &Config) -> Result<&SessionToken> {
        if self.state != SessionState::Unauthenticated {
            return Err(Error::SessionInvalid(format!(
                "cannot open a session in state {:?}",
                self.state
            )));
        }

        // A previous run may have left the tool logged in.
        if let Err(e) = self.client.logout().await {
            debug!("No stale session to clear: {e}");
        }

        self.state = SessionState::LoggingIn;
        self.client
            .login(config.client_id(), config.client_secret())
            .await
            .map_err(Error::LoginFailed)?;
        info!("Logged in to {}", config.server_url());

        self.state = SessionState::Unlocking;
        let token = self
            .client
            .unlock(config.master_password())
            .await
            .map_err(|e| Error::SessionInvalid(e.to_string()))?;
        if token.is_empty() {
            return Err(Error::SessionInvalid(
                "unlock reported success but returned no session token".to_owned(),
            ));
        }

        self.state = SessionState::Active;
        info!("Vault unlocked");
        Ok(self.token.insert(token))
    }

    /// Tear the session down. Safe to call any number of times.
    ///
    /// Logout failures are logged and swallowed so they never mask the outcome of the command.
    pub async fn close(&mut self) {
        let needs_logout = matches!(
            self.state,
            SessionState::LoggingIn | SessionState::Unlocking | SessionState::Active
        );
        self.token = None;
        self.state = SessionState::Closed;

        if needs_logout {
            match self.client.logout().await {
                Ok(()) => info!("Logged out"),
                Err(e) => warn!("Failed to log out: {e}"),
            }
        }
    }

    /// Run `action` inside a session.
    ///
    /// The session is opened, `action` receives the client and the token, and the session is
    /// closed afterwards whether `action` succeeded, failed, or `interrupt` fired first. An
    /// interrupt discards whatever `action` would have produced.
    pub async fn scoped<T, F, Fut>(
        &mut self,
        config: &Config,
        interrupt: impl Future<Output = ()>,
        action: F,
    ) -> Result<T>
    where
        F: FnOnce(&'a V, SessionToken) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let client = self.client;
        let result = tokio::select! {
            biased;
            () = interrupt => Err(Error::Interrupted),
            result = async {
                let token = self.open(config).await?.clone();
                action(client, token).await
            } => result,
        };

        self.close().await;
        result
    }
}

impl<V: ?Sized> Drop for SessionManager<'_, V> {
    fn drop(&mut self) {
        if self.token.take().is_some() {
            warn!("Session dropped without being closed; token discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::vault::{SecretField, VaultError, VaultOperation};

    const CONFIG: &str = "\
BW_SERVER=https://vault.example.com
BW_CLIENTID=user.1234
BW_CLIENTSECRET=secret
BW_PASSWORD=password
";

    #[derive(Default)]
    struct StubVault {
        unlock_token: &'static str,
        fail_logout: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    impl StubVault {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl VaultClient for StubVault {
        async fn configure_server(&self, _url: &str) -> Result<(), VaultError> {
            self.calls.lock().unwrap().push("configure_server");
            Ok(())
        }

        async fn login(&self, _id: &str, _secret: &str) -> Result<(), VaultError> {
            self.calls.lock().unwrap().push("login");
            Ok(())
        }

        async fn unlock(&self, _password: &str) -> Result<SessionToken, VaultError> {
            self.calls.lock().unwrap().push("unlock");
            Ok(SessionToken::new(self.unlock_token))
        }

        async fn get_secret(
            &self,
            _name: &str,
            _field: SecretField,
            _session: &SessionToken,
        ) -> Result<String, VaultError> {
            unreachable!()
        }

        async fn list_secret_names(
            &self,
            _session: &SessionToken,
        ) -> Result<Vec<String>, VaultError> {
            unreachable!()
        }

        async fn logout(&self) -> Result<(), VaultError> {
            self.calls.lock().unwrap().push("logout");
            if self.fail_logout {
                Err(VaultError::new(VaultOperation::Logout, "You are not logged in."))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_open_and_close() {
        let vault = StubVault {
            unlock_token: "token",
            ..Default::default()
        };
        let config = Config::parse(CONFIG).unwrap();
        let mut sessions = SessionManager::new(&vault);

        let token = sessions.open(&config).await.unwrap();
        assert_eq!(token.expose(), "token");
        assert_eq!(sessions.state(), SessionState::Active);

        sessions.close().await;
        assert_eq!(sessions.state(), SessionState::Closed);
        assert!(sessions.token().is_none());
        assert_eq!(vault.calls(), ["logout", "login", "unlock", "logout"]);
    }

    #[tokio::test]
    async fn test_empty_token_is_rejected_and_never_stored() {
        let vault = StubVault::default();
        let config = Config::parse(CONFIG).unwrap();
        let mut sessions = SessionManager::new(&vault);

        let err = sessions.open(&config).await.unwrap_err();
        assert!(matches!(err, Error::SessionInvalid(_)));
        assert_eq!(err.exit_code(), 50);
        assert!(sessions.token().is_none());
        assert_eq!(sessions.state(), SessionState::Unlocking);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_swallows_logout_errors() {
        let vault = StubVault {
            unlock_token: "token",
            fail_logout: true,
            ..Default::default()
        };
        let config = Config::parse(CONFIG).unwrap();
        let mut sessions = SessionManager::new(&vault);
        sessions.open(&config).await.unwrap();

        sessions.close().await;
        sessions.close().await;

        assert_eq!(sessions.state(), SessionState::Closed);
        assert_eq!(vault.calls(), ["logout", "login", "unlock", "logout"]);
    }

    #[tokio::test]
    async fn test_cannot_reopen_closed_session() {
        let vault = StubVault {
            unlock_token: "token",
            ..Default::default()
        };
        let config = Config::parse(CONFIG).unwrap();
        let mut sessions = SessionManager::new(&vault);
        sessions.close().await;

        assert!(sessions.open(&config).await.is_err());
    }
}
