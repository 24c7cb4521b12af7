//! Session lifecycle guarantees around a scoped command

use bw_secrets_core::{
    Config, Error,
    session::{SessionManager, SessionState},
    vault::{SecretField, VaultClient},
};
use bw_secrets_test::{FakeVault, VALID_CONFIG, VaultCall};

fn config() -> Config {
    Config::parse(VALID_CONFIG).unwrap()
}

#[tokio::test]
async fn test_scoped_runs_action_with_session_and_logs_out() {
    let vault = FakeVault::unlocked("session-token").with_secret("db", "hunter2");
    let mut sessions = SessionManager::new(&vault);

    let value = sessions
        .scoped(
            &config(),
            std::future::pending(),
            |client, token| async move {
                client
                    .get_secret("db", SecretField::Password, &token)
                    .await
                    .map_err(Error::from)
            },
        )
        .await
        .unwrap();

    assert_eq!(value, "hunter2");
    assert_eq!(sessions.state(), SessionState::Closed);
    assert!(sessions.token().is_none());
    assert_eq!(
        vault.calls(),
        [
            VaultCall::Logout,
            VaultCall::Login {
                client_id: "user.00000000-0000-0000-0000-000000000000".into()
            },
            VaultCall::Unlock,
            VaultCall::GetSecret {
                name: "db".into(),
                field: SecretField::Password,
                session: "session-token".into(),
            },
            VaultCall::Logout,
        ]
    );
}

#[tokio::test]
async fn test_scoped_logs_out_when_action_fails() {
    let vault = FakeVault::unlocked("session-token");
    let mut sessions = SessionManager::new(&vault);

    let err = sessions
        .scoped(
            &config(),
            std::future::pending(),
            |client, token| async move {
                client
                    .get_secret("missing", SecretField::Password, &token)
                    .await
                    .map_err(|_| Error::SecretNotFound {
                        name: "missing".into(),
                    })
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 60);
    assert_eq!(vault.logouts(), 2);
    assert_eq!(sessions.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_login_failure_is_not_retried() {
    let vault = FakeVault::unlocked("session-token").failing_login("Invalid client secret");
    let mut sessions = SessionManager::new(&vault);

    let err = sessions
        .scoped(&config(), std::future::pending(), |_, _| async {
            Ok::<_, Error>(())
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::LoginFailed(_)));
    assert_eq!(err.exit_code(), 70);
    let logins = vault
        .calls()
        .into_iter()
        .filter(|c| matches!(c, VaultCall::Login { .. }))
        .count();
    assert_eq!(logins, 1);
    assert!(!vault.calls().contains(&VaultCall::Unlock));
    assert_eq!(vault.logouts(), 2);
}

#[tokio::test]
async fn test_unlock_failure_is_session_invalid() {
    let vault = FakeVault::default().failing_unlock("Invalid master password.");
    let mut sessions = SessionManager::new(&vault);

    let err = sessions
        .scoped(&config(), std::future::pending(), |_, _| async {
            Ok::<_, Error>(())
        })
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 50);
    assert!(sessions.token().is_none());
}

#[tokio::test]
async fn test_interrupt_still_closes_session_without_output() {
    let vault = FakeVault::unlocked("session-token")
        .with_secret("db", "hunter2")
        .hanging_on_get();
    let mut sessions = SessionManager::new(&vault);
    let interrupt = async {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    };

    let result = sessions
        .scoped(&config(), interrupt, |client, token| async move {
            client
                .get_secret("db", SecretField::Password, &token)
                .await
                .map_err(Error::from)
        })
        .await;

    assert!(matches!(result, Err(Error::Interrupted)));
    assert_eq!(sessions.state(), SessionState::Closed);
    assert!(sessions.token().is_none());
    assert_eq!(vault.calls().last(), Some(&VaultCall::Logout));
}

#[tokio::test]
async fn test_cleanup_twice_after_logout_failure() {
    let vault = FakeVault::unlocked("session-token").failing_logout("You are not logged in.");
    let mut sessions = SessionManager::new(&vault);

    sessions
        .scoped(&config(), std::future::pending(), |_, _| async {
            Ok::<_, Error>(())
        })
        .await
        .unwrap();
    sessions.close().await;
    sessions.close().await;

    assert_eq!(sessions.state(), SessionState::Closed);
    assert!(sessions.token().is_none());
}
