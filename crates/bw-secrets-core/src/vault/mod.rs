//! Typed adapter around the external vault tool.
//!
//! [`VaultClient`] is the only seam between the rest of the crate and the vault. [`BwCli`]
//! implements it by driving the Bitwarden CLI; tests substitute a fake.

use std::{fmt, str::FromStr};

use thiserror::Error;
use zeroize::Zeroizing;

mod bw_cli;

pub use bw_cli::{BW_BINARY, BwCli};

/// Opaque credential proving the vault is unlocked.
///
/// Zeroized on drop and never shown by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(Zeroizing<String>);

impl SessionToken {
    /// Wrap a raw token as returned by the vault tool.
    pub fn new(token: impl Into<String>) -> Self {
        Self(Zeroizing::new(token.into()))
    }

    /// Raw token value, for handing to the vault tool.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the token carries no value at all.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Operations exposed by the vault adapter, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultOperation {
    #[allow(missing_docs)]
    ConfigureServer,
    #[allow(missing_docs)]
    Login,
    #[allow(missing_docs)]
    Unlock,
    #[allow(missing_docs)]
    GetSecret,
    #[allow(missing_docs)]
    ListSecrets,
    #[allow(missing_docs)]
    Logout,
}

impl fmt::Display for VaultOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VaultOperation::ConfigureServer => "bw config server",
            VaultOperation::Login => "bw login",
            VaultOperation::Unlock => "bw unlock",
            VaultOperation::GetSecret => "bw get",
            VaultOperation::ListSecrets => "bw list",
            VaultOperation::Logout => "bw logout",
        })
    }
}

/// A vault operation failed.
///
/// `message` holds the tool's own diagnostic; it never contains the credentials or secret values
/// that were submitted.
#[derive(Debug, Clone, Error)]
#[error("`{operation}` failed: {message}")]
pub struct VaultError {
    /// Operation that was attempted
    pub operation: VaultOperation,
    /// Diagnostic reported by the vault tool
    pub message: String,
}

impl VaultError {
    /// Create an error for `operation`.
    pub fn new(operation: VaultOperation, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }

    /// Whether the vault tool reported that the requested object does not exist.
    pub fn is_not_found(&self) -> bool {
        let message = self.message.to_ascii_lowercase();
        message.contains("not found") || message.contains("no such")
    }
}

/// Field of a vault item that `get` reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SecretField {
    #[default]
    #[allow(missing_docs)]
    Password,
    #[allow(missing_docs)]
    Username,
    #[allow(missing_docs)]
    Notes,
    #[allow(missing_docs)]
    Totp,
    #[allow(missing_docs)]
    Uri,
}

impl SecretField {
    /// Object name understood by `bw get`.
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretField::Password => "password",
            SecretField::Username => "username",
            SecretField::Notes => "notes",
            SecretField::Totp => "totp",
            SecretField::Uri => "uri",
        }
    }
}

impl fmt::Display for SecretField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecretField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "password" => SecretField::Password,
            "username" => SecretField::Username,
            "notes" => SecretField::Notes,
            "totp" => SecretField::Totp,
            "uri" => SecretField::Uri,
            other => return Err(format!("unknown secret field `{other}`")),
        })
    }
}

/// Command surface of the external vault tool.
#[async_trait::async_trait]
pub trait VaultClient: Send + Sync {
    /// Point the vault tool at the server it should talk to.
    async fn configure_server(&self, url: &str) -> Result<(), VaultError>;

    /// Log in with an API key.
    async fn login(&self, client_id: &str, client_secret: &str) -> Result<(), VaultError>;

    /// Unlock the vault with the master password, returning a session token.
    async fn unlock(&self, password: &str) -> Result<SessionToken, VaultError>;

    /// Read one field of a named secret.
    async fn get_secret(
        &self,
        name: &str,
        field: SecretField,
        session: &SessionToken,
    ) -> Result<String, VaultError>;

    /// Names of every secret visible to the session.
    async fn list_secret_names(&self, session: &SessionToken) -> Result<Vec<String>, VaultError>;

    /// End any session the tool holds. Callers treat failures as non-fatal.
    async fn logout(&self) -> Result<(), VaultError>;
}
