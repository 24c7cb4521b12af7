//! Declarative config file loading.
//!
//! The config file binds a small set of recognized keys to string values, one `KEY=VALUE` per
//! line. It is parsed, never executed: anything that would expand or run in a shell is rejected.
//!
//! ```text
//! # bw-secrets-config.conf
//! BW_SERVER=https://vault.example.com
//! BW_CLIENTID=user.00000000-0000-0000-0000-000000000000
//! BW_CLIENTSECRET='s3cr3t'
//! BW_PASSWORD="correct horse battery staple"
//! ```

use std::{fmt, io, path::Path};

use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Config file name used when no `--config` flag is given.
pub const DEFAULT_CONFIG_FILE: &str = "./bw-secrets-config.conf";

const SERVER_KEY: &str = "BW_SERVER";
const CLIENT_ID_KEY: &str = "BW_CLIENTID";
const CLIENT_SECRET_KEY: &str = "BW_CLIENTSECRET";
const PASSWORD_KEY: &str = "BW_PASSWORD";

const UNQUOTED_FORBIDDEN: &[char] = &['$', '`', ';', '|', '&', '(', ')', '<', '>', '\\', '"', '\''];

/// Settings required to authenticate against the vault server.
///
/// All four fields are guaranteed non-empty. Secret fields are zeroized on drop and never shown
/// by the `Debug` implementation.
#[derive(Clone)]
pub struct Config {
    server_url: String,
    client_id: String,
    client_secret: Zeroizing<String>,
    master_password: Zeroizing<String>,
}

impl Config {
    /// Read and parse the config file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = Zeroizing::new(std::fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::ConfigNotFound {
                path: path.to_owned(),
                source: None,
            },
            io::ErrorKind::InvalidData => Error::ConfigInvalid("file is not valid UTF-8".to_owned()),
            _ => Error::ConfigNotFound {
                path: path.to_owned(),
                source: Some(e),
            },
        })?);

        debug!("Loaded config from {}", path.display());
        Self::parse(&contents)
    }

    /// Parse config file contents.
    pub fn parse(contents: &str) -> Result<Self> {
        let mut server_url = None;
        let mut client_id = None;
        let mut client_secret = None;
        let mut master_password = None;

        for (index, raw_line) in contents.lines().enumerate() {
            let line_no = index + 1;
            let line = raw_line.trim_matches(|c: char| c == ' ' || c == '\t' || c == '\r');

            // Comments included
            if let Some(c) = line.chars().find(|c| c.is_control() && *c != '\t') {
                return Err(invalid(line_no, format!("control character {c:?}")));
            }
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, raw_value) = line
                .split_once('=')
                .ok_or_else(|| invalid(line_no, "expected KEY=VALUE"))?;
            let key = key.trim_end();
            if !is_valid_key(key) {
                return Err(invalid(line_no, "keys must be plain identifiers"));
            }
            let value = parse_value(raw_value.trim_start()).map_err(|e| invalid(line_no, e))?;

            let slot = match key {
                SERVER_KEY => &mut server_url,
                CLIENT_ID_KEY => &mut client_id,
                CLIENT_SECRET_KEY => &mut client_secret,
                PASSWORD_KEY => &mut master_password,
                _ => {
                    warn!("Ignoring unknown config key {key} on line {line_no}");
                    continue;
                }
            };
            if slot.is_some() {
                return Err(invalid(line_no, format!("{key} is set more than once")));
            }
            *slot = Some(value);
        }

        Ok(Config {
            server_url: required(SERVER_KEY, server_url)?.to_string(),
            client_id: required(CLIENT_ID_KEY, client_id)?.to_string(),
            client_secret: required(CLIENT_SECRET_KEY, client_secret)?,
            master_password: required(PASSWORD_KEY, master_password)?,
        })
    }

    /// Base URL of the vault server.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// API key client id.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// API key client secret.
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Master password used to unlock the vault.
    pub fn master_password(&self) -> &str {
        &self.master_password
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("server_url", &self.server_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("master_password", &"<redacted>")
            .finish()
    }
}

fn invalid(line_no: usize, reason: impl fmt::Display) -> Error {
    Error::ConfigInvalid(format!("line {line_no}: {reason}"))
}

fn required(key: &str, value: Option<Zeroizing<String>>) -> Result<Zeroizing<String>> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        Some(_) => Err(Error::ConfigInvalid(format!("{key} must not be empty"))),
        None => Err(Error::ConfigInvalid(format!("{key} is missing"))),
    }
}

fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_value(raw: &str) -> Result<Zeroizing<String>, String> {
    let value = if let Some(rest) = raw.strip_prefix('\'') {
        let inner = rest
            .strip_suffix('\'')
            .ok_or("unterminated single-quoted value")?;
        if inner.contains('\'') {
            return Err("single quotes cannot be nested".into());
        }
        inner
    } else if let Some(rest) = raw.strip_prefix('"') {
        let inner = rest
            .strip_suffix('"')
            .ok_or("unterminated double-quoted value")?;
        if inner.contains(['$', '`']) {
            return Err("substitutions are not allowed in values".into());
        }
        if inner.contains(['"', '\\']) {
            return Err("escapes are not allowed in double-quoted values".into());
        }
        inner
    } else {
        if raw.contains(char::is_whitespace) {
            return Err("unquoted values cannot contain whitespace".into());
        }
        if raw.contains(UNQUOTED_FORBIDDEN) {
            return Err("unquoted value contains shell syntax; quote it with '...'".into());
        }
        raw
    };

    Ok(Zeroizing::new(value.to_owned()))
}
