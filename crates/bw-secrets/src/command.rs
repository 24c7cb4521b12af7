use std::path::PathBuf;

use bw_secrets_core::{config::DEFAULT_CONFIG_FILE, process::DEFAULT_TIMEOUT, vault::SecretField};
use clap::{Parser, Subcommand};

pub const LOG_FILE_ENV: &str = "BW_SECRETS_LOG";

#[derive(Parser, Clone, Debug)]
#[command(name = "bw-secrets", version, about = "Fetch secrets from a Bitwarden vault", long_about = None, disable_version_flag = true)]
pub struct Cli {
    // Optional so a missing command can be reported as a usage error with our own exit code
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(
        short = 'c',
        long,
        value_name = "PATH",
        default_value = DEFAULT_CONFIG_FILE,
        help = "Config file with the server URL, API key and master password."
    )]
    pub config: PathBuf,

    #[arg(
        long,
        value_name = "SECS",
        default_value_t = DEFAULT_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Maximum time a single `bw` call may take."
    )]
    pub timeout: u64,

    #[arg(long, help = "Fail instead of installing `bw` when it is missing.")]
    pub no_install: bool,

    #[arg(
        long,
        value_name = "PATH",
        env = LOG_FILE_ENV,
        help = "File that diagnostics are appended to. Defaults to bw-secrets.log in the temp directory."
    )]
    pub log_file: Option<PathBuf>,

    // Clap uses uppercase V for the short flag by default, but we want lowercase v
    // https://github.com/clap-rs/clap/issues/138
    #[arg(short = 'v', long, action = clap::builder::ArgAction::Version)]
    pub version: (),
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    #[command(long_about = "Make sure the Bitwarden CLI is installed and print its location.")]
    Install,

    #[command(long_about = "Print a single secret from the vault.")]
    Get {
        // Collected as a list so a wrong number of names gets our own usage error
        #[arg(value_name = "SECRET_NAME")]
        names: Vec<String>,

        #[arg(long, default_value_t = SecretField::Password, help = "Item field to print: password, username, notes, totp or uri.")]
        field: SecretField,
    },

    #[command(long_about = "List the names of the secrets in the vault.")]
    List,

    #[command(long_about = "Check that the vault can be logged in to and unlocked.")]
    Test,
}
