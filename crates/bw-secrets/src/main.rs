#![doc = include_str!("../README.md")]

use std::{process::ExitCode, time::Duration};

use bw_secrets_core::process::SystemRunner;
use clap::{CommandFactory, Parser, error::ErrorKind};
use tracing::{debug, error, warn};

use crate::{command::*, dispatch::Dispatcher};

mod command;
mod dispatch;
mod logging;
mod render;

const USAGE_EXIT_CODE: u8 = 1;
const LOG_FILE_NAME: &str = "bw-secrets.log";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    if let Err(e) = color_eyre::install() {
        eprintln!("Failed to install panic handler: {e}");
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version go to stdout, everything else to stderr
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(USAGE_EXIT_CODE),
            };
        }
    };

    let log_file = cli
        .log_file
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join(LOG_FILE_NAME));
    logging::init(&log_file);

    let Some(command) = cli.command else {
        eprintln!("{}", Cli::command().render_usage());
        return ExitCode::from(USAGE_EXIT_CODE);
    };
    debug!(?command, "Starting");

    let runner = SystemRunner::new(Duration::from_secs(cli.timeout));
    let dispatcher = Dispatcher::new(runner, &cli.config, cli.no_install);

    let result = match dispatcher.dispatch(command, interrupted()).await {
        Ok(output) => output
            .render(&mut std::io::stdout().lock())
            .map_err(bw_secrets_core::Error::from),
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}

/// Completes on Ctrl-C or, on unix, SIGTERM.
async fn interrupted() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    () = ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {e}");
                ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {e}");
        // Never report an interrupt that did not happen
        std::future::pending::<()>().await;
    }
}
