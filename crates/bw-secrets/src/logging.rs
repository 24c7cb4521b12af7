use std::{
    fs::OpenOptions,
    io::IsTerminal,
    path::Path,
    sync::Mutex,
};

use tracing::warn;
use tracing_subscriber::{
    EnvFilter, Layer as _,
    filter::{FilterExt as _, LevelFilter},
    fmt, prelude::__tracing_subscriber_SubscriberExt as _,
    util::SubscriberInitExt as _,
};

/// Route diagnostics to stderr and append them to `log_file`.
///
/// Stderr gets warnings and the log file gets debug output, unless `RUST_LOG` says otherwise.
/// Errors are shown on stderr regardless.
pub fn init(log_file: &Path) {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .without_time()
        .with_target(false)
        .with_filter(filter(LevelFilter::WARN).or(LevelFilter::ERROR));

    let (file_layer, file_error) = match OpenOptions::new().create(true).append(true).open(log_file) {
        Ok(file) => (
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_filter(filter(LevelFilter::DEBUG)),
            ),
            None,
        ),
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    if let Some(e) = file_error {
        warn!("Cannot write log file {}: {e}", log_file.display());
    }
}

fn filter(default: LevelFilter) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(default.into())
        // RUST_LOG overrides the default for matching targets
        .from_env_lossy()
}
