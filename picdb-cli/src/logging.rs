//! Structured logging, gated on an environment variable so a plain `picdb`
//! invocation stays silent on stderr.

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

const LOG_ENV_VAR: &str = "PICDB_LOG";

/// Initializes the tracing subscriber if `PICDB_LOG` is set. A no-op
/// otherwise, so ordinary CLI usage emits nothing but command output.
pub(crate) fn initialize() {
    if std::env::var_os(LOG_ENV_VAR).is_none() {
        return;
    }

    let format = fmt::format()
        .with_ansi(std::io::stderr().is_terminal())
        .with_level(true)
        .with_target(false)
        .with_timer(fmt::time::uptime())
        .compact();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env(LOG_ENV_VAR))
        .event_format(format)
        .with_writer(std::io::stderr)
        .init();
}
