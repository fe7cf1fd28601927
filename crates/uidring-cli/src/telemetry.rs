//! Logging setup for the command-line tool.
//!
//! Logs go to stderr so stdout only carries UIDs. Filtering comes from
//! `RUST_LOG` and defaults to [`DEFAULT_FILTER`].

use tracing_subscriber::{EnvFilter, fmt};

pub const DEFAULT_FILTER: &str = "info";

/// Installs the global `tracing` subscriber.
pub fn init_tracing() {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_names(true)
        .with_timer(fmt::time::ChronoLocal::rfc_3339())
        .init();
}
