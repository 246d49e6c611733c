//! Diagnostic logging setup
//!
//! Diagnostics go to a log file so they never interleave with the console
//! transcript on stdout. If the file cannot be opened they go to stderr.

use std::fs::OpenOptions;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt::time::ChronoLocal, EnvFilter};

fn env_filter(verbose: bool) -> EnvFilter {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Dependencies stay quiet unless asked for explicitly
    ["hyper=warn", "hyper_util=warn", "reqwest=warn", "rustls=warn", "h2=warn"]
        .into_iter()
        .filter_map(|directive| directive.parse().ok())
        .fold(filter, EnvFilter::add_directive)
}

/// Install the global subscriber writing to `log_path`
///
/// The returned guard flushes buffered log lines when dropped, so keep it
/// alive for the lifetime of the program.
pub fn init(log_path: &Path, verbose: bool) -> Option<WorkerGuard> {
    let file = log_path
        .parent()
        .map_or(Ok(()), std::fs::create_dir_all)
        .and_then(|_| OpenOptions::new().create(true).append(true).open(log_path));

    match file {
        Ok(file) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            let installed = tracing_subscriber::fmt()
                .with_env_filter(env_filter(verbose))
                .with_writer(writer)
                .with_timer(ChronoLocal::rfc_3339())
                .with_ansi(false)
                .try_init()
                .is_ok();
            if installed {
                tracing::info!("Logging to {}", log_path.display());
            }
            Some(guard)
        }
        Err(e) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter(verbose))
                .with_writer(std::io::stderr)
                .with_timer(ChronoLocal::rfc_3339())
                .try_init();
            tracing::warn!("Could not open log file {}: {}", log_path.display(), e);
            None
        }
    }
}
