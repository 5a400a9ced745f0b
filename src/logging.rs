use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "TYPESPRINT_LOG";
pub const LOG_FILE: &str = "typesprint.log";

/// Sends tracing output to `<log_dir>/typesprint.log`. The terminal belongs to
/// the UI, so nothing is written to stderr.
///
/// Filtering comes from `TYPESPRINT_LOG` (default `info`). Returns `None` if
/// a global subscriber is already installed. Keep the guard alive until exit
/// so buffered lines are flushed.
pub fn init(log_dir: &Path) -> std::io::Result<Option<WorkerGuard>> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    match tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
    {
        Ok(()) => Ok(Some(guard)),
        Err(_) => Ok(None),
    }
}

/// Logs panics before the default hook prints them.
pub fn install_panic_hook() {
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!(target: "typesprint::panic", %info, "panic");
        default_panic(info);
    }));
}
