use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use reelwatch_core::config::AppConfig;

use crate::error::HostError;

/// Log to a daily rolling file; stdout belongs to the browser.
///
/// `RUST_LOG` overrides `filter`. Keep the guard alive until exit so buffered
/// lines are flushed.
pub fn init(filter: &str) -> Result<WorkerGuard, HostError> {
    let dir = AppConfig::log_dir();
    std::fs::create_dir_all(&dir)?;

    let appender = tracing_appender::rolling::daily(&dir, "reelwatch-host.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(guard)
}
