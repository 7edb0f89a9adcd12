use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global subscriber: stderr plus `<save_dir>/<file_name>`.
///
/// The returned guard flushes the file writer on drop and must be held
/// until the program exits.
pub fn init_logging(save_dir: &Path, file_name: &str) -> Result<WorkerGuard> {
    std::fs::create_dir_all(save_dir)
        .with_context(|| format!("Failed to create log directory: {:?}", save_dir))?;

    let file_appender = tracing_appender::rolling::never(save_dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(false);

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::debug!("Logging to {}", save_dir.join(file_name).display());
    Ok(guard)
}
