//! Structured logging with tracing.
//!
//! Log lines always go to a daily rolling file. With `verbose` they are
//! mirrored to stderr so stdout stays reserved for command output.

use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Environment variable holding the filter directives, e.g. `reel=debug`.
pub const LOG_ENV: &str = "REEL_LOG";

const DEFAULT_FILTER: &str = "info";

/// Default directory for log files.
pub fn default_log_dir() -> Result<PathBuf> {
  Ok(crate::config::data_dir()?.join("logs"))
}

/// Initialize the global subscriber.
///
/// The returned guard flushes the file writer when dropped; keep it alive
/// for the lifetime of the process.
pub fn init(log_dir: &Path, verbose: bool) -> Result<WorkerGuard> {
  std::fs::create_dir_all(log_dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", log_dir.display(), e))?;

  let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

  let appender = tracing_appender::rolling::daily(log_dir, "reel.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let file = fmt::layer()
    .with_writer(writer)
    .with_ansi(false)
    .with_target(true);

  let stderr = verbose.then(|| {
    fmt::layer()
      .with_writer(std::io::stderr)
      .with_target(false)
  });

  Registry::default()
    .with(filter)
    .with(file)
    .with(stderr)
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}
