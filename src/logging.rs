//! Tracing subscriber setup.

use color_eyre::{eyre::eyre, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::{self, LogConfig};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level. With `log.file` set, output
/// goes to a daily rolling file in the data directory; keep the returned
/// guard alive until exit so buffered lines get flushed.
pub fn init(log: &LogConfig) -> Result<Option<WorkerGuard>> {
  let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log.level))?;

  if log.file {
    let dir = config::data_dir()?;
    std::fs::create_dir_all(&dir)?;
    let appender = tracing_appender::rolling::daily(dir, "feedcache.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
      .with_env_filter(filter)
      .with_writer(writer)
      .with_ansi(false)
      .try_init()
      .map_err(|e| eyre!("Failed to install log subscriber: {}", e))?;
    Ok(Some(guard))
  } else {
    tracing_subscriber::fmt()
      .with_env_filter(filter)
      .with_writer(std::io::stderr)
      .with_line_number(false)
      .with_file(false)
      .try_init()
      .map_err(|e| eyre!("Failed to install log subscriber: {}", e))?;
    Ok(None)
  }
}
