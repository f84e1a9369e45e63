//! Tracing setup. Stdout belongs to the browser, so logs go to a daily file.

use std::path::PathBuf;

use color_eyre::{eyre::eyre, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "POKEDEX_LOG";
const DEFAULT_LEVEL: &str = "info";

pub fn log_dir() -> Result<PathBuf> {
  dirs::data_dir()
    .map(|d| d.join("pokedex").join("logs"))
    .ok_or_else(|| eyre!("Could not determine data directory"))
}

/// Filter directive: the environment wins over the config file
fn directive(env: Option<String>, config: Option<&str>) -> String {
  env
    .filter(|s| !s.trim().is_empty())
    .or_else(|| config.map(str::to_string))
    .unwrap_or_else(|| DEFAULT_LEVEL.to_string())
}

/// Install the global subscriber. Keep the guard alive until exit or
/// buffered lines are lost.
pub fn init(config_level: Option<&str>) -> Result<WorkerGuard> {
  let dir = log_dir()?;
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let directive = directive(std::env::var(LOG_ENV).ok(), config_level);
  let filter = EnvFilter::try_new(&directive)
    .map_err(|e| eyre!("Invalid log filter '{}': {}", directive, e))?;

  let (writer, guard) =
    tracing_appender::non_blocking(tracing_appender::rolling::daily(&dir, "pokedex.log"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .with_target(false)
    .try_init()
    .map_err(|e| eyre!("Failed to install tracing subscriber: {}", e))?;

  Ok(guard)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_directive_precedence() {
    assert_eq!(directive(None, None), "info");
    assert_eq!(directive(None, Some("warn")), "warn");
    assert_eq!(
      directive(Some("pokedex=debug".to_string()), Some("warn")),
      "pokedex=debug"
    );
    assert_eq!(directive(Some("  ".to_string()), Some("warn")), "warn");
  }

  #[test]
  fn test_directives_parse() {
    assert!(EnvFilter::try_new(directive(None, Some("debug"))).is_ok());
  }
}
