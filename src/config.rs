use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use crate::cache::{CachePolicy, ImageInsertPolicy, MAX_AGE_DAYS};

const FEED_URL_ENV: &str = "FEEDCACHE_FEED_URL";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Endpoint serving the feed JSON
  pub feed_url: Url,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// SQLite database file (defaults to $XDG_DATA_HOME/feedcache/cache.db)
  pub path: Option<PathBuf>,
  #[serde(default = "default_max_age_days")]
  pub max_age_days: u32,
  #[serde(default)]
  pub image_insert: ImageInsertPolicy,
}

fn default_max_age_days() -> u32 {
  MAX_AGE_DAYS as u32
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      path: None,
      max_age_days: default_max_age_days(),
      image_insert: ImageInsertPolicy::default(),
    }
  }
}

impl CacheConfig {
  pub fn policy(&self) -> CachePolicy {
    CachePolicy::new(chrono::Duration::days(i64::from(self.max_age_days)))
  }

  /// Resolved database path.
  pub fn db_path(&self) -> Result<PathBuf> {
    match &self.path {
      Some(path) => Ok(path.clone()),
      None => data_dir().map(|dir| dir.join("cache.db")),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
  /// Default filter when RUST_LOG is unset
  #[serde(default = "default_log_level")]
  pub level: String,
  /// Write a daily rolling log file into the data directory instead of stderr
  #[serde(default)]
  pub file: bool,
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      file: false,
    }
  }
}

/// Per-user data directory of the application.
pub fn data_dir() -> Result<PathBuf> {
  dirs::data_dir()
    .map(|dir| dir.join("feedcache"))
    .ok_or_else(|| eyre!("Could not determine the user data directory"))
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./feedcache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/feedcache/config.yaml
  ///
  /// `FEEDCACHE_FEED_URL` overrides `feed_url` from the file.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::from_env()?,
    };
    config.with_env_overrides()
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("feedcache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("feedcache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  /// Configuration with defaults, when no file exists but the feed URL is
  /// set in the environment.
  fn from_env() -> Result<Self> {
    let feed_url = feed_url_from_env()?.ok_or_else(|| {
      eyre!(
        "No configuration file found. Create one at ~/.config/feedcache/config.yaml \
         or set {}.",
        FEED_URL_ENV
      )
    })?;
    Ok(Self {
      feed_url,
      cache: CacheConfig::default(),
      log: LogConfig::default(),
    })
  }

  fn with_env_overrides(mut self) -> Result<Self> {
    if let Some(url) = feed_url_from_env()? {
      self.feed_url = url;
    }
    Ok(self)
  }
}

fn feed_url_from_env() -> Result<Option<Url>> {
  match std::env::var(FEED_URL_ENV) {
    Ok(raw) => Url::parse(&raw)
      .map(Some)
      .map_err(|e| eyre!("Invalid {}: {}", FEED_URL_ENV, e)),
    Err(_) => Ok(None),
  }
}
