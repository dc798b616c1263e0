use crate::error::StateError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the portal REST API, e.g. "https://api.modportal.example/v1/"
  pub url: String,
}

/// Per-cache freshness windows. Defaults follow the portal UI's observed
/// mutation rates: the saved-mod set is toggled from many surfaces at once,
/// so it gets no more slack than ratings despite being a single key.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Favorite status and favorite list freshness, in seconds
  pub favorite_ttl_secs: u64,
  /// Per-mod rating record freshness, in seconds
  pub rating_ttl_secs: u64,
  /// Saved-mod set freshness, in seconds
  pub saved_ttl_secs: u64,
  /// Identity snapshot memoization window, in seconds
  pub identity_ttl_secs: u64,
  /// Capacity of the state-event broadcast channel
  pub event_capacity: usize,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      favorite_ttl_secs: 180,
      rating_ttl_secs: 300,
      saved_ttl_secs: 300,
      identity_ttl_secs: 120,
      event_capacity: 64,
    }
  }
}

impl CacheConfig {
  pub fn favorite_ttl(&self) -> Duration {
    Duration::from_secs(self.favorite_ttl_secs)
  }

  pub fn rating_ttl(&self) -> Duration {
    Duration::from_secs(self.rating_ttl_secs)
  }

  pub fn saved_ttl(&self) -> Duration {
    Duration::from_secs(self.saved_ttl_secs)
  }

  pub fn identity_ttl(&self) -> Duration {
    Duration::from_secs(self.identity_ttl_secs)
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./modstate.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/modstate/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self, StateError> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(StateError::Config(format!(
          "config file not found: {}",
          p.display()
        )));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(StateError::Config(
        "no configuration file found; create one at ~/.config/modstate/config.yaml".into(),
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("modstate.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("modstate").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self, StateError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
      StateError::Config(format!(
        "failed to read config file {}: {}",
        path.display(),
        e
      ))
    })?;

    let config: Config = serde_yaml::from_str(&contents).map_err(|e| {
      StateError::Config(format!(
        "failed to parse config file {}: {}",
        path.display(),
        e
      ))
    })?;

    Ok(config)
  }

  /// Get the portal API token from the MODSTATE_API_TOKEN environment variable.
  pub fn get_api_token() -> Result<String, StateError> {
    std::env::var("MODSTATE_API_TOKEN")
      .map_err(|_| StateError::Config("portal API token not found; set MODSTATE_API_TOKEN".into()))
  }
}
