//! Configuration system for Hivebuild.
//!
//! Config priority: explicit path > user (~/.config/hivebuild/config.toml) > defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How cache keys treat path casing.
///
/// The dependency cache is keyed by absolute file path. Whether two paths that
/// differ only in case refer to the same file is a property of the host
/// filesystem, but we never infer it at runtime: the policy is explicit
/// configuration so that cache files can be moved between machines with
/// predictable results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaseSensitivity {
  /// Keys preserve the casing of the paths handed to the cache.
  #[default]
  Respect,
  /// Keys are folded to lowercase before lookup and storage.
  Fold,
}

/// Dependency cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Directory holding the on-disk dependency store
  pub data_dir: PathBuf,
  /// Maximum entries held in the in-memory tier
  pub memory_capacity: u64,
  /// Case handling for cache keys
  pub case_sensitivity: CaseSensitivity,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      data_dir: default_data_dir(),
      memory_capacity: 100_000,
      case_sensitivity: CaseSensitivity::default(),
    }
  }
}

/// Execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
  /// Number of local execution slots (0 = one per logical processor)
  pub local_cores: usize,
  /// Chunk size in bytes for blob streaming
  pub chunk_size: usize,
}

impl Default for ExecutionConfig {
  fn default() -> Self {
    Self {
      local_cores: 0,
      chunk_size: 128 * 1024,
    }
  }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  pub cache: CacheConfig,
  pub execution: ExecutionConfig,
}

impl Config {
  /// Load config from the user config file, falling back to defaults.
  ///
  /// A malformed config file logs a warning and yields defaults rather than
  /// failing the build.
  pub fn load() -> Self {
    let Some(path) = user_config_path() else {
      return Self::default();
    };
    Self::load_from(&path)
  }

  /// Load config from a specific path, falling back to defaults.
  pub fn load_from(path: &Path) -> Self {
    match std::fs::read_to_string(path) {
      Ok(contents) => match toml::from_str(&contents) {
        Ok(config) => config,
        Err(e) => {
          tracing::warn!("Failed to parse config at {:?}: {}", path, e);
          Self::default()
        }
      },
      Err(_) => Self::default(),
    }
  }

  /// Effective number of local execution slots.
  pub fn effective_local_cores(&self) -> usize {
    if self.execution.local_cores > 0 {
      self.execution.local_cores
    } else {
      std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    }
  }
}

/// Default data directory for the on-disk dependency store.
pub fn default_data_dir() -> PathBuf {
  dirs::data_dir()
    .unwrap_or_else(|| PathBuf::from("."))
    .join("hivebuild")
}

fn user_config_path() -> Option<PathBuf> {
  dirs::config_dir().map(|d| d.join("hivebuild").join("config.toml"))
}
