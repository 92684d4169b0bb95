//! Orchestrator configuration.
//!
//! Everything here is owned by the user's settings and read-only to the
//! build pipeline. The file is JSON; unknown keys are rejected so typos
//! surface instead of silently falling back to defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{fs, io};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::platform::paths;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("invalid config {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
  /// Engine install directory. Defaults to the current directory.
  pub engine_dir: Option<PathBuf>,

  pub toolchain: ToolchainConfig,

  pub container: ContainerConfig,

  /// Emulator launched by run builds for handheld targets.
  pub emulator_path: PathBuf,

  /// Override for the build cache root.
  pub cache_dir: Option<PathBuf>,

  /// External asset cook command (program followed by its arguments).
  pub cook_command: Vec<String>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      engine_dir: None,
      toolchain: ToolchainConfig::default(),
      container: ContainerConfig::default(),
      emulator_path: PathBuf::from("PPSSPPWindows64.exe"),
      cache_dir: None,
      cook_command: Vec::new(),
    }
  }
}

impl Config {
  /// Load from an explicit file; it must exist.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Load from the default location, falling back to defaults when no file exists.
  pub fn load_default() -> Result<Self, ConfigError> {
    let path = paths::config_file();
    if !path.exists() {
      debug!(path = %path.display(), "no config file, using defaults");
      return Ok(Self::default());
    }
    Self::load(&path)
  }

  /// Root of the per-platform build caches.
  pub fn cache_root(&self) -> PathBuf {
    self.cache_dir.clone().unwrap_or_else(paths::build_cache_root)
  }
}

/// Local (host) toolchain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolchainConfig {
  /// Directory containing the toolchain's environment entry script.
  pub install_dir: PathBuf,
}

impl Default for ToolchainConfig {
  fn default() -> Self {
    Self {
      install_dir: PathBuf::from(
        "C:/Program Files/Microsoft Visual Studio/2022/Community/VC/Auxiliary/Build",
      ),
    }
  }
}

impl ToolchainConfig {
  /// Entry script setting up the toolchain environment for the host pointer width.
  pub fn entry_file(&self) -> &'static str {
    if cfg!(target_pointer_width = "64") {
      "vcvars64.bat"
    } else {
      "vcvars32.bat"
    }
  }

  pub fn entry_path(&self) -> PathBuf {
    self.install_dir.join(self.entry_file())
  }
}

/// Container runtime used for the cross-compiled platforms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContainerConfig {
  /// Runtime CLI program.
  pub runtime: String,

  /// Desktop application started when the runtime daemon is not answering.
  pub desktop_app: PathBuf,

  /// Tag of the build image.
  pub image: String,

  /// Build context of the image. Defaults to the engine install directory.
  pub image_context: Option<PathBuf>,

  /// Number of state polls after starting the desktop app.
  pub start_poll_attempts: u32,

  pub start_poll_interval_ms: u64,

  /// Extra wait once the daemon answers, before issuing build commands.
  pub start_grace_ms: u64,
}

impl Default for ContainerConfig {
  fn default() -> Self {
    Self {
      runtime: "docker".to_string(),
      desktop_app: PathBuf::from("C:/Program Files/Docker/Docker/Docker Desktop.exe"),
      image: "kiln_toolchain_1_0_0".to_string(),
      image_context: None,
      start_poll_attempts: 10,
      start_poll_interval_ms: 3000,
      start_grace_ms: 5000,
    }
  }
}

impl ContainerConfig {
  pub fn start_poll_interval(&self) -> Duration {
    Duration::from_millis(self.start_poll_interval_ms)
  }

  pub fn start_grace(&self) -> Duration {
    Duration::from_millis(self.start_grace_ms)
  }
}
