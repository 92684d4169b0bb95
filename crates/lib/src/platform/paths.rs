use crate::consts::APP_NAME;
use std::path::PathBuf;

/// Environment variable overriding the build cache root.
pub const CACHE_DIR_ENV: &str = "KILN_CACHE_DIR";

/// Environment variable pointing at an explicit config file.
pub const CONFIG_ENV: &str = "KILN_CONFIG";

fn env_path(var: &str) -> Option<PathBuf> {
  std::env::var_os(var).filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> PathBuf {
  env_path("USERPROFILE").unwrap_or_else(|| PathBuf::from("."))
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> PathBuf {
  env_path("HOME").unwrap_or_else(|| PathBuf::from("."))
}

/// Returns the directory for configuration files for the application
#[cfg(windows)]
pub fn config_dir() -> PathBuf {
  env_path("APPDATA").unwrap_or_else(home_dir).join(APP_NAME)
}

/// Returns the directory for configuration files for the application
#[cfg(not(windows))]
pub fn config_dir() -> PathBuf {
  env_path("XDG_CONFIG_HOME")
    .unwrap_or_else(|| home_dir().join(".config"))
    .join(APP_NAME)
}

/// Returns the directory for cache files for the application
#[cfg(windows)]
pub fn cache_dir() -> PathBuf {
  env_path("LOCALAPPDATA")
    .unwrap_or_else(home_dir)
    .join(APP_NAME)
    .join("Cache")
}

/// Returns the directory for cache files for the application
#[cfg(not(windows))]
pub fn cache_dir() -> PathBuf {
  env_path("XDG_CACHE_HOME")
    .unwrap_or_else(|| home_dir().join(".cache"))
    .join(APP_NAME)
}

/// Returns the directory for persistent data files for the application
#[cfg(windows)]
pub fn data_dir() -> PathBuf {
  env_path("LOCALAPPDATA").unwrap_or_else(home_dir).join(APP_NAME)
}

/// Returns the directory for persistent data files for the application
#[cfg(not(windows))]
pub fn data_dir() -> PathBuf {
  env_path("XDG_DATA_HOME")
    .unwrap_or_else(|| home_dir().join(".local/share"))
    .join(APP_NAME)
}

/// Root of the per-platform build caches.
///
/// `KILN_CACHE_DIR` wins over the platform cache directory.
pub fn build_cache_root() -> PathBuf {
  env_path(CACHE_DIR_ENV).unwrap_or_else(|| cache_dir().join("build_cache"))
}

/// Default location of the config file.
pub fn config_file() -> PathBuf {
  env_path(CONFIG_ENV).unwrap_or_else(|| config_dir().join("config.json"))
}
