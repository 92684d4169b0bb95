mod build;
mod cache;
mod check;
mod container;
mod info;
mod plugin;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use kiln_lib::config::Config;

pub use build::{BuildArgs, cmd_build};
pub use cache::{CacheCommand, cmd_cache};
pub use check::cmd_check;
pub use container::{ContainerCommand, cmd_container};
pub use info::cmd_info;
pub use plugin::cmd_plugin;

/// Load the config from an explicit file, else from the default location.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
  let config = match path {
    Some(path) => Config::load(path)?,
    None => Config::load_default()?,
  };
  debug!(?config, "loaded config");
  Ok(config)
}

pub fn runtime() -> Result<tokio::runtime::Runtime> {
  tokio::runtime::Runtime::new().context("Failed to create async runtime")
}
