//! Implementation of the `kiln info` command.

use std::path::Path;

use anyhow::{Context, Result};

use kiln_lib::config::Config;
use kiln_lib::consts::ENGINE_VERSION;
use kiln_lib::layout::EngineLayout;
use kiln_lib::platform::paths;

use crate::output::{OutputFormat, print_info, print_json, print_stat};

pub fn cmd_info(config: &Config, config_path: Option<&Path>, output: OutputFormat) -> Result<()> {
  let layout = EngineLayout::resolve(config).context("Failed to resolve the engine directory")?;
  let config_file = config_path.map(Path::to_path_buf).unwrap_or_else(paths::config_file);

  if output.is_json() {
    return print_json(&serde_json::json!({
      "version": ENGINE_VERSION,
      "config_file": config_file,
      "engine": layout,
      "toolchain_entry": config.toolchain.entry_path(),
      "container_runtime": config.container.runtime,
      "container_image": config.container.image,
      "emulator": config.emulator_path,
      "cache_root": config.cache_root(),
    }));
  }

  print_info(&format!("kiln v{}", ENGINE_VERSION));
  print_stat("Config", &config_file.display().to_string());
  print_stat("Engine", &layout.install_dir.display().to_string());
  if layout.source_checkout {
    print_stat("Engine sources", &layout.project_dir.display().to_string());
  }
  print_stat("Toolchain", &config.toolchain.entry_path().display().to_string());
  print_stat(
    "Container",
    &format!("{} ({})", config.container.runtime, config.container.image),
  );
  print_stat("Emulator", &config.emulator_path.display().to_string());
  print_stat("Build cache", &config.cache_root().display().to_string());
  Ok(())
}
