//! Implementation of the `kiln plugin` command.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Result, bail};

use kiln_lib::config::Config;
use kiln_lib::outcome::outcome_message;
use kiln_lib::platform::{CommonSettings, PlatformSettings, WindowsSettings};
use kiln_lib::process::SystemRunner;

use super::build::orchestrator;
use crate::output::{OutputFormat, print_error, print_json, print_success};

pub fn cmd_plugin(dir: &Path, debug: bool, config: Config, output: OutputFormat) -> Result<()> {
  if !dir.is_dir() {
    bail!("Plugin folder not found: {}", dir.display());
  }

  let settings = PlatformSettings::Windows(WindowsSettings {
    common: CommonSettings {
      debug,
      ..CommonSettings::default()
    },
    icon: None,
  });

  let orch = orchestrator(Arc::new(SystemRunner), config, Path::new("."))?;
  let ctx = orch.new_context();
  let rt = super::runtime()?;
  let outcome = rt.block_on(orch.compile_plugin(&ctx, dir, settings));
  let message = outcome_message(&outcome);

  if output.is_json() {
    print_json(&serde_json::json!({
      "plugin": dir,
      "success": outcome.is_ok(),
      "error": outcome.err(),
      "message": message,
    }))?;
  } else if outcome.is_ok() {
    print_success(&message);
  } else {
    print_error(&message);
  }

  outcome.map_err(Into::into)
}
