//! Implementation of the `kiln check` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::Serialize;

use kiln_lib::availability;
use kiln_lib::config::Config;
use kiln_lib::container::ContainerState;
use kiln_lib::layout::EngineLayout;
use kiln_lib::platform::{Platform, PlatformSettings};
use kiln_lib::process::SystemRunner;
use kiln_lib::request::{BuildKind, BuildRequest};
use kiln_lib::Orchestrator;

use crate::output::{OutputFormat, print_error, print_json, print_stat, print_success};

#[derive(Serialize)]
struct CheckReport {
  platform: Platform,
  kind: BuildKind,
  available: bool,
  missing: Vec<&'static str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  container: Option<ContainerState>,
}

pub fn cmd_check(platform: Platform, kind: BuildKind, config: Config, output: OutputFormat) -> Result<()> {
  let layout = EngineLayout::resolve(&config).context("Failed to resolve the engine directory")?;
  let request = BuildRequest::new(
    kind,
    PlatformSettings::for_platform(platform),
    PathBuf::from("assets"),
    PathBuf::from(".build"),
    PathBuf::from("export"),
    "game",
  );
  let result = availability::check(&request, &config, &layout);

  let container = if platform.is_containerized() {
    let orch = Orchestrator::new(Arc::new(SystemRunner), config, layout);
    let rt = super::runtime()?;
    Some(rt.block_on(orch.containers().check_state()))
  } else {
    None
  };

  let report = CheckReport {
    platform,
    kind,
    available: result.is_available(),
    missing: result.diagnostics(),
    container,
  };

  if output.is_json() {
    print_json(&report)?;
  } else {
    if report.available {
      print_success(&format!("Ready to build {} ({})", platform, kind));
    }
    for message in &report.missing {
      print_error(message);
    }
    if let Some(state) = &report.container {
      print_stat("Container runtime", &state.to_string());
    }
  }

  if !report.available {
    bail!("{} build prerequisites are missing", platform);
  }
  Ok(())
}
