//! Implementation of the `kiln container` commands.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Subcommand;

use kiln_lib::config::Config;
use kiln_lib::container::ContainerState;
use kiln_lib::layout::EngineLayout;
use kiln_lib::process::SystemRunner;
use kiln_lib::Orchestrator;

use crate::output::{OutputFormat, print_error, print_info, print_json, print_stat, print_success};

#[derive(Debug, Subcommand)]
pub enum ContainerCommand {
  /// Probe the container runtime and the build image
  Status,

  /// Build the build image
  BuildImage {
    /// Image build context (default: configured context, else the engine directory)
    #[arg(long)]
    context: Option<PathBuf>,
  },
}

pub fn cmd_container(command: ContainerCommand, config: Config, output: OutputFormat) -> Result<()> {
  let layout = EngineLayout::resolve(&config).context("Failed to resolve the engine directory")?;
  let orch = Orchestrator::new(Arc::new(SystemRunner), config, layout);
  let containers = orch.containers();
  let rt = super::runtime()?;

  match command {
    ContainerCommand::Status => {
      let state = rt.block_on(containers.check_state());
      if output.is_json() {
        print_json(&serde_json::json!({
          "state": state,
          "image": containers.commands().image(),
        }))?;
      } else {
        match state {
          ContainerState::Running => print_success("Container runtime is ready"),
          other => print_info(&format!("Container runtime: {}", other)),
        }
        print_stat("Image", containers.commands().image());
      }
    }
    ContainerCommand::BuildImage { context } => {
      let ctx = orch.new_context();
      let context = context.unwrap_or_else(|| containers.image_context(&ctx));
      let built = rt.block_on(containers.build_image(&context));
      if output.is_json() {
        print_json(&serde_json::json!({
          "image": containers.commands().image(),
          "context": context,
          "built": built,
        }))?;
      } else if built {
        print_success(&format!("Built image {}", containers.commands().image()));
      } else {
        print_error(&format!("Failed to build image {}", containers.commands().image()));
      }
      if !built {
        bail!("image build failed");
      }
    }
  }
  Ok(())
}
