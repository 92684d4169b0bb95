use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kiln_lib::platform::Platform;
use kiln_lib::request::BuildKind;

mod cmd;
mod output;

use cmd::{BuildArgs, CacheCommand, ContainerCommand};
use output::OutputFormat;

/// kiln - build and package engine projects for every target platform
#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Config file (default: $KILN_CONFIG, then the user config directory)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t)]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build a project for a target platform
  Build(BuildArgs),

  /// Check what a build for a platform needs from this machine
  Check {
    /// Target platform (windows, psp, psvita, ps3)
    #[arg(short, long)]
    platform: Platform,

    /// Build kind
    #[arg(short, long, default_value = "package")]
    kind: BuildKind,
  },

  /// Compile a plugin for the editor
  Plugin {
    /// Plugin source folder
    dir: PathBuf,

    /// Compile with debug information
    #[arg(long)]
    debug: bool,
  },

  /// Inspect or prepare the container runtime
  Container {
    #[command(subcommand)]
    command: ContainerCommand,
  },

  /// Inspect or clear the per-platform build caches
  Cache {
    #[command(subcommand)]
    command: CacheCommand,
  },

  /// Show version, engine and configuration locations
  Info,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let filter = if cli.verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
  };
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let config = cmd::load_config(cli.config.as_deref())?;

  match cli.command {
    Commands::Build(args) => cmd::cmd_build(args, config, cli.output),
    Commands::Check { platform, kind } => cmd::cmd_check(platform, kind, config, cli.output),
    Commands::Plugin { dir, debug } => cmd::cmd_plugin(&dir, debug, config, cli.output),
    Commands::Container { command } => cmd::cmd_container(command, config, cli.output),
    Commands::Cache { command } => cmd::cmd_cache(command, config, cli.output),
    Commands::Info => cmd::cmd_info(&config, cli.config.as_deref(), cli.output),
  }
}
