//! Implementation of the `kiln build` command.
//!
//! Builds a project for one platform with the real process runner, or with
//! `--dry-run`, records the external commands the build would issue. A dry
//! run writes its temp, export and cache folders into a scratch folder, so
//! the project's files are only read.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Args;
use serde::Serialize;
use tokio::runtime::Runtime;

use kiln_lib::collab::{AssetCooker, ExternalCooker, JsonSettingsStore, NoopCooker};
use kiln_lib::config::Config;
use kiln_lib::layout::{EngineLayout, make_absolute, normalize, same_dir};
use kiln_lib::outcome::outcome_message;
use kiln_lib::platform::{
  CommonSettings, Platform, PlatformSettings, Ps3Settings, PsVitaSettings, PspSettings, WindowsSettings,
};
use kiln_lib::process::{CommandSpec, ProcessRunner, RecordingRunner, SystemRunner};
use kiln_lib::telemetry::PhaseTimings;
use kiln_lib::{BuildError, BuildKind, BuildOutcome, GameBuild, Orchestrator};

use crate::output::{OutputFormat, print_error, print_info, print_json, print_stat, print_success, print_timings, print_warning};

#[derive(Debug, Args)]
pub struct BuildArgs {
  /// Project folder
  #[arg(default_value = ".")]
  pub project: PathBuf,

  /// Target platform (windows, psp, psvita, ps3)
  #[arg(short, long)]
  pub platform: Platform,

  /// Build kind
  #[arg(short, long, default_value = "package")]
  pub kind: BuildKind,

  /// Export folder
  #[arg(short, long)]
  pub export: PathBuf,

  /// Compile with debug information
  #[arg(long)]
  pub debug: bool,

  /// Compile the engine profiler in
  #[arg(long)]
  pub profiler: bool,

  /// Do not reuse or refresh the platform build cache
  #[arg(long)]
  pub no_cache: bool,

  /// PS Vita title id (nine characters, A-Z and 0-9)
  #[arg(long)]
  pub title_id: Option<String>,

  /// Custom icon (Windows .ico, or the handheld icon image)
  #[arg(long)]
  pub icon: Option<PathBuf>,

  /// Print the external commands of the build instead of running them
  #[arg(long)]
  pub dry_run: bool,
}

impl BuildArgs {
  pub fn settings(&self) -> PlatformSettings {
    let common = CommonSettings {
      debug: self.debug,
      profiler: self.profiler,
      use_build_cache: !self.no_cache,
    };
    match self.platform {
      Platform::Windows => PlatformSettings::Windows(WindowsSettings {
        common,
        icon: self.icon.clone(),
      }),
      Platform::Psp => PlatformSettings::Psp(PspSettings {
        common,
        icon_image: self.icon.clone(),
        ..PspSettings::default()
      }),
      Platform::PsVita => PlatformSettings::PsVita(PsVitaSettings {
        common,
        icon_image: self.icon.clone(),
        title_id: self.title_id.clone().unwrap_or_default(),
        ..PsVitaSettings::default()
      }),
      Platform::Ps3 => PlatformSettings::Ps3(Ps3Settings { common }),
    }
  }
}

#[derive(Serialize)]
struct BuildReport<'a> {
  platform: Platform,
  kind: BuildKind,
  success: bool,
  error: Option<BuildError>,
  message: String,
  timings: &'a PhaseTimings,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  commands: Vec<String>,
}

/// Orchestrator wired with the project's settings and the configured cooker.
pub fn orchestrator<R: ProcessRunner>(runner: Arc<R>, config: Config, project: &Path) -> Result<Orchestrator<R>> {
  let layout = EngineLayout::resolve(&config).context("Failed to resolve the engine directory")?;
  let settings = JsonSettingsStore::load(project)
    .with_context(|| format!("Failed to load project settings from {}", project.display()))?;
  let cooker: Arc<dyn AssetCooker> = match ExternalCooker::from_command(Arc::clone(&runner), &config.cook_command) {
    Some(cooker) => Arc::new(cooker),
    None => Arc::new(NoopCooker),
  };
  Ok(
    Orchestrator::new(runner, config, layout)
      .with_settings(Arc::new(settings))
      .with_cooker(cooker),
  )
}

pub fn cmd_build(args: BuildArgs, config: Config, output: OutputFormat) -> Result<()> {
  let rt = super::runtime()?;

  if args.dry_run {
    return dry_run(&args, config, &rt, output);
  }

  let game = GameBuild::new(&args.project, args.settings(), args.kind, &args.export);
  let orch = Arc::new(orchestrator(Arc::new(SystemRunner), config, &args.project)?);
  let (outcome, timings) = rt.block_on(async {
    let mut handle = orch.spawn(game);
    let outcome = loop {
      tokio::select! {
        outcome = handle.join() => break outcome,
        _ = tokio::signal::ctrl_c() => {
          if !handle.cancel().await {
            print_warning("This build cannot be cancelled, waiting for it to finish");
          }
        }
      }
    };
    (outcome, handle.context().timings())
  });

  report(&args, outcome, &timings, Vec::new(), output)?;
  match outcome {
    Err(err) if !err.is_cancelled() => Err(err.into()),
    _ => Ok(()),
  }
}

/// Record the build's commands against scratch folders, then print them
/// with the real folders in place of the scratch ones.
fn dry_run(args: &BuildArgs, mut config: Config, rt: &Runtime, output: OutputFormat) -> Result<()> {
  let cwd = std::env::current_dir().context("Failed to read the working directory")?;
  if same_dir(&args.export, &args.project, &cwd) {
    bail!("The export folder is the project folder");
  }
  let scratch = tempfile::Builder::new()
    .prefix("kiln-dry-run")
    .tempdir()
    .context("Failed to create the dry run folder")?;

  let scratch_export = scratch.path().join("export");
  let scratch_cache = scratch.path().join("cache");
  let moves = [
    (scratch_export.clone(), make_absolute(&args.export, &cwd)),
    (scratch_cache.clone(), config.cache_root()),
    (scratch.path().to_path_buf(), make_absolute(&args.project, &cwd)),
  ];
  config.cache_dir = Some(scratch_cache);

  let game = GameBuild::new(&args.project, args.settings(), args.kind, scratch_export).with_temp_root(scratch.path());
  let runner = Arc::new(RecordingRunner::new());
  let orch = orchestrator(Arc::clone(&runner), config, &args.project)?;
  let ctx = orch.new_context();
  let outcome = rt.block_on(orch.build(&ctx, game));

  let commands = runner
    .lines()
    .into_iter()
    .chain(runner.detached().iter().map(CommandSpec::to_shell_line))
    .map(|line| relocate(line, &moves))
    .collect();
  // The recorded commands never ran, so the outcome is informative only.
  report(args, outcome, &ctx.timings(), commands, output)
}

fn relocate(line: String, moves: &[(PathBuf, PathBuf)]) -> String {
  moves.iter().fold(line, |line, (from, to)| {
    line
      .replace(&*normalize(from).to_string_lossy(), &normalize(to).to_string_lossy())
      .replace(&*from.to_string_lossy(), &to.to_string_lossy())
  })
}

fn report(
  args: &BuildArgs,
  outcome: BuildOutcome,
  timings: &PhaseTimings,
  commands: Vec<String>,
  output: OutputFormat,
) -> Result<()> {
  let message = outcome_message(&outcome);

  if output.is_json() {
    return print_json(&BuildReport {
      platform: args.platform,
      kind: args.kind,
      success: outcome.is_ok(),
      error: outcome.err(),
      message,
      timings,
      commands,
    });
  }

  if !commands.is_empty() {
    print_info(&format!("{} command(s) recorded", commands.len()));
    for command in &commands {
      println!("  {}", command);
    }
    println!();
  }

  match outcome {
    Ok(()) => print_success(&message),
    Err(err) if err.is_cancelled() => print_info(&message),
    Err(_) => print_error(&message),
  }
  print_stat("Platform", args.platform.as_str());
  print_stat("Kind", args.kind.as_str());
  print_stat("Export", &args.export.display().to_string());
  print_timings(timings);
  Ok(())
}
