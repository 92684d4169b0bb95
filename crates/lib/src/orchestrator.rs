//! Top-level build pipeline.
//!
//! [`Orchestrator::compile`] runs one pass over a [`BuildRequest`]: path
//! resolution, availability, settings stamp, asset cook, export cleanup and
//! dispatch to the platform's strategy. [`Orchestrator::build`] sequences the
//! passes of a whole game build and [`Orchestrator::spawn`] runs it on a
//! background task behind a cancellable [`BuildHandle`].

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::availability;
use crate::build_lock::BuildLock;
use crate::collab::{AssetCooker, BuildHost, CookOptions, HeadlessHost, JsonSettingsStore, NoopCooker, SettingsStore};
use crate::config::Config;
use crate::consts::{COOKED_ASSETS_DIR, ENGINE_VERSION};
use crate::container::ContainerOrchestrator;
use crate::context::BuildContext;
use crate::events::EventBus;
use crate::export;
use crate::layout::{self, EngineLayout, make_absolute, normalize};
use crate::outcome::{BuildError, BuildOutcome, outcome_message};
use crate::platform::{Platform, PlatformSettings};
use crate::process::{CommandSpec, ProcessRunner};
use crate::request::{BuildKind, BuildRequest, GameBuild};
use crate::telemetry::Phase;
use crate::toolchain::LocalToolchainStrategy;

/// Folder receiving compiled plugins, under the engine install dir.
pub const PLUGINS_DIR: &str = "plugins";

/// Prefix of plugin artifact names.
pub const PLUGIN_PREFIX: &str = "plugin_";

/// Packaged PSP executable launched in the emulator.
const PSP_PACKAGE: &str = "EBOOT.PBP";

/// Builds requests with a process runner and the host's collaborators.
pub struct Orchestrator<R> {
  runner: Arc<R>,
  config: Config,
  layout: EngineLayout,
  cooker: Arc<dyn AssetCooker>,
  settings: Arc<dyn SettingsStore>,
  host: Arc<dyn BuildHost>,
  events: EventBus,
}

impl<R: ProcessRunner> Orchestrator<R> {
  pub fn new(runner: Arc<R>, config: Config, layout: EngineLayout) -> Self {
    Self {
      runner,
      config,
      layout,
      cooker: Arc::new(NoopCooker),
      settings: Arc::new(JsonSettingsStore::default()),
      host: Arc::new(HeadlessHost),
      events: EventBus::new(),
    }
  }

  pub fn with_cooker(mut self, cooker: Arc<dyn AssetCooker>) -> Self {
    self.cooker = cooker;
    self
  }

  pub fn with_settings(mut self, settings: Arc<dyn SettingsStore>) -> Self {
    self.settings = settings;
    self
  }

  pub fn with_host(mut self, host: Arc<dyn BuildHost>) -> Self {
    self.host = host;
    self
  }

  pub fn runner(&self) -> &Arc<R> {
    &self.runner
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn layout(&self) -> &EngineLayout {
    &self.layout
  }

  pub fn events(&self) -> &EventBus {
    &self.events
  }

  pub fn settings(&self) -> &Arc<dyn SettingsStore> {
    &self.settings
  }

  /// Fresh context for one build.
  pub fn new_context(&self) -> BuildContext {
    BuildContext::new(self.layout.clone())
  }

  /// Container orchestration with this orchestrator's runner and host.
  pub fn containers(&self) -> ContainerOrchestrator<'_, R> {
    ContainerOrchestrator::new(self.runner.as_ref(), &self.config, self.host.as_ref())
  }

  /// Run a single pass over `request`.
  ///
  /// The request's paths are made absolute in place. A "build ended" event
  /// is published whatever the outcome.
  pub async fn compile(&self, ctx: &BuildContext, request: &mut BuildRequest) -> BuildOutcome {
    ctx.reset_cancel();
    let Some(platform) = request.platform() else {
      return self.reject(request, BuildError::InvalidRequest);
    };
    let _lock = match self.acquire_lock(platform) {
      Ok(lock) => lock,
      Err(err) => return self.reject(request, err),
    };
    self.compile_pass(ctx, request, false).await
  }

  /// Run a whole game build: optional shader pass, package pass, export,
  /// then reveal or launch.
  ///
  /// Temp folders are removed on every exit path and the timing summary is
  /// logged whatever the outcome.
  pub async fn build(&self, ctx: &BuildContext, game: GameBuild) -> BuildOutcome {
    let started = Instant::now();
    ctx.reset();

    let mut request = game.request();
    let outcome = self.run_game_build(ctx, &game, &mut request).await;

    remove_temp_dir(&request.temp_path);
    remove_temp_dir(&game.shader_temp_dir());

    if outcome.is_ok() {
      self.after_build(&game, &request);
    }

    ctx.record(Phase::Total, started.elapsed());
    ctx.timings().log_summary();
    outcome
  }

  /// Hot-reload build of a plugin source folder into [`PLUGINS_DIR`].
  pub async fn compile_plugin(
    &self,
    ctx: &BuildContext,
    plugin_dir: &Path,
    settings: PlatformSettings,
  ) -> BuildOutcome {
    let Some(name) = plugin_dir.file_name().map(|n| n.to_string_lossy().into_owned()) else {
      error!(path = %plugin_dir.display(), "plugin folder has no name");
      return Err(BuildError::InvalidRequest);
    };

    let plugins = self.layout.install_dir.join(PLUGINS_DIR);
    let mut request = BuildRequest::new(
      BuildKind::HotReload,
      settings,
      plugin_dir,
      plugins.join(".build"),
      &plugins,
      format!("{PLUGIN_PREFIX}{name}"),
    );
    info!(plugin = %name, "compiling plugin");

    let outcome = self.compile(ctx, &mut request).await;
    remove_temp_dir(&request.temp_path);
    outcome
  }

  async fn run_game_build(&self, ctx: &BuildContext, game: &GameBuild, request: &mut BuildRequest) -> BuildOutcome {
    if exports_into_project(game)? {
      error!(path = %game.export_dir.display(), "the export folder is the project folder");
      return Err(BuildError::Unknown);
    }

    self.events.build_started(request);

    let _lock = match self.acquire_lock(game.settings.platform()) {
      Ok(lock) => lock,
      Err(err) => return self.reject(request, err),
    };

    if request.kind == BuildKind::ShadersThenPackage {
      let mut shaders = request.clone();
      shaders.kind = BuildKind::ShadersOnly;
      shaders.temp_path = game.shader_temp_dir();
      self.compile_pass(ctx, &mut shaders, true).await?;

      let shader_time = ctx.timings().get(Phase::ShaderCompile);
      ctx.reset_timings();
      if let Some(elapsed) = shader_time {
        ctx.record(Phase::ShaderCompile, elapsed);
      }
      request.kind = BuildKind::Package;

      if ctx.is_cancelled() {
        info!("build cancelled after the shader pass");
        self.events.build_ended(request, Err(BuildError::Cancelled));
        return Err(BuildError::Cancelled);
      }
    }

    self.compile_pass(ctx, request, false).await?;

    if !request.kind.is_hot_reload()
      && game.settings.platform() != Platform::PsVita
      && !export::export_project_files(&request.temp_path, &request.export_path)
    {
      warn!(export = %request.export_path.display(), "failed to export project files");
      return Err(BuildError::FileCopy);
    }
    Ok(())
  }

  fn after_build(&self, game: &GameBuild, request: &BuildRequest) {
    match request.kind {
      BuildKind::Package => self.host.reveal_folder(&request.export_path),
      BuildKind::PackageAndRun => {
        let Some(launch) = self.launch_command(game.settings.platform(), request) else {
          return;
        };
        info!(command = %launch.to_shell_line(), "launching game");
        if let Err(e) = self.runner.spawn_detached(&launch) {
          warn!(error = %e, "failed to launch the game");
        }
      }
      _ => {}
    }
  }

  /// Command starting a packaged game, when the platform runs on this host.
  pub fn launch_command(&self, platform: Platform, request: &BuildRequest) -> Option<CommandSpec> {
    let export = &request.export_path;
    match platform {
      Platform::Windows => {
        let exe = export.join(format!("{}.exe", self.game_name(request)));
        Some(CommandSpec::new(exe.to_string_lossy()).current_dir(export))
      }
      Platform::Psp => Some(
        CommandSpec::new(self.config.emulator_path.to_string_lossy()).path_arg(&export.join(PSP_PACKAGE)),
      ),
      Platform::PsVita | Platform::Ps3 => None,
    }
  }

  async fn compile_pass(&self, ctx: &BuildContext, request: &mut BuildRequest, intermediate: bool) -> BuildOutcome {
    if let Err(err) = validate(request) {
      return self.reject(request, err);
    }

    self.host.set_work_limiter(true);
    let outcome = self.run_pass(ctx, request).await;

    match &outcome {
      Ok(()) => info!(platform = ?request.platform(), kind = %request.kind, "{}", outcome_message(&outcome)),
      Err(err) if err.is_cancelled() => info!("{}", err),
      Err(err) => error!(platform = ?request.platform(), kind = %request.kind, "{}", err),
    }

    if !(intermediate && outcome.is_ok()) {
      self.events.build_ended(request, outcome);
    }
    self.host.set_work_limiter(false);
    outcome
  }

  async fn run_pass(&self, ctx: &BuildContext, request: &mut BuildRequest) -> BuildOutcome {
    remove_temp_dir(&request.temp_path);
    resolve_paths(request)?;

    let settings = request.settings.clone().ok_or(BuildError::InvalidRequest)?;
    let platform = settings.platform();

    let cooked = request.temp_path.join(COOKED_ASSETS_DIR);
    fs::create_dir_all(&cooked).map_err(|e| {
      warn!(path = %cooked.display(), error = %e, "failed to create temp folder");
      BuildError::FileCopy
    })?;

    self.stamp_settings(request, &settings)?;

    if !availability::check(request, &self.config, ctx.layout()).is_available() {
      return Err(BuildError::ToolchainUnavailable);
    }

    let cooked_ok = if request.kind.is_hot_reload() {
      true
    } else {
      let options = CookOptions {
        export_dir: cooked,
        platform,
        shaders_only: request.kind.is_shaders_only(),
      };
      self.cook(ctx, options).await
    };

    export::clean_export_dir(request);
    if !cooked_ok {
      return Err(BuildError::CookFailed);
    }

    let game_name = self.game_name(request);
    info!(%platform, kind = %request.kind, "compiling");
    match &settings {
      PlatformSettings::Windows(windows) => {
        LocalToolchainStrategy::new(self.runner.as_ref(), &self.config, ctx)
          .compile(request, windows, &game_name)
          .await
      }
      PlatformSettings::Psp(_) | PlatformSettings::PsVita(_) | PlatformSettings::Ps3(_) => {
        self.containers().compile(ctx, request, &settings, &game_name).await
      }
    }
  }

  /// Write a stamped copy of the project settings into the temp folder,
  /// leaving the live settings as they were.
  fn stamp_settings(&self, request: &BuildRequest, settings: &PlatformSettings) -> Result<(), BuildError> {
    let live = self.settings.current();
    let mut stamped = live.clone();
    stamped.compiled_engine_version = ENGINE_VERSION.to_string();
    stamped.compiled_for_debug = settings.common().debug;
    stamped.compiled_for_64_bits = cfg!(target_pointer_width = "64");

    self.settings.replace(stamped);
    let saved = self.settings.save(&request.temp_path);
    self.settings.replace(live);

    match saved {
      Ok(path) => {
        debug!(path = %path.display(), "stamped project settings");
        Ok(())
      }
      Err(e) => {
        warn!(error = %e, "failed to write project settings");
        Err(BuildError::FileCopy)
      }
    }
  }

  async fn cook(&self, ctx: &BuildContext, options: CookOptions) -> bool {
    let cooker = Arc::clone(&self.cooker);
    let started = Instant::now();
    info!(platform = %options.platform, shaders_only = options.shaders_only, "cooking assets");

    let ok = match tokio::task::spawn_blocking(move || cooker.cook(&options)).await {
      Ok(ok) => ok,
      Err(e) => {
        warn!(error = %e, "cook task failed");
        false
      }
    };
    ctx.record(Phase::Cook, started.elapsed());
    ok
  }

  /// Game name from the project settings, else the artifact name.
  fn game_name(&self, request: &BuildRequest) -> String {
    let name = self.settings.current().game_name;
    if name.trim().is_empty() {
      request.artifact_name.clone()
    } else {
      name
    }
  }

  fn acquire_lock(&self, platform: Platform) -> Result<Option<BuildLock>, BuildError> {
    match BuildLock::acquire(&self.config.cache_root(), platform) {
      Ok(lock) => {
        debug!(path = %lock.path().display(), "acquired build lock");
        Ok(Some(lock))
      }
      Err(e) if e.is_contention() => {
        error!("{}", e);
        Err(BuildError::BuildInProgress)
      }
      Err(e) => {
        warn!(error = %e, "building without a lock");
        Ok(None)
      }
    }
  }

  fn reject(&self, request: &BuildRequest, err: BuildError) -> BuildOutcome {
    error!(platform = ?request.platform(), kind = %request.kind, "{}", err);
    self.events.build_ended(request, Err(err));
    Err(err)
  }
}

impl<R: ProcessRunner> Orchestrator<R> {
  /// Run a game build on a background task.
  pub fn spawn(self: &Arc<Self>, game: GameBuild) -> BuildHandle<R> {
    let ctx = Arc::new(self.new_context());
    let platform = game.settings.platform();

    let this = Arc::clone(self);
    let task_ctx = Arc::clone(&ctx);
    let task = tokio::spawn(async move { this.build(&task_ctx, game).await });

    BuildHandle {
      kill: platform
        .is_containerized()
        .then(|| self.containers().kill_command(platform)),
      runner: Arc::clone(&self.runner),
      ctx,
      task,
    }
  }
}

/// A running build.
pub struct BuildHandle<R> {
  ctx: Arc<BuildContext>,
  runner: Arc<R>,
  kill: Option<CommandSpec>,
  task: JoinHandle<BuildOutcome>,
}

impl<R: ProcessRunner> BuildHandle<R> {
  pub fn context(&self) -> &Arc<BuildContext> {
    &self.ctx
  }

  pub fn is_finished(&self) -> bool {
    self.task.is_finished()
  }

  /// Cancel a containerized build: raise the flag, then stop its container
  /// without grace period.
  ///
  /// Returns `false` when the active strategy cannot be cancelled.
  pub async fn cancel(&self) -> bool {
    if !self.ctx.request_cancel() {
      return false;
    }
    if let Some(kill) = &self.kill {
      match self.runner.run(kill).await {
        Ok(0) => debug!("build container stopped"),
        Ok(code) => warn!(code, "stopping the build container failed"),
        Err(e) => warn!(error = %e, "failed to stop the build container"),
      }
    }
    true
  }

  /// Wait for the build to finish.
  pub async fn wait(mut self) -> BuildOutcome {
    self.join().await
  }

  /// Wait for the build to finish without giving up the handle, so the
  /// caller can still cancel while waiting. Must not be awaited again once
  /// it returned.
  pub async fn join(&mut self) -> BuildOutcome {
    match (&mut self.task).await {
      Ok(outcome) => outcome,
      Err(e) => {
        error!(error = %e, "build task failed");
        Err(BuildError::Unknown)
      }
    }
  }
}

/// Checks the preconditions of a pass.
fn validate(request: &BuildRequest) -> Result<(), BuildError> {
  let Some(settings) = &request.settings else {
    warn!("no target platform");
    return Err(BuildError::InvalidRequest);
  };
  let empty_path = [&request.temp_path, &request.source_path, &request.export_path]
    .iter()
    .any(|p| p.as_os_str().is_empty());
  if empty_path || request.artifact_name.trim().is_empty() {
    warn!(?request, "incomplete build request");
    return Err(BuildError::InvalidRequest);
  }
  settings.validate().map_err(|e| {
    warn!(error = %e, "invalid platform settings");
    BuildError::InvalidRequest
  })
}

fn resolve_paths(request: &mut BuildRequest) -> Result<(), BuildError> {
  let root = std::env::current_dir().map_err(|e| {
    warn!(error = %e, "failed to read the working directory");
    BuildError::Unknown
  })?;
  for path in [&mut request.temp_path, &mut request.source_path, &mut request.export_path] {
    *path = normalize(&make_absolute(path, &root));
  }
  Ok(())
}

fn exports_into_project(game: &GameBuild) -> Result<bool, BuildError> {
  let root = std::env::current_dir().map_err(|e| {
    warn!(error = %e, "failed to read the working directory");
    BuildError::Unknown
  })?;
  Ok(layout::same_dir(&game.export_dir, &game.project_dir, &root))
}

fn remove_temp_dir(path: &Path) {
  match fs::remove_dir_all(path) {
    Ok(()) => debug!(path = %path.display(), "removed temp folder"),
    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
    Err(e) => warn!(path = %path.display(), error = %e, "failed to remove temp folder"),
  }
}
