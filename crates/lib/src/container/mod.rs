//! Cross-compilation inside a named build container.
//!
//! The runtime is driven through its CLI. A build goes through these steps,
//! stopping at the first failure:
//!
//! 1. probe the runtime state, starting the runtime or building the image if needed
//! 2. recreate the platform's build container with an entry script
//! 3. inject engine sources, build descriptor, cache, game sources and assets
//! 4. start the container attached and wait for the entry script
//! 5. copy the artifacts (and the refreshed build cache) back out
//!
//! Cancellation is honored between injection and execution, and once more
//! after execution.

pub mod commands;

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{CACHE_BUILD_DIR, CacheManager};
use crate::collab::BuildHost;
use crate::config::Config;
use crate::consts::{
  ASSETS_DIR, COOKED_ASSETS_DIR, COOKED_DATA_FILE, COOKED_DB_FILE, ENGINE_ASSETS_DIR, ENTRY_FILE, GAME_SOURCE_DIR,
  PROJECT_SETTINGS_FILE, PUBLIC_ENGINE_ASSETS_DIR, SHADERS_TO_COMPILE_DIR,
};
use crate::context::{BuildContext, StrategyKind};
use crate::copy::copy_game_source;
use crate::outcome::BuildError;
use crate::platform::{Platform, PlatformSettings};
use crate::process::{CommandSpec, ProcessRunner, job_count};
use crate::request::BuildRequest;
use crate::telemetry::Phase;

pub use commands::{RuntimeCommands, container_name};
use commands::{artifacts, build_descriptor, entry_script, workspace_path};

/// Shader build script shipped with the engine.
pub const SHADER_SCRIPT: &str = "compile_shaders.sh";

/// Staging folder under the temp dir receiving the container's build tree.
const CACHE_STAGING_DIR: &str = "container_cache";

/// Default images of the PSP packager.
const PSP_IMAGES_DIR: &str = "psp_images";

/// Default LiveArea images of the PsVita packager.
const PSVITA_IMAGES_DIR: &str = "psvita_images";

/// State of the container runtime, probed in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContainerState {
  NotInstalled,
  NotRunning,
  ImageMissing,
  Running,
}

impl fmt::Display for ContainerState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let text = match self {
      Self::NotInstalled => "not installed",
      Self::NotRunning => "not running",
      Self::ImageMissing => "image missing",
      Self::Running => "running",
    };
    f.write_str(text)
  }
}

fn checkpoint(ctx: &BuildContext) -> Result<(), BuildError> {
  if ctx.is_cancelled() {
    info!("build cancelled");
    return Err(BuildError::Cancelled);
  }
  Ok(())
}

/// Write `src` to `dst` with CRLF line endings turned into LF.
pub fn normalize_shader_script(src: &Path, dst: &Path) -> io::Result<()> {
  let script = fs::read_to_string(src)?;
  if let Some(parent) = dst.parent() {
    fs::create_dir_all(parent)?;
  }
  fs::write(dst, script.replace('\r', ""))
}

/// Drives the container runtime for one build (or one standalone query).
pub struct ContainerOrchestrator<'a, R> {
  runner: &'a R,
  config: &'a Config,
  host: &'a dyn BuildHost,
  cache: CacheManager,
  cli: RuntimeCommands,
}

impl<'a, R: ProcessRunner> ContainerOrchestrator<'a, R> {
  pub fn new(runner: &'a R, config: &'a Config, host: &'a dyn BuildHost) -> Self {
    Self {
      runner,
      config,
      host,
      cache: CacheManager::new(config.cache_root()),
      cli: RuntimeCommands::new(&config.container),
    }
  }

  pub fn commands(&self) -> &RuntimeCommands {
    &self.cli
  }

  async fn succeeds(&self, cmd: &CommandSpec) -> bool {
    match self.runner.run(cmd).await {
      Ok(code) => code == 0,
      Err(e) => {
        debug!(program = %cmd.program, error = %e, "failed to start");
        false
      }
    }
  }

  /// Probe the runtime. Later probes only run once earlier ones pass.
  pub async fn check_state(&self) -> ContainerState {
    if !self.succeeds(&self.cli.probe_installed()).await {
      return ContainerState::NotInstalled;
    }
    if !self.succeeds(&self.cli.probe_running()).await {
      return ContainerState::NotRunning;
    }
    self.succeeds(&self.cli.wake_image_store()).await;
    if !self.succeeds(&self.cli.probe_image()).await {
      return ContainerState::ImageMissing;
    }
    ContainerState::Running
  }

  /// Make sure the runtime answers, starting its desktop application if needed.
  pub async fn ensure_running(&self, state: ContainerState) -> Result<ContainerState, BuildError> {
    match state {
      ContainerState::NotInstalled => {
        self.host.open_container_settings();
        Err(BuildError::ContainerRuntimeNotFound)
      }
      ContainerState::NotRunning => self.start_runtime().await,
      ContainerState::ImageMissing | ContainerState::Running => Ok(state),
    }
  }

  async fn start_runtime(&self) -> Result<ContainerState, BuildError> {
    let container = &self.config.container;
    let launch = CommandSpec::new(container.desktop_app.to_string_lossy());
    if let Err(e) = self.runner.spawn_detached(&launch) {
      warn!(app = %container.desktop_app.display(), error = %e, "failed to start the container runtime");
      return Err(BuildError::ContainerRuntimeCouldNotStart);
    }

    info!("waiting for the container runtime to start");
    let mut state = ContainerState::NotRunning;
    for attempt in 1..=container.start_poll_attempts {
      tokio::time::sleep(container.start_poll_interval()).await;
      state = self.check_state().await;
      debug!(attempt, %state, "polled container runtime");
      if state != ContainerState::NotRunning {
        break;
      }
    }

    match state {
      ContainerState::NotRunning => Err(BuildError::ContainerRuntimeNotRunning),
      ContainerState::NotInstalled => Err(BuildError::ContainerRuntimeNotFound),
      ContainerState::ImageMissing | ContainerState::Running => {
        tokio::time::sleep(container.start_grace()).await;
        Ok(state)
      }
    }
  }

  /// Build the image if it is missing.
  pub async fn ensure_image(&self, state: ContainerState, context: &Path) -> Result<(), BuildError> {
    if state != ContainerState::ImageMissing {
      return Ok(());
    }
    warn!("the build image is missing, creating it (this may take a few minutes)");
    if self.build_image(context).await {
      Ok(())
    } else {
      Err(BuildError::ContainerImageMissing)
    }
  }

  /// Build the image from `context`.
  pub async fn build_image(&self, context: &Path) -> bool {
    info!(image = %self.cli.image(), context = %context.display(), "building image");
    self.succeeds(&self.cli.build_image(context)).await
  }

  /// Image build context: the configured one, else the engine install dir.
  pub fn image_context(&self, ctx: &BuildContext) -> PathBuf {
    self
      .config
      .container
      .image_context
      .clone()
      .unwrap_or_else(|| ctx.layout().install_dir.clone())
  }

  /// Immediate stop of a platform's build container.
  pub fn kill_command(&self, platform: Platform) -> CommandSpec {
    self.cli.kill(&container_name(platform))
  }

  /// Run a whole containerized build.
  pub async fn compile(
    &self,
    ctx: &BuildContext,
    request: &BuildRequest,
    settings: &PlatformSettings,
    game_name: &str,
  ) -> Result<(), BuildError> {
    ctx.set_strategy(StrategyKind::Containerized);
    let prepare = Instant::now();

    let state = self.check_state().await;
    let state = self.ensure_running(state).await?;
    self.ensure_image(state, &self.image_context(ctx)).await?;

    let container = container_name(settings.platform());
    self.provision(&container, request, settings, game_name).await?;
    self.inject(ctx, &container, request, settings).await?;
    checkpoint(ctx)?;
    self.inject_platform_assets(ctx, &container, request, settings).await;
    checkpoint(ctx)?;
    ctx.record(Phase::ContainerPrepare, prepare.elapsed());

    self.execute(ctx, &container, request).await?;
    self.extract(&container, request, settings.platform(), game_name).await
  }

  /// Remove any previous container and create a fresh one.
  async fn provision(
    &self,
    container: &str,
    request: &BuildRequest,
    settings: &PlatformSettings,
    game_name: &str,
  ) -> Result<(), BuildError> {
    self.succeeds(&self.cli.stop(container)).await;
    self.succeeds(&self.cli.remove(container)).await;

    let script = entry_script(settings, request.kind, game_name, job_count()).ok_or(BuildError::InvalidRequest)?;
    debug!(container, script = %script, "creating build container");
    if self.succeeds(&self.cli.create(container, &script)).await {
      Ok(())
    } else {
      warn!(container, "failed to create the build container");
      Err(BuildError::ContainerCompile)
    }
  }

  /// Best-effort copy into the container.
  async fn copy_in(&self, src: &Path, container: &str, dst: &str) {
    if !self.succeeds(&self.cli.copy_in(src, container, dst)).await {
      warn!(src = %src.display(), dst, "failed to copy into the build container");
    }
  }

  async fn copy_out(&self, container: &str, src: &str, dst: &Path) -> bool {
    let ok = self.succeeds(&self.cli.copy_out(container, src, dst)).await;
    if !ok {
      warn!(src, dst = %dst.display(), "failed to copy out of the build container");
    }
    ok
  }

  async fn inject(
    &self,
    ctx: &BuildContext,
    container: &str,
    request: &BuildRequest,
    settings: &PlatformSettings,
  ) -> Result<(), BuildError> {
    let layout = ctx.layout();
    let temp = &request.temp_path;
    let root = workspace_path("");

    if request.kind.is_shaders_only() {
      let script = temp.join(SHADER_SCRIPT);
      normalize_shader_script(&layout.install_dir.join(SHADER_SCRIPT), &script).map_err(|e| {
        warn!(error = %e, "failed to prepare the shader script");
        BuildError::FileCopy
      })?;
      self.copy_in(&script, container, &workspace_path(SHADER_SCRIPT)).await;
      return Ok(());
    }

    let platform = settings.platform();
    self.copy_in(&layout.source_dir(), container, &root).await;
    self.copy_in(&layout.include_dir(), container, &root).await;
    self
      .copy_in(&layout.install_dir.join(ENTRY_FILE), container, &workspace_path("Source/"))
      .await;
    let (descriptor, destination) = build_descriptor(platform);
    self.copy_in(&layout.install_dir.join(descriptor), container, &destination).await;

    if request.uses_build_cache() && self.cache.exists(platform) {
      debug!(platform = %platform, "reusing build cache");
      self.copy_in(&self.cache.build_dir(platform), container, &root).await;
    }

    let source = temp.join(GAME_SOURCE_DIR);
    copy_game_source(&request.source_path, &source).map_err(|e| {
      warn!(src = %request.source_path.display(), error = %e, "failed to copy game source");
      BuildError::GameSourceCopy
    })?;
    self
      .copy_in(&source.join("."), container, &workspace_path("Source/game_code/"))
      .await;
    Ok(())
  }

  /// Icons, splash images and cooked data some packagers embed.
  async fn inject_platform_assets(
    &self,
    ctx: &BuildContext,
    container: &str,
    request: &BuildRequest,
    settings: &PlatformSettings,
  ) {
    let install = &ctx.layout().install_dir;
    let temp = &request.temp_path;
    let cooked = temp.join(COOKED_ASSETS_DIR);
    let shaders_only = request.kind.is_shaders_only();

    match settings {
      PlatformSettings::Psp(_) if !shaders_only => {
        self
          .copy_in(&install.join(PSP_IMAGES_DIR), container, &workspace_path("build/"))
          .await;
        for (image, name) in settings.custom_images() {
          let dst = workspace_path(&format!("build/{PSP_IMAGES_DIR}/{name}"));
          self.copy_in(image, container, &dst).await;
        }
      }
      PlatformSettings::PsVita(_) if !shaders_only => {
        let root = workspace_path("");
        for dir in [PSVITA_IMAGES_DIR, ENGINE_ASSETS_DIR, PUBLIC_ENGINE_ASSETS_DIR] {
          self.copy_in(&install.join(dir), container, &root).await;
        }
        self
          .copy_in(
            &temp.join(PROJECT_SETTINGS_FILE),
            container,
            &workspace_path(PROJECT_SETTINGS_FILE),
          )
          .await;
        for file in [COOKED_DB_FILE, COOKED_DATA_FILE] {
          self.copy_in(&cooked.join(file), container, &workspace_path(file)).await;
        }
        self.copy_in(&cooked.join(ASSETS_DIR), container, &root).await;
        for (image, name) in settings.custom_images() {
          let dst = workspace_path(&format!("{PSVITA_IMAGES_DIR}/{name}"));
          self.copy_in(image, container, &dst).await;
        }
      }
      PlatformSettings::Ps3(_) => {
        let shaders = cooked.join(SHADERS_TO_COMPILE_DIR);
        if shaders.is_dir() {
          self.copy_in(&shaders, container, &workspace_path("")).await;
        }
      }
      _ => {}
    }
  }

  async fn execute(&self, ctx: &BuildContext, container: &str, request: &BuildRequest) -> Result<(), BuildError> {
    let shaders_only = request.kind.is_shaders_only();
    info!(container, shaders_only, "starting build container");

    let started = Instant::now();
    let result = self.runner.run(&self.cli.start_attached(container)).await;
    let phase = if shaders_only {
      Phase::ShaderCompile
    } else {
      Phase::ContainerCompile
    };
    ctx.record(phase, started.elapsed());

    checkpoint(ctx)?;

    match result {
      Ok(0) => Ok(()),
      other => {
        warn!(result = ?other, "container build failed");
        Err(if shaders_only {
          BuildError::ContainerShaderCompile
        } else {
          BuildError::ContainerCompile
        })
      }
    }
  }

  async fn extract(
    &self,
    container: &str,
    request: &BuildRequest,
    platform: Platform,
    game_name: &str,
  ) -> Result<(), BuildError> {
    let temp = &request.temp_path;

    if request.kind.is_shaders_only() {
      let src = workspace_path(&format!("{SHADERS_TO_COMPILE_DIR}/"));
      self.copy_out(container, &src, &temp.join(COOKED_ASSETS_DIR)).await;
      return Ok(());
    }

    if request.uses_build_cache() {
      self.refresh_cache(container, temp, platform).await;
    }

    let artifacts = artifacts(platform, game_name).ok_or(BuildError::InvalidRequest)?;
    if let Err(e) = fs::create_dir_all(&request.export_path) {
      warn!(path = %request.export_path.display(), error = %e, "failed to create export folder");
    }
    if let Some(secondary) = &artifacts.secondary {
      self
        .copy_out(
          container,
          &workspace_path(&secondary.source),
          &request.export_path.join(&secondary.file_name),
        )
        .await;
    }

    let primary = &artifacts.primary;
    let exported = request.export_path.join(&primary.file_name);
    if self
      .copy_out(container, &workspace_path(&primary.source), &exported)
      .await
    {
      info!(artifact = %exported.display(), "artifact exported");
      Ok(())
    } else {
      Err(BuildError::ContainerCompile)
    }
  }

  async fn refresh_cache(&self, container: &str, temp: &Path, platform: Platform) {
    let staging = temp.join(CACHE_STAGING_DIR);
    if let Err(e) = fs::create_dir_all(&staging) {
      warn!(path = %staging.display(), error = %e, "failed to create cache staging folder");
      return;
    }
    let src = workspace_path(&format!("{CACHE_BUILD_DIR}/"));
    if !self.copy_out(container, &src, &staging).await {
      return;
    }
    if let Err(e) = self.cache.update(&staging, platform) {
      warn!(platform = %platform, error = %e, "failed to update build cache");
    }
  }
}
