//! Builds on the host with the local toolchain.

pub mod msvc;

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::Config;
use crate::consts::{
  DEFAULT_ICON, ENGINE_EDITOR_HEADER, ENGINE_EDITOR_LIB, ENGINE_HEADER, ENGINE_HEADERS_DIR, ENGINE_RUNTIME_LIB,
  ENTRY_FILE, GAME_SOURCE_DIR, RESOURCE_FILE, RUNTIME_DEPENDENCIES,
};
use crate::context::{BuildContext, StrategyKind};
use crate::copy::{CopyBatch, copy_game_source};
use crate::outcome::BuildError;
use crate::platform::WindowsSettings;
use crate::process::ProcessRunner;
use crate::request::BuildRequest;

use msvc::Script;

/// Compiles a game library (and executable) with the host toolchain.
pub struct LocalToolchainStrategy<'a, R> {
  runner: &'a R,
  config: &'a Config,
  ctx: &'a BuildContext,
}

impl<'a, R: ProcessRunner> LocalToolchainStrategy<'a, R> {
  pub fn new(runner: &'a R, config: &'a Config, ctx: &'a BuildContext) -> Self {
    Self { runner, config, ctx }
  }

  /// Run the whole local build. `exe_name` names the packaged executable.
  pub async fn compile(
    &self,
    request: &BuildRequest,
    settings: &WindowsSettings,
    exe_name: &str,
  ) -> Result<(), BuildError> {
    self.ctx.set_strategy(StrategyKind::LocalToolchain);
    let temp = &request.temp_path;

    self.copy_engine_files(request)?;
    self.copy_resources(temp, settings)?;

    let folders = copy_game_source(&request.source_path, &temp.join(GAME_SOURCE_DIR)).map_err(|e| {
      warn!(src = %request.source_path.display(), error = %e, "failed to copy game source");
      BuildError::GameSourceCopy
    })?;

    let script = self.script(request, settings, &folders, exe_name);
    info!(steps = script.steps().len(), "compiling with the local toolchain");
    match self.runner.run(&script.into_command()).await {
      Ok(0) => {}
      Ok(code) => {
        warn!(code, "local toolchain failed");
        return Err(BuildError::Unknown);
      }
      Err(e) => {
        warn!(error = %e, "failed to start the local toolchain");
        return Err(BuildError::Unknown);
      }
    }

    self.copy_artifacts(request, exe_name)
  }

  fn copy_engine_files(&self, request: &BuildRequest) -> Result<(), BuildError> {
    let layout = self.ctx.layout();
    let install = &layout.install_dir;
    let temp = &request.temp_path;
    let mut batch = CopyBatch::new();

    if request.kind.is_hot_reload() {
      let lib = format!("{ENGINE_EDITOR_LIB}.lib");
      batch
        .add_entry(false, install.join(&lib), temp.join(&lib))
        .add_entry(
          false,
          layout.source_dir().join(ENGINE_EDITOR_HEADER),
          temp.join(ENGINE_EDITOR_HEADER),
        );
    } else {
      let lib = format!("{ENGINE_RUNTIME_LIB}.lib");
      let dll = format!("{ENGINE_RUNTIME_LIB}.dll");
      batch
        .add_entry(false, install.join(&lib), temp.join(&lib))
        .add_entry(false, install.join(&dll), request.export_path.join(&dll));
      for dependency in RUNTIME_DEPENDENCIES {
        batch.add_entry(false, install.join(dependency), request.export_path.join(dependency));
      }
    }

    batch
      .add_entry(
        true,
        layout.source_dir().join(ENGINE_HEADERS_DIR),
        temp.join(ENGINE_HEADERS_DIR),
      )
      .add_entry(false, layout.source_dir().join(ENGINE_HEADER), temp.join(ENGINE_HEADER))
      .add_entry(false, install.join(ENTRY_FILE), temp.join(ENTRY_FILE));

    if batch.execute_all() {
      Ok(())
    } else {
      Err(BuildError::FileCopy)
    }
  }

  fn copy_resources(&self, temp: &Path, settings: &WindowsSettings) -> Result<(), BuildError> {
    let install = &self.ctx.layout().install_dir;
    let icon = settings.icon.clone().unwrap_or_else(|| install.join(DEFAULT_ICON));

    let mut batch = CopyBatch::new();
    batch
      .add_entry(false, icon, temp.join(DEFAULT_ICON))
      .add_entry(false, install.join(RESOURCE_FILE), temp.join(RESOURCE_FILE));
    if batch.execute_all() {
      Ok(())
    } else {
      Err(BuildError::FileCopy)
    }
  }

  fn script(&self, request: &BuildRequest, settings: &WindowsSettings, folders: &[PathBuf], exe_name: &str) -> Script {
    let layout = self.ctx.layout();
    let includes = [layout.include_dir(), layout.source_dir()];
    let debug = settings.common.debug;

    let mut script = Script::default();
    for step in msvc::environment(&self.config.toolchain) {
      script.push(step);
    }
    script
      .push(msvc::enter_dir(&request.temp_path))
      .push(msvc::library(request, debug, &includes, folders));
    if !request.kind.is_hot_reload() {
      script
        .push(msvc::resources())
        .push(msvc::executable(exe_name, debug, &includes));
    }
    script
  }

  fn copy_artifacts(&self, request: &BuildRequest, exe_name: &str) -> Result<(), BuildError> {
    let temp = &request.temp_path;
    let export = &request.export_path;
    let mut batch = CopyBatch::new();

    if request.kind.is_hot_reload() {
      let dll = request.editor_dynamic_library_name();
      batch.add_entry(false, temp.join(&dll), export.join(&dll));
    } else {
      let dll = request.dynamic_library_name();
      let exe = format!("{exe_name}.exe");
      batch
        .add_entry(false, temp.join(&dll), export.join(&dll))
        .add_entry(false, temp.join(&exe), export.join(&exe));
    }

    if batch.execute_all() {
      Ok(())
    } else {
      Err(BuildError::FinalArtifactCopy)
    }
  }
}
