//! Collaborators the build pipeline calls out to.
//!
//! Asset cooking, project settings persistence and host UI side effects are
//! owned elsewhere; the orchestrator only sees these traits.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::consts::PROJECT_SETTINGS_FILE;
use crate::platform::Platform;
use crate::process::{CommandSpec, ProcessRunner};

/// Options of one cook run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CookOptions {
  /// Folder receiving the cooked assets.
  pub export_dir: PathBuf,
  pub platform: Platform,
  pub shaders_only: bool,
}

/// Produces cooked assets for a target platform.
pub trait AssetCooker: Send + Sync {
  /// Cook everything `options` asks for. Returns `false` on any failure.
  fn cook(&self, options: &CookOptions) -> bool;
}

/// Cooker that does nothing and always succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCooker;

impl AssetCooker for NoopCooker {
  fn cook(&self, options: &CookOptions) -> bool {
    debug!(dir = %options.export_dir.display(), "skipping asset cook");
    true
  }
}

/// Runs an external cook command through a [`ProcessRunner`].
///
/// The command receives `--export <dir> --platform <name>` and, for shader
/// cooks, `--shaders-only`. `cook` blocks on the current tokio runtime and
/// must run on a blocking thread.
#[derive(Debug)]
pub struct ExternalCooker<R> {
  runner: Arc<R>,
  program: String,
  args: Vec<String>,
}

impl<R: ProcessRunner> ExternalCooker<R> {
  /// Build from a command vector. Returns `None` when it is empty.
  pub fn from_command(runner: Arc<R>, command: &[String]) -> Option<Self> {
    let (program, args) = command.split_first()?;
    Some(Self {
      runner,
      program: program.clone(),
      args: args.to_vec(),
    })
  }

  pub fn command(&self, options: &CookOptions) -> CommandSpec {
    let cmd = CommandSpec::new(&self.program)
      .args(&self.args)
      .arg("--export")
      .path_arg(&options.export_dir)
      .arg("--platform")
      .arg(options.platform.as_str());
    if options.shaders_only {
      cmd.arg("--shaders-only")
    } else {
      cmd
    }
  }
}

impl<R: ProcessRunner> AssetCooker for ExternalCooker<R> {
  fn cook(&self, options: &CookOptions) -> bool {
    info!(program = %self.program, platform = %options.platform, shaders_only = options.shaders_only, "cooking assets");
    let runtime = match tokio::runtime::Handle::try_current() {
      Ok(runtime) => runtime,
      Err(e) => {
        warn!(error = %e, "asset cook needs a tokio runtime");
        return false;
      }
    };
    match runtime.block_on(self.runner.run(&self.command(options))) {
      Ok(0) => true,
      Ok(code) => {
        warn!(code, "asset cook failed");
        false
      }
      Err(e) => {
        warn!(program = %self.program, error = %e, "failed to start asset cook");
        false
      }
    }
  }
}

/// Project settings as far as the build is concerned.
///
/// Fields unknown to the build are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
  pub game_name: String,
  pub compiled_engine_version: String,
  pub compiled_for_debug: bool,
  pub compiled_for_64_bits: bool,
  #[serde(flatten)]
  pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Live project settings.
pub trait SettingsStore: Send + Sync {
  fn current(&self) -> ProjectSettings;

  fn replace(&self, settings: ProjectSettings);

  /// Write the current settings into `dir`, returning the written file.
  fn save(&self, dir: &Path) -> io::Result<PathBuf>;
}

/// In-memory settings persisted as `project_settings.json`.
#[derive(Debug, Default)]
pub struct JsonSettingsStore {
  settings: Mutex<ProjectSettings>,
}

impl JsonSettingsStore {
  pub fn new(settings: ProjectSettings) -> Self {
    Self {
      settings: Mutex::new(settings),
    }
  }

  /// Load from a project directory; a missing file yields defaults.
  pub fn load(project_dir: &Path) -> io::Result<Self> {
    let path = project_dir.join(PROJECT_SETTINGS_FILE);
    let settings = match fs::read_to_string(&path) {
      Ok(content) => serde_json::from_str(&content).map_err(io::Error::other)?,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        debug!(path = %path.display(), "no project settings, using defaults");
        ProjectSettings::default()
      }
      Err(e) => return Err(e),
    };
    Ok(Self::new(settings))
  }

  fn lock(&self) -> MutexGuard<'_, ProjectSettings> {
    self.settings.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl SettingsStore for JsonSettingsStore {
  fn current(&self) -> ProjectSettings {
    self.lock().clone()
  }

  fn replace(&self, settings: ProjectSettings) {
    *self.lock() = settings;
  }

  fn save(&self, dir: &Path) -> io::Result<PathBuf> {
    let path = dir.join(PROJECT_SETTINGS_FILE);
    let content = serde_json::to_string_pretty(&*self.lock()).map_err(io::Error::other)?;
    fs::create_dir_all(dir)?;
    fs::write(&path, content)?;
    Ok(path)
  }
}

/// Side effects on the host UI. Every hook defaults to doing nothing.
pub trait BuildHost: Send + Sync {
  /// Throttle (or stop throttling) the host's frame rate during a build.
  fn set_work_limiter(&self, _enabled: bool) {}

  /// Show the container runtime configuration.
  fn open_container_settings(&self) {}

  /// Show a folder to the user.
  fn reveal_folder(&self, _path: &Path) {}
}

/// Host without a UI; reports through the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessHost;

impl BuildHost for HeadlessHost {
  fn open_container_settings(&self) {
    info!("check the container runtime settings in the kiln config file");
  }

  fn reveal_folder(&self, path: &Path) {
    info!(path = %path.display(), "build exported");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::process::{RecordingRunner, SystemRunner};
  use tempfile::TempDir;

  fn external<R: ProcessRunner>(runner: R, command: &[&str]) -> Arc<ExternalCooker<R>> {
    let command: Vec<String> = command.iter().map(|s| s.to_string()).collect();
    Arc::new(ExternalCooker::from_command(Arc::new(runner), &command).unwrap())
  }

  async fn cook_blocking<R: ProcessRunner>(cooker: Arc<ExternalCooker<R>>, options: CookOptions) -> bool {
    tokio::task::spawn_blocking(move || cooker.cook(&options)).await.unwrap()
  }

  fn options(shaders_only: bool) -> CookOptions {
    CookOptions {
      export_dir: PathBuf::from("/tmp/cooked"),
      platform: Platform::Psp,
      shaders_only,
    }
  }

  #[test]
  fn external_cooker_requires_a_program() {
    let runner = Arc::new(RecordingRunner::new());
    assert!(ExternalCooker::from_command(Arc::clone(&runner), &[]).is_none());
    assert!(ExternalCooker::from_command(runner, &["cook".to_string()]).is_some());
  }

  #[test]
  fn external_cooker_appends_options() {
    let cooker = external(RecordingRunner::new(), &["cook", "--fast"]);
    let cmd = cooker.command(&options(true));
    assert_eq!(
      cmd.argv(),
      vec!["cook", "--fast", "--export", "/tmp/cooked", "--platform", "psp", "--shaders-only"]
    );
  }

  #[tokio::test]
  async fn external_cooker_goes_through_the_runner() {
    let cooker = external(RecordingRunner::new(), &["cook"]);
    assert!(cook_blocking(Arc::clone(&cooker), options(false)).await);
    assert!(cooker.runner.ran(&["cook", "--export", "/tmp/cooked"]));

    let failing = external(RecordingRunner::with_handler(|_| Ok(3)), &["cook"]);
    assert!(!cook_blocking(failing, options(false)).await);
  }

  #[tokio::test]
  #[cfg(unix)]
  async fn external_cooker_reports_exit_status() {
    let ok = external(SystemRunner, &["true"]);
    let failing = external(SystemRunner, &["false"]);
    let missing = external(SystemRunner, &["kiln-no-such-cooker"]);

    assert!(cook_blocking(ok, options(false)).await);
    assert!(!cook_blocking(failing, options(false)).await);
    assert!(!cook_blocking(missing, options(false)).await);
  }

  #[test]
  fn cooking_outside_a_runtime_fails() {
    let cooker = external(RecordingRunner::new(), &["cook"]);
    assert!(!cooker.cook(&options(false)));
    assert!(cooker.runner.calls().is_empty());
  }

  #[test]
  fn settings_round_trip_keeps_unknown_fields() {
    let temp = TempDir::new().unwrap();
    fs::write(
      temp.path().join(PROJECT_SETTINGS_FILE),
      r#"{ "game_name": "Demo", "start_scene": "main.scene" }"#,
    )
    .unwrap();

    let store = JsonSettingsStore::load(temp.path()).unwrap();
    assert_eq!(store.current().game_name, "Demo");

    let out = temp.path().join("out");
    let written = store.save(&out).unwrap();
    let saved: serde_json::Value = serde_json::from_str(&fs::read_to_string(written).unwrap()).unwrap();
    assert_eq!(saved["start_scene"], "main.scene");
  }

  #[test]
  fn missing_settings_file_yields_defaults() {
    let temp = TempDir::new().unwrap();
    let store = JsonSettingsStore::load(temp.path()).unwrap();
    assert_eq!(store.current(), ProjectSettings::default());
  }

  #[test]
  fn replace_swaps_live_settings() {
    let store = JsonSettingsStore::default();
    store.replace(ProjectSettings {
      game_name: "Other".to_string(),
      ..Default::default()
    });
    assert_eq!(store.current().game_name, "Other");
  }
}
