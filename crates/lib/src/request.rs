//! Build requests.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::consts::{ASSETS_DIR, DYLIB_EXT};
use crate::platform::{Platform, PlatformSettings};

/// What a build produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildKind {
  /// Editor-loadable dynamic library.
  HotReload,
  /// Standalone package in the export folder.
  Package,
  /// Package, then launch it on the host (or in the emulator).
  PackageAndRun,
  /// Package for running on physical hardware.
  PackageAndRunOnDevice,
  /// Compile shaders only.
  ShadersOnly,
  /// Compile shaders, then package.
  ShadersThenPackage,
}

impl BuildKind {
  pub const ALL: [BuildKind; 6] = [
    BuildKind::HotReload,
    BuildKind::Package,
    BuildKind::PackageAndRun,
    BuildKind::PackageAndRunOnDevice,
    BuildKind::ShadersOnly,
    BuildKind::ShadersThenPackage,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::HotReload => "hot-reload",
      Self::Package => "package",
      Self::PackageAndRun => "package-and-run",
      Self::PackageAndRunOnDevice => "package-and-run-on-device",
      Self::ShadersOnly => "shaders-only",
      Self::ShadersThenPackage => "shaders-then-package",
    }
  }

  pub fn is_hot_reload(&self) -> bool {
    matches!(self, Self::HotReload)
  }

  pub fn is_shaders_only(&self) -> bool {
    matches!(self, Self::ShadersOnly)
  }
}

impl fmt::Display for BuildKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for BuildKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    BuildKind::ALL
      .into_iter()
      .find(|k| k.as_str().eq_ignore_ascii_case(s))
      .ok_or_else(|| format!("unknown build kind '{}'", s))
  }
}

/// Everything the orchestrator needs to know about one build.
///
/// Paths may be relative when handed in; the orchestrator resolves them
/// against the current directory before any use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
  pub kind: BuildKind,
  /// `None` until a target is chosen.
  pub settings: Option<PlatformSettings>,
  pub temp_path: PathBuf,
  pub source_path: PathBuf,
  pub export_path: PathBuf,
  /// Base name of the produced libraries (`<name>.dll`, `<name>_Editor.dll`).
  pub artifact_name: String,
}

impl BuildRequest {
  pub fn new(
    kind: BuildKind,
    settings: PlatformSettings,
    source_path: impl Into<PathBuf>,
    temp_path: impl Into<PathBuf>,
    export_path: impl Into<PathBuf>,
    artifact_name: impl Into<String>,
  ) -> Self {
    Self {
      kind,
      settings: Some(settings),
      temp_path: temp_path.into(),
      source_path: source_path.into(),
      export_path: export_path.into(),
      artifact_name: artifact_name.into(),
    }
  }

  pub fn platform(&self) -> Option<Platform> {
    self.settings.as_ref().map(PlatformSettings::platform)
  }

  /// Runtime dynamic library file name.
  pub fn dynamic_library_name(&self) -> String {
    format!("{}.{}", self.artifact_name, DYLIB_EXT)
  }

  /// Editor dynamic library file name.
  pub fn editor_dynamic_library_name(&self) -> String {
    format!("{}_Editor.{}", self.artifact_name, DYLIB_EXT)
  }

  /// Whether the build uses and refreshes the persistent build cache.
  pub fn uses_build_cache(&self) -> bool {
    self.settings.as_ref().is_some_and(|s| s.common().use_build_cache)
  }
}

/// Temp folder of a game build, under the temp root.
pub const BUILD_TEMP_DIR: &str = ".build";

/// Temp folder of the shader pass of a game build.
pub const SHADER_TEMP_DIR: &str = ".shaders_build";

/// Artifact name of game builds.
pub const GAME_ARTIFACT: &str = "game";

/// A whole game build of a project, as issued from the build menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameBuild {
  pub project_dir: PathBuf,
  pub settings: PlatformSettings,
  pub kind: BuildKind,
  pub export_dir: PathBuf,
  /// Folder holding the temp folders. Defaults to the project folder.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub temp_root: Option<PathBuf>,
}

impl GameBuild {
  pub fn new(
    project_dir: impl Into<PathBuf>,
    settings: PlatformSettings,
    kind: BuildKind,
    export_dir: impl Into<PathBuf>,
  ) -> Self {
    Self {
      project_dir: project_dir.into(),
      settings,
      kind,
      export_dir: export_dir.into(),
      temp_root: None,
    }
  }

  pub fn with_temp_root(mut self, dir: impl Into<PathBuf>) -> Self {
    self.temp_root = Some(dir.into());
    self
  }

  fn temp_root(&self) -> &PathBuf {
    self.temp_root.as_ref().unwrap_or(&self.project_dir)
  }

  /// Request of the main pass.
  pub fn request(&self) -> BuildRequest {
    BuildRequest::new(
      self.kind,
      self.settings.clone(),
      self.project_dir.join(ASSETS_DIR),
      self.temp_root().join(BUILD_TEMP_DIR),
      &self.export_dir,
      GAME_ARTIFACT,
    )
  }

  /// Temp folder of the shader pass.
  pub fn shader_temp_dir(&self) -> PathBuf {
    self.temp_root().join(SHADER_TEMP_DIR)
  }
}
