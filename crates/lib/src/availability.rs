//! Pre-flight checks of the environment a build needs.

use std::path::PathBuf;

use bitflags::bitflags;
use tracing::error;

use crate::config::Config;
use crate::consts::{DYLIB_EXT, ENGINE_EDITOR_LIB, ENGINE_RUNTIME_LIB};
use crate::layout::EngineLayout;
use crate::platform::Platform;
use crate::request::{BuildKind, BuildRequest};

bitflags! {
  /// Outcome of the pre-flight checks.
  ///
  /// `AVAILABLE` is set if and only if no other bit is.
  #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
  pub struct Availability: u8 {
    const AVAILABLE = 1 << 0;
    /// The toolchain entry script is not at the configured path.
    const MISSING_TOOLCHAIN = 1 << 1;
    /// The compiled engine library pair for the build flavor is missing.
    const MISSING_ENGINE_LIBRARY = 1 << 2;
    /// The emulator used by run builds is not at the configured path.
    const MISSING_EMULATOR = 1 << 3;
  }
}

impl Availability {
  /// Every bit that denotes a missing precondition.
  pub const MISSING: Self = Self::MISSING_TOOLCHAIN
    .union(Self::MISSING_ENGINE_LIBRARY)
    .union(Self::MISSING_EMULATOR);

  /// Build from the set of missing preconditions.
  pub fn from_missing(missing: Self) -> Self {
    let missing = missing & Self::MISSING;
    if missing.is_empty() { Self::AVAILABLE } else { missing }
  }

  pub fn is_available(&self) -> bool {
    self.contains(Self::AVAILABLE)
  }

  /// One diagnostic per missing precondition.
  pub fn diagnostics(&self) -> Vec<&'static str> {
    let mut messages = Vec::new();
    if self.contains(Self::MISSING_TOOLCHAIN) {
      messages.push("Compiler executable is missing, check the toolchain install path");
    }
    if self.contains(Self::MISSING_ENGINE_LIBRARY) {
      messages.push("Compiled engine library is missing, check the engine install directory");
    }
    if self.contains(Self::MISSING_EMULATOR) {
      messages.push("Emulator executable is missing, check the emulator path");
    }
    messages
  }
}

/// Compiled engine library and its import library for a build flavor.
pub fn engine_library_pair(layout: &EngineLayout, kind: BuildKind) -> (PathBuf, PathBuf) {
  let name = if kind.is_hot_reload() {
    ENGINE_EDITOR_LIB
  } else {
    ENGINE_RUNTIME_LIB
  };
  (
    layout.install_dir.join(format!("{name}.lib")),
    layout.install_dir.join(format!("{name}.{DYLIB_EXT}")),
  )
}

/// Check everything `request` needs from the environment.
///
/// Logs one error per missing precondition.
pub fn check(request: &BuildRequest, config: &Config, layout: &EngineLayout) -> Availability {
  let mut missing = Availability::empty();

  match request.platform() {
    Some(Platform::Windows) => {
      if !config.toolchain.entry_path().exists() {
        missing |= Availability::MISSING_TOOLCHAIN;
      }
      let (import_lib, dylib) = engine_library_pair(layout, request.kind);
      if !import_lib.exists() || !dylib.exists() {
        missing |= Availability::MISSING_ENGINE_LIBRARY;
      }
    }
    Some(Platform::Psp) if request.kind == BuildKind::PackageAndRun => {
      if !config.emulator_path.exists() {
        missing |= Availability::MISSING_EMULATOR;
      }
    }
    _ => {}
  }

  let availability = Availability::from_missing(missing);
  for message in availability.diagnostics() {
    error!("{}", message);
  }
  availability
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::platform::PlatformSettings;
  use std::fs;
  use tempfile::TempDir;
  use tracing_test::traced_test;

  #[test]
  fn available_iff_nothing_missing() {
    let bits = [
      Availability::MISSING_TOOLCHAIN,
      Availability::MISSING_ENGINE_LIBRARY,
      Availability::MISSING_EMULATOR,
    ];
    for mask in 0u8..8 {
      let mut missing = Availability::empty();
      for (i, bit) in bits.iter().enumerate() {
        if mask & (1 << i) != 0 {
          missing |= *bit;
        }
      }

      let result = Availability::from_missing(missing);
      assert_eq!(result.is_available(), mask == 0, "mask {mask:03b}");
      assert_eq!(result.is_available(), !result.intersects(Availability::MISSING));
      assert_eq!(result.diagnostics().len(), mask.count_ones() as usize);
    }
  }

  #[test]
  fn available_bit_cannot_be_smuggled_in() {
    let result = Availability::from_missing(Availability::AVAILABLE | Availability::MISSING_EMULATOR);
    assert_eq!(result, Availability::MISSING_EMULATOR);
  }

  struct Env {
    _temp: TempDir,
    config: Config,
    layout: EngineLayout,
  }

  fn env() -> Env {
    let temp = TempDir::new().unwrap();
    let install = temp.path().join("engine");
    fs::create_dir_all(&install).unwrap();
    let config = Config {
      toolchain: crate::config::ToolchainConfig {
        install_dir: temp.path().join("vc"),
      },
      emulator_path: temp.path().join("ppsspp"),
      ..Default::default()
    };
    let layout = EngineLayout::detect(&install);
    Env { _temp: temp, config, layout }
  }

  fn request(platform: Platform, kind: BuildKind) -> BuildRequest {
    BuildRequest::new(kind, PlatformSettings::for_platform(platform), "src", "tmp", "out", "game")
  }

  #[test]
  #[traced_test]
  fn windows_reports_every_missing_precondition() {
    let env = env();
    let result = check(&request(Platform::Windows, BuildKind::Package), &env.config, &env.layout);

    assert_eq!(
      result,
      Availability::MISSING_TOOLCHAIN | Availability::MISSING_ENGINE_LIBRARY
    );
    assert!(logs_contain("Compiler executable is missing"));
    assert!(logs_contain("Compiled engine library is missing"));
  }

  #[test]
  fn windows_library_pair_depends_on_flavor() {
    let env = env();
    fs::create_dir_all(&env.config.toolchain.install_dir).unwrap();
    fs::write(env.config.toolchain.entry_path(), "").unwrap();
    fs::write(env.layout.install_dir.join("engine.lib"), "").unwrap();
    fs::write(env.layout.install_dir.join("engine.dll"), "").unwrap();

    let package = check(&request(Platform::Windows, BuildKind::Package), &env.config, &env.layout);
    let hot_reload = check(&request(Platform::Windows, BuildKind::HotReload), &env.config, &env.layout);

    assert!(package.is_available());
    assert_eq!(hot_reload, Availability::MISSING_ENGINE_LIBRARY);
  }

  #[test]
  fn emulator_only_matters_for_psp_runs() {
    let env = env();
    let run = check(&request(Platform::Psp, BuildKind::PackageAndRun), &env.config, &env.layout);
    let package = check(&request(Platform::Psp, BuildKind::Package), &env.config, &env.layout);
    let vita_run = check(&request(Platform::PsVita, BuildKind::PackageAndRun), &env.config, &env.layout);

    assert_eq!(run, Availability::MISSING_EMULATOR);
    assert!(package.is_available());
    assert!(vita_run.is_available());
  }
}
