//! Command builders for the MSVC toolchain.
//!
//! A build is one `cmd.exe` line of chained steps: enter the toolchain
//! directory, load its environment, enter the temp directory, compile the
//! game library and, for packaged games, compile the resources and link the
//! executable. Each step is a structured [`CommandSpec`].

use std::path::{Path, PathBuf};

use crate::config::ToolchainConfig;
use crate::consts::{ENGINE_EDITOR_LIB, ENGINE_RUNTIME_LIB, ENTRY_FILE, RESOURCE_FILE};
use crate::layout::normalize;
use crate::process::CommandSpec;
use crate::request::BuildRequest;

/// Compiled resource file produced by `rc`.
const RESOURCE_OUTPUT: &str = "res.res";

/// Ordered steps chained with `&&`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
  steps: Vec<CommandSpec>,
}

impl Script {
  pub fn push(&mut self, step: CommandSpec) -> &mut Self {
    self.steps.push(step);
    self
  }

  pub fn steps(&self) -> &[CommandSpec] {
    &self.steps
  }

  pub fn to_line(&self) -> String {
    self
      .steps
      .iter()
      .map(CommandSpec::to_shell_line)
      .collect::<Vec<_>>()
      .join(" && ")
  }

  /// Single command running the whole chain.
  ///
  /// With `/S`, `cmd.exe` drops only the outermost quotes of the line, so
  /// the quoted paths inside it survive. The line is passed raw.
  pub fn into_command(self) -> CommandSpec {
    CommandSpec::new("cmd.exe")
      .args(["/S", "/C"])
      .arg(format!("\"{}\"", self.to_line()))
      .raw()
  }
}

/// Change drive and directory in one step.
pub fn enter_dir(dir: &Path) -> CommandSpec {
  CommandSpec::new("cd").arg("/d").path_arg(&normalize(dir))
}

/// Steps loading the toolchain environment.
pub fn environment(toolchain: &ToolchainConfig) -> [CommandSpec; 2] {
  [
    enter_dir(&toolchain.install_dir),
    CommandSpec::new("call").arg(toolchain.entry_file()),
  ]
}

fn include_args(cmd: CommandSpec, include_dirs: &[PathBuf]) -> CommandSpec {
  include_dirs
    .iter()
    .fold(cmd, |cmd, dir| cmd.arg("/I").path_arg(&normalize(dir)))
}

/// Compile the game sources into a dynamic library.
///
/// One `*.cpp` glob per source folder; `cl` does not recurse.
pub fn library(request: &BuildRequest, debug: bool, include_dirs: &[PathBuf], source_folders: &[PathBuf]) -> CommandSpec {
  let hot_reload = request.kind.is_hot_reload();

  let mut cmd = CommandSpec::new("cl").arg("/std:c++17");
  if !debug {
    cmd = cmd.arg("/O2");
  }
  cmd = cmd.args(["/MP", "/EHsc"]);
  cmd = if debug {
    cmd.args(["/MDd", "/DDEBUG"])
  } else {
    cmd.arg("/MD")
  };
  cmd = cmd.args(["/DIMPORT", "/DNOMINMAX"]);
  if hot_reload {
    cmd = cmd.arg("/DEDITOR");
  }

  cmd = include_args(cmd, include_dirs).arg("/LD");
  for folder in source_folders {
    cmd = cmd.arg(format!("{}/*.cpp", normalize(folder).display()));
  }

  let (engine_lib, output) = if hot_reload {
    (ENGINE_EDITOR_LIB, request.editor_dynamic_library_name())
  } else {
    (ENGINE_RUNTIME_LIB, request.dynamic_library_name())
  };

  cmd
    .arg(format!("{engine_lib}.lib"))
    .arg("/link")
    .arg(format!("/implib:{}.lib", request.artifact_name))
    .arg(format!("/out:{output}"))
}

/// Compile the icon resources.
pub fn resources() -> CommandSpec {
  CommandSpec::new("rc").arg(RESOURCE_FILE)
}

/// Link the game executable against the runtime engine library.
pub fn executable(exe_name: &str, debug: bool, include_dirs: &[PathBuf]) -> CommandSpec {
  let mut cmd = CommandSpec::new("cl")
    .arg(format!("/Fe{exe_name}.exe"))
    .arg(RESOURCE_OUTPUT)
    .args(["/std:c++17", "/MP", "/EHsc", "/DNOMINMAX"]);
  if !debug {
    cmd = cmd.arg("/O2");
  }
  include_args(cmd, include_dirs)
    .arg(ENTRY_FILE)
    .arg(format!("{ENGINE_RUNTIME_LIB}.lib"))
}
