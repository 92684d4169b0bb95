//! Container runtime CLI invocations and in-container entry scripts.

use std::path::Path;

use crate::config::ContainerConfig;
use crate::platform::{Platform, PlatformSettings};
use crate::process::CommandSpec;
use crate::request::BuildKind;

/// Name of the build workspace directory inside the container.
pub const WORKSPACE_NAME: &str = "KilnBuild";

/// Absolute build workspace inside the container.
pub const WORKSPACE: &str = "/home/KilnBuild";

/// Trees the PS3 toolchain cannot build.
const PS3_EXCLUDED: [(&str, bool); 7] = [
  ("Source/editor/", true),
  ("Source/gl.c", false),
  ("include/glad/", true),
  ("include/imgui/", true),
  ("include/implot/", true),
  ("include/SDL3/", true),
  ("include/KHR/", true),
];

/// Build container of a platform. One per platform so platforms can build side by side.
pub fn container_name(platform: Platform) -> String {
  format!("kiln-build-{}", platform.as_str())
}

/// Path inside the build workspace.
pub fn workspace_path(relative: &str) -> String {
  if relative.is_empty() {
    format!("{WORKSPACE}/")
  } else {
    format!("{WORKSPACE}/{relative}")
  }
}

/// Game name usable as a build define and file name.
pub fn sanitize_game_name(name: &str) -> String {
  name.replace(' ', "_")
}

/// Builds runtime CLI commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeCommands {
  program: String,
  image: String,
}

impl RuntimeCommands {
  pub fn new(config: &ContainerConfig) -> Self {
    Self {
      program: config.runtime.clone(),
      image: config.image.clone(),
    }
  }

  pub fn image(&self) -> &str {
    &self.image
  }

  fn cmd(&self) -> CommandSpec {
    CommandSpec::new(self.program.as_str())
  }

  /// Answers when the CLI is installed.
  pub fn probe_installed(&self) -> CommandSpec {
    self.cmd().quiet()
  }

  /// Answers when the daemon is running.
  pub fn probe_running(&self) -> CommandSpec {
    self.cmd().arg("ps").quiet()
  }

  /// Wakes up image storage when the runtime is in resource saver mode.
  pub fn wake_image_store(&self) -> CommandSpec {
    self.cmd().args(["image", "ls", "--quiet"]).quiet()
  }

  /// Answers when the build image exists.
  pub fn probe_image(&self) -> CommandSpec {
    self.cmd().args(["image", "inspect"]).arg(self.image.as_str()).quiet()
  }

  pub fn build_image(&self, context: &Path) -> CommandSpec {
    self.cmd().args(["build", "-t"]).arg(self.image.as_str()).path_arg(context)
  }

  pub fn stop(&self, container: &str) -> CommandSpec {
    self.cmd().arg("stop").arg(container).quiet()
  }

  /// Stop without a grace period.
  pub fn kill(&self, container: &str) -> CommandSpec {
    self.cmd().args(["stop", "-t", "0"]).arg(container).quiet()
  }

  pub fn remove(&self, container: &str) -> CommandSpec {
    self.cmd().args(["container", "rm"]).arg(container).quiet()
  }

  /// Create the container with `script` as its entry command.
  pub fn create(&self, container: &str, script: &str) -> CommandSpec {
    self
      .cmd()
      .args(["create", "--name"])
      .arg(container)
      .arg(self.image.as_str())
      .args(["/bin/bash", "-c"])
      .arg(script)
  }

  /// Copy a host path into the container.
  pub fn copy_in(&self, src: &Path, container: &str, dst: &str) -> CommandSpec {
    self.cmd().arg("cp").path_arg(src).arg(format!("{container}:{dst}"))
  }

  /// Copy a container path to the host.
  pub fn copy_out(&self, container: &str, src: &str, dst: &Path) -> CommandSpec {
    self.cmd().arg("cp").arg(format!("{container}:{src}")).path_arg(dst)
  }

  /// Start attached, returning when the entry command exits.
  pub fn start_attached(&self, container: &str) -> CommandSpec {
    self.cmd().args(["start", "-a"]).arg(container)
  }
}

fn join_steps(steps: Vec<CommandSpec>) -> String {
  steps
    .iter()
    .map(CommandSpec::to_shell_line)
    .collect::<Vec<_>>()
    .join(" ; ")
}

fn flag_define(enabled: bool, define: &str) -> Option<String> {
  enabled.then(|| define.to_string())
}

/// Entry script of the build container. `None` for platforms built on the host.
pub fn entry_script(settings: &PlatformSettings, kind: BuildKind, game_name: &str, jobs: usize) -> Option<String> {
  if kind.is_shaders_only() {
    return Some(join_steps(vec![
      CommandSpec::new("cd").arg(workspace_path("")),
      CommandSpec::new("./compile_shaders.sh"),
    ]));
  }

  let common = settings.common();
  let game = sanitize_game_name(game_name);
  let defines = [
    flag_define(common.debug, "-DDEBUG=1"),
    flag_define(common.profiler, "-DPROFILER=1"),
  ];

  let configure = match settings {
    PlatformSettings::Windows(_) => return None,
    PlatformSettings::Psp(_) => CommandSpec::new("psp-cmake")
      .arg("-DMODE=psp")
      .arg(format!("-DGAME_NAME={game}")),
    PlatformSettings::PsVita(vita) => CommandSpec::new("cmake")
      .arg("-DMODE=psvita")
      .arg(format!("-DGAME_NAME={game}"))
      .arg(format!("-DVITA_TITLEID={}", vita.title_id)),
    PlatformSettings::Ps3(_) => {
      let mut steps = vec![CommandSpec::new("cd").arg(workspace_path(""))];
      for (path, recursive) in PS3_EXCLUDED {
        let rm = CommandSpec::new("rm");
        steps.push(if recursive { rm.arg("-r").arg(path) } else { rm.arg(path) });
      }
      let make = CommandSpec::new("make")
        .arg(format!("-j{jobs}"))
        .args(flag_define(common.debug, "DEBUG=1"))
        .args(flag_define(common.profiler, "PROFILER=1"));
      steps.push(make);
      return Some(join_steps(steps));
    }
  };

  let configure = configure.args(defines.into_iter().flatten()).arg("..");
  Some(join_steps(vec![
    CommandSpec::new("cd").arg(workspace_path("build/")),
    configure,
    CommandSpec::new("cmake").args(["--build", "."]).arg(format!("-j{jobs}")),
  ]))
}

/// Build descriptor injected for a platform, as `(file in the install dir, workspace destination)`.
pub fn build_descriptor(platform: Platform) -> (&'static str, String) {
  match platform {
    Platform::Ps3 => ("Makefile.PS3", workspace_path("Makefile")),
    _ => ("CMakeLists.txt", workspace_path("")),
  }
}

/// A file produced inside the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
  /// Location relative to the workspace.
  pub source: String,
  /// File name in the export folder.
  pub file_name: String,
}

impl Artifact {
  fn new(source: impl Into<String>, file_name: impl Into<String>) -> Self {
    Self {
      source: source.into(),
      file_name: file_name.into(),
    }
  }
}

/// Files a container build exports. Only the primary one is required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
  pub primary: Artifact,
  pub secondary: Option<Artifact>,
}

/// Artifacts of a platform. `None` for platforms built on the host.
pub fn artifacts(platform: Platform, game_name: &str) -> Option<Artifacts> {
  let game = sanitize_game_name(game_name);
  let artifacts = match platform {
    Platform::Windows => return None,
    Platform::Psp => Artifacts {
      primary: Artifact::new("build/EBOOT.PBP", "EBOOT.PBP"),
      secondary: Some(Artifact::new(format!("build/{game}.prx"), format!("{game}.prx"))),
    },
    Platform::PsVita => Artifacts {
      primary: Artifact::new(format!("build/{game}.vpk"), format!("{game}.vpk")),
      secondary: None,
    },
    Platform::Ps3 => {
      let primary = format!("{WORKSPACE_NAME}.self");
      let secondary = format!("{WORKSPACE_NAME}.fake.self");
      Artifacts {
        primary: Artifact::new(primary.clone(), primary),
        secondary: Some(Artifact::new(secondary.clone(), secondary)),
      }
    }
  };
  Some(artifacts)
}
