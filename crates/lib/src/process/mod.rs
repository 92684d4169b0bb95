//! External process boundary.
//!
//! Every external step of a build (toolchain, container runtime CLI, image
//! build) is a single [`CommandSpec`] handed to a [`ProcessRunner`] which
//! blocks the build until the process exits and reports its exit code.
//! Output goes to the log, never back into the pipeline.

pub mod recording;
pub mod system;

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

pub use recording::RecordingRunner;
pub use system::SystemRunner;

/// Exit code reported for processes terminated without one (e.g. by a signal).
pub const NO_EXIT_CODE: i32 = -1;

/// A program and its argument vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
  pub program: String,
  pub args: Vec<String>,
  pub cwd: Option<PathBuf>,
  /// Discard stdout/stderr instead of logging them.
  pub quiet: bool,
  /// Hand the arguments over verbatim. On Windows the program receives
  /// them without per-argument quoting and parses its command line itself.
  pub raw: bool,
}

impl CommandSpec {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      cwd: None,
      quiet: false,
      raw: false,
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn path_arg(self, path: &Path) -> Self {
    self.arg(path.to_string_lossy())
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.cwd = Some(dir.into());
    self
  }

  pub fn quiet(mut self) -> Self {
    self.quiet = true;
    self
  }

  pub fn raw(mut self) -> Self {
    self.raw = true;
    self
  }

  /// Program followed by its arguments.
  pub fn argv(&self) -> Vec<&str> {
    std::iter::once(self.program.as_str())
      .chain(self.args.iter().map(String::as_str))
      .collect()
  }

  /// Render as a single shell line, quoting where needed.
  pub fn to_shell_line(&self) -> String {
    if self.raw {
      return std::iter::once(quote_arg(&self.program))
        .chain(self.args.iter().cloned())
        .collect::<Vec<_>>()
        .join(" ");
    }
    shell_join(self.argv())
  }
}

/// Runs external processes on behalf of the build.
pub trait ProcessRunner: Send + Sync + 'static {
  /// Run to completion and return the exit code.
  ///
  /// `Err` means the process could not be started at all.
  fn run(&self, cmd: &CommandSpec) -> impl Future<Output = io::Result<i32>> + Send;

  /// Start without waiting for it to exit.
  fn spawn_detached(&self, cmd: &CommandSpec) -> io::Result<()>;
}

/// Quote one argument for `sh`-style and `cmd.exe`-style command lines.
///
/// Arguments made only of safe characters are left bare; anything else is
/// wrapped in double quotes with embedded quotes and backslashes escaped.
/// Glob stars stay bare so the receiving tool can expand them.
pub fn quote_arg(arg: &str) -> String {
  let safe = !arg.is_empty()
    && arg
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || "-_./:=+,@%*\\".contains(c));
  if safe {
    return arg.to_string();
  }

  let mut quoted = String::with_capacity(arg.len() + 2);
  quoted.push('"');
  for c in arg.chars() {
    if c == '"' {
      quoted.push('\\');
    }
    quoted.push(c);
  }
  quoted.push('"');
  quoted
}

/// Join arguments into one command line.
pub fn shell_join<I, S>(args: I) -> String
where
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  args
    .into_iter()
    .map(|a| quote_arg(a.as_ref()))
    .collect::<Vec<_>>()
    .join(" ")
}

/// Number of parallel jobs for native builds, never less than one.
pub fn job_count() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(1).max(1)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builder_collects_arguments_in_order() {
    let cmd = CommandSpec::new("docker")
      .arg("cp")
      .args(["a", "b"])
      .current_dir("/tmp")
      .quiet();
    assert_eq!(cmd.argv(), vec!["docker", "cp", "a", "b"]);
    assert_eq!(cmd.cwd, Some(PathBuf::from("/tmp")));
    assert!(cmd.quiet);
  }

  #[test]
  fn safe_arguments_stay_bare() {
    assert_eq!(quote_arg("-DMODE=psp"), "-DMODE=psp");
    assert_eq!(quote_arg("/home/build/*.cpp"), "/home/build/*.cpp");
  }

  #[test]
  fn spaces_and_quotes_are_quoted() {
    assert_eq!(quote_arg("C:/Program Files/VC"), "\"C:/Program Files/VC\"");
    assert_eq!(quote_arg("say \"hi\""), "\"say \\\"hi\\\"\"");
    assert_eq!(quote_arg(""), "\"\"");
  }

  #[test]
  fn shell_line_quotes_each_argument() {
    let cmd = CommandSpec::new("cd").arg("/d").arg("C:/My Game/.build");
    assert_eq!(cmd.to_shell_line(), "cd /d \"C:/My Game/.build\"");
  }

  #[test]
  fn raw_arguments_render_verbatim() {
    let cmd = CommandSpec::new("cmd.exe").args(["/S", "/C", "\"cd /d \"C:/My Game\"\""]).raw();
    assert_eq!(cmd.to_shell_line(), "cmd.exe /S /C \"cd /d \"C:/My Game\"\"");
  }

  #[test]
  fn job_count_is_at_least_one() {
    assert!(job_count() >= 1);
  }
}
