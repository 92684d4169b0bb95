//! Process runner backed by `tokio::process`.

use std::io;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{CommandSpec, NO_EXIT_CODE, ProcessRunner};

/// Runs commands on the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
  fn std_command(cmd: &CommandSpec) -> std::process::Command {
    let mut command = std::process::Command::new(&cmd.program);
    push_args(&mut command, cmd);
    if let Some(cwd) = &cmd.cwd {
      command.current_dir(cwd);
    }
    command
  }

  fn command(cmd: &CommandSpec) -> Command {
    Command::from(Self::std_command(cmd))
  }
}

#[cfg(windows)]
fn push_args(command: &mut std::process::Command, cmd: &CommandSpec) {
  use std::os::windows::process::CommandExt;

  if cmd.raw {
    for arg in &cmd.args {
      command.raw_arg(arg);
    }
  } else {
    command.args(&cmd.args);
  }
}

#[cfg(not(windows))]
fn push_args(command: &mut std::process::Command, cmd: &CommandSpec) {
  command.args(&cmd.args);
}

impl ProcessRunner for SystemRunner {
  async fn run(&self, cmd: &CommandSpec) -> io::Result<i32> {
    if cmd.quiet {
      debug!(cmd = %cmd.to_shell_line(), "probing");
      let status = Self::command(cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;
      return Ok(status.code().unwrap_or(NO_EXIT_CODE));
    }

    info!(cmd = %cmd.to_shell_line(), "executing command");

    let output = Self::command(cmd).stdin(Stdio::null()).output().await?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
      debug!(program = %cmd.program, "{}", line);
    }
    for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
      if output.status.success() {
        debug!(program = %cmd.program, "{}", line);
      } else {
        warn!(program = %cmd.program, "{}", line);
      }
    }

    let code = output.status.code().unwrap_or(NO_EXIT_CODE);
    if code != 0 {
      debug!(code, cmd = %cmd.program, "command exited with failure");
    }
    Ok(code)
  }

  fn spawn_detached(&self, cmd: &CommandSpec) -> io::Result<()> {
    info!(cmd = %cmd.to_shell_line(), "launching");
    Self::std_command(cmd)
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::null())
      .spawn()
      .map(drop)
  }
}
