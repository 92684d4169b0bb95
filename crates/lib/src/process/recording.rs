//! A process runner that records instead of executing.
//!
//! Used by `--dry-run` and by tests that need to see exactly which
//! commands a build would issue.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use super::{CommandSpec, ProcessRunner};

type Handler = dyn Fn(&CommandSpec) -> io::Result<i32> + Send + Sync;

/// Records every command and answers with scripted exit codes.
///
/// Without a handler every command "succeeds" with exit code 0.
#[derive(Clone, Default)]
pub struct RecordingRunner {
  calls: Arc<Mutex<Vec<CommandSpec>>>,
  detached: Arc<Mutex<Vec<CommandSpec>>>,
  handler: Option<Arc<Handler>>,
  fail_launches: bool,
}

impl std::fmt::Debug for RecordingRunner {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RecordingRunner")
      .field("calls", &self.calls().len())
      .field("detached", &self.detached().len())
      .finish()
  }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RecordingRunner {
  pub fn new() -> Self {
    Self::default()
  }

  /// Answer each command with the handler's result.
  pub fn with_handler<F>(handler: F) -> Self
  where
    F: Fn(&CommandSpec) -> io::Result<i32> + Send + Sync + 'static,
  {
    Self {
      handler: Some(Arc::new(handler)),
      ..Self::default()
    }
  }

  /// Make every detached launch fail to start.
  pub fn failing_launches(mut self) -> Self {
    self.fail_launches = true;
    self
  }

  /// Commands run so far, in order.
  pub fn calls(&self) -> Vec<CommandSpec> {
    lock(&self.calls).clone()
  }

  /// Commands launched detached so far, in order.
  pub fn detached(&self) -> Vec<CommandSpec> {
    lock(&self.detached).clone()
  }

  /// Command lines run so far, rendered as shell lines.
  pub fn lines(&self) -> Vec<String> {
    lock(&self.calls).iter().map(CommandSpec::to_shell_line).collect()
  }

  /// Whether any recorded command starts with the given arguments.
  pub fn ran(&self, prefix: &[&str]) -> bool {
    lock(&self.calls).iter().any(|c| c.argv().starts_with(prefix))
  }
}

impl ProcessRunner for RecordingRunner {
  async fn run(&self, cmd: &CommandSpec) -> io::Result<i32> {
    info!(cmd = %cmd.to_shell_line(), "recorded command");
    lock(&self.calls).push(cmd.clone());
    match &self.handler {
      Some(handler) => handler(cmd),
      None => Ok(0),
    }
  }

  fn spawn_detached(&self, cmd: &CommandSpec) -> io::Result<()> {
    info!(cmd = %cmd.to_shell_line(), "recorded launch");
    lock(&self.detached).push(cmd.clone());
    if self.fail_launches {
      return Err(io::Error::new(io::ErrorKind::NotFound, format!("cannot launch {}", cmd.program)));
    }
    Ok(())
  }
}
