//! Terminal states of a build.
//!
//! A build either succeeds or stops on exactly one [`BuildError`]. The
//! error's `Display` text is the single user-facing message for that state.

use serde::Serialize;
use thiserror::Error;

/// Result of a build as seen by callers and event subscribers.
pub type BuildOutcome = Result<(), BuildError>;

/// Why a build stopped.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildError {
  /// The request is malformed (unset platform, empty path or name, invalid settings).
  #[error("Invalid build request")]
  InvalidRequest,

  #[error("Unable to compile (unknown error)")]
  Unknown,

  #[error("Error when cooking files")]
  CookFailed,

  #[error("Error when copying files")]
  FileCopy,

  #[error("Error when copying game's code")]
  GameSourceCopy,

  #[error("Error when copying game's files")]
  FinalArtifactCopy,

  #[error("The compiler is not correctly set up, check the toolchain settings")]
  ToolchainUnavailable,

  #[error("Unable to find the container runtime")]
  ContainerRuntimeNotFound,

  #[error("The container runtime is not running")]
  ContainerRuntimeNotRunning,

  #[error("The container runtime could not be started, check its application path in the settings")]
  ContainerRuntimeCouldNotStart,

  #[error("The build image is missing")]
  ContainerImageMissing,

  #[error("Unable to compile in the container (probably a C++ error)")]
  ContainerCompile,

  #[error("Unable to compile shaders in the container (error in shader code)")]
  ContainerShaderCompile,

  #[error("Another build for this platform is already running")]
  BuildInProgress,

  #[error("The compilation has been cancelled")]
  Cancelled,
}

impl BuildError {
  /// Cancellation is a normal outcome, not a failure to report.
  pub fn is_cancelled(&self) -> bool {
    matches!(self, Self::Cancelled)
  }
}

/// Canonical message for any outcome.
pub fn outcome_message(outcome: &BuildOutcome) -> String {
  match outcome {
    Ok(()) => "Code compiled successfully!".to_string(),
    Err(err) => err.to_string(),
  }
}
