//! Phase timings of a build.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
  Cook,
  ContainerPrepare,
  ContainerCompile,
  ShaderCompile,
  Total,
}

impl Phase {
  pub const ALL: [Phase; 5] = [
    Phase::Cook,
    Phase::ContainerPrepare,
    Phase::ContainerCompile,
    Phase::ShaderCompile,
    Phase::Total,
  ];

  pub fn label(&self) -> &'static str {
    match self {
      Self::Cook => "Cooking time",
      Self::ContainerPrepare => "Container preparation time",
      Self::ContainerCompile => "Container code compile time",
      Self::ShaderCompile => "Container shader compile time",
      Self::Total => "Total compile time",
    }
  }
}

/// Durations of the phases of one build.
///
/// Each phase is recorded at most once; later writes are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhaseTimings {
  pub cook: Option<Duration>,
  pub container_prepare: Option<Duration>,
  pub container_compile: Option<Duration>,
  pub shader_compile: Option<Duration>,
  pub total: Option<Duration>,
}

impl PhaseTimings {
  fn slot(&mut self, phase: Phase) -> &mut Option<Duration> {
    match phase {
      Phase::Cook => &mut self.cook,
      Phase::ContainerPrepare => &mut self.container_prepare,
      Phase::ContainerCompile => &mut self.container_compile,
      Phase::ShaderCompile => &mut self.shader_compile,
      Phase::Total => &mut self.total,
    }
  }

  pub fn get(&self, phase: Phase) -> Option<Duration> {
    match phase {
      Phase::Cook => self.cook,
      Phase::ContainerPrepare => self.container_prepare,
      Phase::ContainerCompile => self.container_compile,
      Phase::ShaderCompile => self.shader_compile,
      Phase::Total => self.total,
    }
  }

  /// Record a phase. Returns `false` if it was already recorded.
  pub fn record(&mut self, phase: Phase, elapsed: Duration) -> bool {
    let slot = self.slot(phase);
    if slot.is_some() {
      warn!(?phase, "phase timing already recorded");
      return false;
    }
    *slot = Some(elapsed);
    true
  }

  pub fn reset(&mut self) {
    *self = Self::default();
  }

  /// One summary line per phase, unrecorded phases shown as zero.
  pub fn summary_lines(&self) -> Vec<String> {
    Phase::ALL
      .iter()
      .map(|phase| {
        let elapsed = self.get(*phase).unwrap_or_default();
        format!(
          "{}: {} us ({:.6} s)",
          phase.label(),
          elapsed.as_micros(),
          elapsed.as_secs_f64()
        )
      })
      .collect()
  }

  /// Emit the summary to the log.
  pub fn log_summary(&self) {
    info!("Compilation timings:");
    for line in self.summary_lines() {
      info!("{}", line);
    }
  }
}

impl fmt::Display for PhaseTimings {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for line in self.summary_lines() {
      writeln!(f, "{}", line)?;
    }
    Ok(())
  }
}
