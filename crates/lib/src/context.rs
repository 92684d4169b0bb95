//! Per-build shared state.
//!
//! One [`BuildContext`] lives for the duration of a build and is shared by
//! `Arc` between the task running it and the [`crate::orchestrator::BuildHandle`]
//! that may cancel it. Locks are never held across an `.await`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::layout::EngineLayout;
use crate::telemetry::{Phase, PhaseTimings};

/// How the active build compiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
  /// Host toolchain, blocking and not cancellable.
  LocalToolchain,
  /// Cross-compilation inside a named container.
  Containerized,
  /// Host compatibility layer, superseded by containers. Reported, never dispatched.
  LegacyCompatLayer,
}

impl StrategyKind {
  pub fn is_cancellable(&self) -> bool {
    matches!(self, Self::Containerized)
  }
}

impl fmt::Display for StrategyKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::LocalToolchain => "local-toolchain",
      Self::Containerized => "containerized",
      Self::LegacyCompatLayer => "legacy-compat-layer",
    };
    f.write_str(name)
  }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
pub struct BuildContext {
  cancelled: AtomicBool,
  strategy: Mutex<Option<StrategyKind>>,
  timings: Mutex<PhaseTimings>,
  layout: EngineLayout,
}

impl BuildContext {
  pub fn new(layout: EngineLayout) -> Self {
    Self {
      cancelled: AtomicBool::new(false),
      strategy: Mutex::new(None),
      timings: Mutex::new(PhaseTimings::default()),
      layout,
    }
  }

  pub fn layout(&self) -> &EngineLayout {
    &self.layout
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancelled.load(Ordering::SeqCst)
  }

  /// Clear the cancellation flag and the phase timings.
  pub fn reset(&self) {
    self.reset_cancel();
    self.reset_timings();
  }

  pub fn reset_cancel(&self) {
    self.cancelled.store(false, Ordering::SeqCst);
  }

  pub fn reset_timings(&self) {
    lock(&self.timings).reset();
  }

  pub fn strategy(&self) -> Option<StrategyKind> {
    *lock(&self.strategy)
  }

  pub fn set_strategy(&self, kind: StrategyKind) {
    debug!(strategy = %kind, "active strategy");
    *lock(&self.strategy) = Some(kind);
  }

  /// Raise the cancellation flag.
  ///
  /// Only a containerized build accepts it. Returns whether the flag was set.
  pub fn request_cancel(&self) -> bool {
    let strategy = lock(&self.strategy);
    match *strategy {
      Some(kind) if kind.is_cancellable() => {
        self.cancelled.store(true, Ordering::SeqCst);
        info!("cancellation requested");
        true
      }
      other => {
        debug!(strategy = ?other, "cancellation ignored");
        false
      }
    }
  }

  pub fn record(&self, phase: Phase, elapsed: Duration) {
    lock(&self.timings).record(phase, elapsed);
  }

  pub fn timings(&self) -> PhaseTimings {
    lock(&self.timings).clone()
  }
}
