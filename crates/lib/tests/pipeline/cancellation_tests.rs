//! Cancelling spawned builds.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use kiln_lib::context::StrategyKind;
use kiln_lib::events::BuildEvent;
use kiln_lib::platform::{Platform, PlatformSettings};
use kiln_lib::process::RecordingRunner;
use kiln_lib::{BuildError, BuildKind, GameBuild};

use super::common::{TestEnv, drain};

/// Runner whose attached container start blocks until the container is killed.
fn blocking_runner(started: Arc<AtomicBool>, killed: Arc<AtomicBool>) -> RecordingRunner {
  RecordingRunner::with_handler(move |cmd| {
    let argv = cmd.argv();
    if argv.starts_with(&["docker", "stop", "-t", "0"]) {
      killed.store(true, Ordering::SeqCst);
    } else if argv.starts_with(&["docker", "start", "-a"]) {
      started.store(true, Ordering::SeqCst);
      while !killed.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(5));
      }
      return Ok(137);
    }
    Ok(0)
  })
}

async fn wait_for(flag: &AtomicBool) {
  for _ in 0..1000 {
    if flag.load(Ordering::SeqCst) {
      return;
    }
    tokio::time::sleep(Duration::from_millis(5)).await;
  }
  panic!("flag never raised");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelling_a_container_build_stops_the_container() {
  let env = TestEnv::new();
  let started = Arc::new(AtomicBool::new(false));
  let killed = Arc::new(AtomicBool::new(false));
  let orch = Arc::new(env.orchestrator(blocking_runner(started.clone(), killed.clone())));

  let game = GameBuild::new(
    env.project_dir(),
    PlatformSettings::for_platform(Platform::Psp),
    BuildKind::Package,
    env.export_dir(),
  );
  let handle = orch.spawn(game);

  wait_for(&started).await;
  assert_eq!(handle.context().strategy(), Some(StrategyKind::Containerized));
  assert!(handle.cancel().await);
  assert!(killed.load(Ordering::SeqCst));

  let outcome = handle.wait().await;
  assert_eq!(outcome, Err(BuildError::Cancelled));
  assert!(outcome.unwrap_err().is_cancelled());
  assert!(!orch.runner().ran(&["docker", "cp", "kiln-build-psp:/home/KilnBuild/build/EBOOT.PBP"]));
  assert!(!env.project_dir().join(".build").exists());
}

/// Runner whose copy of the compiled shaders blocks until the container is killed.
fn blocking_shader_copy(copying: Arc<AtomicBool>, killed: Arc<AtomicBool>) -> RecordingRunner {
  RecordingRunner::with_handler(move |cmd| {
    let argv = cmd.argv();
    if argv.starts_with(&["docker", "stop", "-t", "0"]) {
      killed.store(true, Ordering::SeqCst);
    } else if argv.starts_with(&["docker", "cp", "kiln-build-ps3:/home/KilnBuild/shaders_to_compile/"]) {
      copying.store(true, Ordering::SeqCst);
      while !killed.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(5));
      }
    }
    Ok(0)
  })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelling_after_the_shader_pass_skips_packaging() {
  let env = TestEnv::new();
  let copying = Arc::new(AtomicBool::new(false));
  let killed = Arc::new(AtomicBool::new(false));
  let orch = Arc::new(env.orchestrator(blocking_shader_copy(copying.clone(), killed.clone())));
  let mut events = orch.events().subscribe();

  let game = GameBuild::new(
    env.project_dir(),
    PlatformSettings::for_platform(Platform::Ps3),
    BuildKind::ShadersThenPackage,
    env.export_dir(),
  );
  let handle = orch.spawn(game);

  wait_for(&copying).await;
  assert!(handle.cancel().await);

  let outcome = handle.wait().await;
  assert_eq!(outcome, Err(BuildError::Cancelled));

  let starts = orch
    .runner()
    .calls()
    .iter()
    .filter(|c| c.argv().starts_with(&["docker", "start", "-a"]))
    .count();
  assert_eq!(starts, 1);

  let ended: Vec<_> = drain(&mut events)
    .into_iter()
    .filter_map(|event| match event {
      BuildEvent::Ended { outcome, .. } => Some(outcome),
      BuildEvent::Started { .. } => None,
    })
    .collect();
  assert_eq!(ended, vec![Err(BuildError::Cancelled)]);
}

#[tokio::test]
async fn local_builds_ignore_cancellation() {
  let env = TestEnv::new();
  let orch = Arc::new(env.orchestrator(RecordingRunner::with_handler(|_| Ok(1))));

  let game = GameBuild::new(
    env.project_dir(),
    PlatformSettings::for_platform(Platform::Windows),
    BuildKind::Package,
    env.export_dir(),
  );
  let handle = orch.spawn(game);
  let outcome = handle.wait().await;
  assert_eq!(outcome, Err(BuildError::Unknown));

  let ctx = orch.new_context();
  ctx.set_strategy(StrategyKind::LocalToolchain);
  assert!(!ctx.request_cancel());
  assert!(!ctx.is_cancelled());
}

#[tokio::test]
async fn a_second_build_for_the_same_platform_is_rejected() {
  let env = TestEnv::new();
  let orch = env.orchestrator(RecordingRunner::new());
  let ctx = orch.new_context();
  let _held = kiln_lib::build_lock::BuildLock::acquire(&env.root().join("cache"), Platform::Psp).unwrap();

  let game = GameBuild::new(
    env.project_dir(),
    PlatformSettings::for_platform(Platform::Psp),
    BuildKind::Package,
    env.export_dir(),
  );
  assert_eq!(orch.build(&ctx, game).await, Err(BuildError::BuildInProgress));
  assert!(orch.runner().calls().is_empty());

  let other = GameBuild::new(
    env.project_dir(),
    PlatformSettings::for_platform(Platform::Ps3),
    BuildKind::Package,
    env.export_dir(),
  );
  assert_ne!(orch.build(&ctx, other).await, Err(BuildError::BuildInProgress));
}
