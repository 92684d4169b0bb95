//! Host builds with the local toolchain.

use std::fs;
use std::path::PathBuf;

use kiln_lib::events::BuildEvent;
use kiln_lib::platform::{Platform, PlatformSettings};
use kiln_lib::process::RecordingRunner;
use kiln_lib::telemetry::Phase;
use kiln_lib::{BuildError, BuildKind, GameBuild};

use super::common::{TestEnv, drain};

/// Pretends to be the toolchain by writing what it would link.
fn linking_runner(temp: PathBuf, exit_code: i32) -> RecordingRunner {
  RecordingRunner::with_handler(move |cmd| {
    if cmd.program == "cmd.exe" {
      for file in ["game.dll", "game.exe", "game_Editor.dll"] {
        fs::write(temp.join(file), "")?;
      }
    }
    Ok(exit_code)
  })
}

fn windows_build(env: &TestEnv, kind: BuildKind) -> GameBuild {
  GameBuild::new(
    env.project_dir(),
    PlatformSettings::for_platform(Platform::Windows),
    kind,
    env.export_dir(),
  )
}

#[tokio::test]
async fn package_build_exports_binaries_and_project_files() {
  let env = TestEnv::new();
  let orch = env.orchestrator(linking_runner(env.project_dir().join(".build"), 0));
  let mut events = orch.events().subscribe();
  let ctx = orch.new_context();

  let outcome = orch.build(&ctx, windows_build(&env, BuildKind::Package)).await;
  assert_eq!(outcome, Ok(()));

  let out = env.export_dir();
  for file in [
    "game.dll",
    "game.exe",
    "engine.dll",
    "SDL3.dll",
    "freetype.dll",
    "db.bin",
    "data.bin",
    "project_settings.json",
    "assets/level.json",
    "public_engine_assets/font.ttf",
  ] {
    assert!(out.join(file).exists(), "missing {file}");
  }
  assert!(!env.project_dir().join(".build").exists());

  let events = drain(&mut events);
  assert_eq!(events.len(), 2);
  assert!(matches!(events[0], BuildEvent::Started { .. }));
  assert!(matches!(events[1], BuildEvent::Ended { outcome: Ok(()), .. }));

  assert_eq!(orch.runner().calls().len(), 1);
  assert_eq!(env.cooker.calls().len(), 1);
  assert!(!env.cooker.calls()[0].shaders_only);
  assert_eq!(env.host.calls(), vec!["limiter:true", "limiter:false", "reveal"]);

  let timings = ctx.timings();
  assert!(timings.get(Phase::Cook).is_some());
  assert!(timings.get(Phase::Total).is_some());
}

#[tokio::test]
async fn hot_reload_skips_cook_and_project_export() {
  let env = TestEnv::new();
  let orch = env.orchestrator(linking_runner(env.project_dir().join(".build"), 0));
  let ctx = orch.new_context();

  let outcome = orch.build(&ctx, windows_build(&env, BuildKind::HotReload)).await;
  assert_eq!(outcome, Ok(()));

  let out = env.export_dir();
  assert!(out.join("game_Editor.dll").exists());
  assert!(!out.join("db.bin").exists());
  assert!(!out.join("engine.dll").exists());
  assert!(env.cooker.calls().is_empty());
  assert!(ctx.timings().get(Phase::Cook).is_none());
  assert!(!env.host.calls().contains(&"reveal".to_string()));
}

#[tokio::test]
async fn toolchain_failure_is_unknown_and_cleans_up() {
  let env = TestEnv::new();
  let orch = env.orchestrator(linking_runner(env.project_dir().join(".build"), 2));
  let mut events = orch.events().subscribe();
  let ctx = orch.new_context();

  let outcome = orch.build(&ctx, windows_build(&env, BuildKind::Package)).await;
  assert_eq!(outcome, Err(BuildError::Unknown));
  assert!(!env.project_dir().join(".build").exists());
  assert!(!env.export_dir().join("game.exe").exists());

  let events = drain(&mut events);
  assert!(matches!(events.last(), Some(BuildEvent::Ended { outcome: Err(BuildError::Unknown), .. })));
  assert!(ctx.timings().get(Phase::Total).is_some());
}

#[tokio::test]
async fn package_and_run_launches_the_executable() {
  let env = TestEnv::new();
  let orch = env.orchestrator(linking_runner(env.project_dir().join(".build"), 0));
  let ctx = orch.new_context();

  let outcome = orch.build(&ctx, windows_build(&env, BuildKind::PackageAndRun)).await;
  assert_eq!(outcome, Ok(()));

  let launched = orch.runner().detached();
  assert_eq!(launched.len(), 1);
  assert!(launched[0].program.ends_with("game.exe"));
  assert_eq!(launched[0].cwd.as_deref(), Some(env.export_dir().as_path()));
}

#[tokio::test]
async fn missing_toolchain_runs_nothing() {
  let env = TestEnv::new();
  fs::remove_dir_all(env.root().join("vc")).unwrap();
  let out = env.export_dir();
  for file in ["game.dll", "data.bin"] {
    fs::create_dir_all(&out).unwrap();
    fs::write(out.join(file), "previous build").unwrap();
  }
  let orch = env.orchestrator(RecordingRunner::new());
  let ctx = orch.new_context();

  let outcome = orch.build(&ctx, windows_build(&env, BuildKind::Package)).await;
  assert_eq!(outcome, Err(BuildError::ToolchainUnavailable));
  assert!(orch.runner().calls().is_empty());
  assert!(orch.runner().detached().is_empty());
  assert!(env.cooker.calls().is_empty());
  for file in ["game.dll", "data.bin"] {
    assert_eq!(fs::read_to_string(out.join(file)).unwrap(), "previous build");
  }
}

#[tokio::test]
async fn stale_temp_content_is_replaced_on_every_run() {
  let env = TestEnv::new();
  let stale = env.project_dir().join(".build/leftover.obj");
  super::common::touch(&stale);

  let orch = env.orchestrator(linking_runner(env.project_dir().join(".build"), 2));
  let ctx = orch.new_context();

  for _ in 0..2 {
    let outcome = orch.build(&ctx, windows_build(&env, BuildKind::Package)).await;
    assert_eq!(outcome, Err(BuildError::Unknown));
    assert!(!stale.exists());
  }
  assert_eq!(orch.runner().calls().len(), 2);
}
