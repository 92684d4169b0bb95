//! Cross-compiled builds inside the build container.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use kiln_lib::events::BuildEvent;
use kiln_lib::platform::{Platform, PlatformSettings, PsVitaSettings};
use kiln_lib::process::{CommandSpec, RecordingRunner};
use kiln_lib::telemetry::Phase;
use kiln_lib::{BuildError, BuildKind, GameBuild};

use super::common::{TestEnv, drain};

/// Emulates `docker cp <container>:<file> <dst>` for single files.
fn emulate_copy_out(cmd: &CommandSpec) -> io::Result<()> {
  let is_copy_out = cmd.args.first().map(String::as_str) == Some("cp")
    && cmd.args.get(1).is_some_and(|src| src.starts_with("kiln-build-") && !src.ends_with('/'));
  if is_copy_out {
    let dst = Path::new(&cmd.args[2]);
    fs::create_dir_all(dst.parent().unwrap())?;
    fs::write(dst, "")?;
  }
  Ok(())
}

fn container_runner() -> RecordingRunner {
  RecordingRunner::with_handler(|cmd| {
    emulate_copy_out(cmd)?;
    Ok(0)
  })
}

fn starts(runner: &RecordingRunner, container: &str) -> usize {
  runner
    .calls()
    .iter()
    .filter(|c| c.argv() == ["docker", "start", "-a", container])
    .count()
}

fn game(env: &TestEnv, platform: Platform, kind: BuildKind) -> GameBuild {
  GameBuild::new(
    env.project_dir(),
    PlatformSettings::for_platform(platform),
    kind,
    env.export_dir(),
  )
}

#[tokio::test]
async fn psp_package_runs_the_container_and_exports() {
  let env = TestEnv::new();
  let orch = env.orchestrator(container_runner());
  let mut events = orch.events().subscribe();
  let ctx = orch.new_context();

  let outcome = orch.build(&ctx, game(&env, Platform::Psp, BuildKind::Package)).await;
  assert_eq!(outcome, Ok(()));

  let runner = orch.runner();
  assert!(runner.ran(&["docker", "create", "--name", "kiln-build-psp"]));
  assert_eq!(starts(runner, "kiln-build-psp"), 1);

  let lines = runner.lines();
  let create = lines.iter().position(|l| l.starts_with("docker create")).unwrap();
  let start = lines.iter().position(|l| l.starts_with("docker start")).unwrap();
  let game_code = lines.iter().position(|l| l.contains("Source/game_code/")).unwrap();
  assert!(create < game_code && game_code < start);

  let out = env.export_dir();
  for file in ["EBOOT.PBP", "game.prx", "db.bin", "data.bin", "project_settings.json"] {
    assert!(out.join(file).exists(), "missing {file}");
  }
  assert!(!env.project_dir().join(".build").exists());

  let timings = ctx.timings();
  assert!(timings.get(Phase::ContainerPrepare).is_some());
  assert!(timings.get(Phase::ContainerCompile).is_some());
  assert!(timings.get(Phase::ShaderCompile).is_none());

  let events = drain(&mut events);
  assert_eq!(events.len(), 2);
  assert!(matches!(events[1], BuildEvent::Ended { outcome: Ok(()), .. }));
  assert!(env.host.calls().contains(&"reveal".to_string()));
}

#[tokio::test]
async fn shaders_then_package_runs_two_passes() {
  let env = TestEnv::new();
  let orch = env.orchestrator(container_runner());
  let mut events = orch.events().subscribe();
  let ctx = orch.new_context();

  let outcome = orch
    .build(&ctx, game(&env, Platform::Ps3, BuildKind::ShadersThenPackage))
    .await;
  assert_eq!(outcome, Ok(()));

  let runner = orch.runner();
  assert_eq!(starts(runner, "kiln-build-ps3"), 2);
  let creates: Vec<String> = runner
    .lines()
    .into_iter()
    .filter(|l| l.starts_with("docker create"))
    .collect();
  assert_eq!(creates.len(), 2);
  assert!(creates[0].contains("compile_shaders.sh"));
  assert!(creates[1].contains("make -j"));

  let cooks = env.cooker.calls();
  assert_eq!(cooks.len(), 2);
  assert!(cooks[0].shaders_only);
  assert!(!cooks[1].shaders_only);

  let timings = ctx.timings();
  assert!(timings.get(Phase::ShaderCompile).is_some());
  assert!(timings.get(Phase::ContainerCompile).is_some());
  assert!(timings.get(Phase::Total).is_some());

  // The shader pass is intermediate: one start, one end.
  let events = drain(&mut events);
  assert_eq!(events.len(), 2);
  assert_eq!(events[1].request().kind, BuildKind::Package);

  assert!(!env.project_dir().join(".build").exists());
  assert!(!env.project_dir().join(".shaders_build").exists());
  assert!(env.export_dir().join("KilnBuild.self").exists());
}

#[tokio::test]
async fn shader_failure_stops_before_the_package_pass() {
  let env = TestEnv::new();
  let runner = RecordingRunner::with_handler(|cmd| {
    emulate_copy_out(cmd)?;
    Ok(if cmd.argv().starts_with(&["docker", "start"]) { 1 } else { 0 })
  });
  let orch = env.orchestrator(runner);
  let mut events = orch.events().subscribe();
  let ctx = orch.new_context();

  let outcome = orch
    .build(&ctx, game(&env, Platform::Ps3, BuildKind::ShadersThenPackage))
    .await;
  assert_eq!(outcome, Err(BuildError::ContainerShaderCompile));
  assert_eq!(starts(orch.runner(), "kiln-build-ps3"), 1);
  assert_eq!(env.cooker.calls().len(), 1);

  let events = drain(&mut events);
  assert_eq!(events.len(), 2);
  assert!(matches!(
    events[1],
    BuildEvent::Ended {
      outcome: Err(BuildError::ContainerShaderCompile),
      ..
    }
  ));
  assert!(!env.project_dir().join(".shaders_build").exists());
}

#[tokio::test]
async fn missing_runtime_opens_the_container_settings() {
  let env = TestEnv::new();
  let runner = RecordingRunner::with_handler(|cmd| Ok(if cmd.argv() == ["docker"] { 1 } else { 0 }));
  let orch = env.orchestrator(runner);
  let ctx = orch.new_context();

  let outcome = orch.build(&ctx, game(&env, Platform::Psp, BuildKind::Package)).await;
  assert_eq!(outcome, Err(BuildError::ContainerRuntimeNotFound));
  assert_eq!(orch.runner().calls().len(), 1);
  assert!(env.host.calls().contains(&"container-settings".to_string()));
}

#[tokio::test]
async fn runtime_started_on_demand() {
  let env = TestEnv::new();
  let probes = Arc::new(AtomicUsize::new(0));
  let counter = Arc::clone(&probes);
  let runner = RecordingRunner::with_handler(move |cmd| {
    emulate_copy_out(cmd)?;
    if cmd.argv() == ["docker", "ps"] && counter.fetch_add(1, Ordering::SeqCst) == 0 {
      return Ok(1);
    }
    Ok(0)
  });
  let orch = env.orchestrator(runner);
  let ctx = orch.new_context();

  let outcome = orch.build(&ctx, game(&env, Platform::Psp, BuildKind::Package)).await;
  assert_eq!(outcome, Ok(()));
  assert_eq!(orch.runner().detached().len(), 1);
  assert!(probes.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn vita_package_embeds_project_files() {
  let env = TestEnv::new();
  let orch = env.orchestrator(container_runner());
  let ctx = orch.new_context();

  let settings = PlatformSettings::PsVita(PsVitaSettings {
    title_id: "KILN00001".to_string(),
    ..PsVitaSettings::default()
  });
  let build = GameBuild::new(env.project_dir(), settings, BuildKind::Package, env.export_dir());

  let outcome = orch.build(&ctx, build).await;
  assert_eq!(outcome, Ok(()));

  let out = env.export_dir();
  assert!(out.join("game.vpk").exists());
  assert!(!out.join("db.bin").exists());
  assert!(orch.runner().ran(&["docker", "create", "--name", "kiln-build-psvita"]));

  let cooked_assets = env.project_dir().join(".build/cooked_assets/assets");
  let cooked_assets = cooked_assets.to_string_lossy();
  assert!(orch.runner().ran(&["docker", "cp", &cooked_assets, "kiln-build-psvita:/home/KilnBuild/"]));
  assert!(!orch.runner().ran(&["docker", "cp", &env.project_dir().join(".build/assets").to_string_lossy()]));
}

#[tokio::test]
async fn psp_run_needs_the_emulator() {
  let env = TestEnv::new();
  let orch = env.orchestrator(container_runner());
  let ctx = orch.new_context();

  let outcome = orch
    .build(&ctx, game(&env, Platform::Psp, BuildKind::PackageAndRun))
    .await;
  assert_eq!(outcome, Err(BuildError::ToolchainUnavailable));
  assert!(orch.runner().calls().is_empty());

  super::common::touch(&env.root().join("ppsspp.exe"));
  let outcome = orch
    .build(&ctx, game(&env, Platform::Psp, BuildKind::PackageAndRun))
    .await;
  assert_eq!(outcome, Ok(()));

  let launched = orch.runner().detached();
  assert_eq!(launched.len(), 1);
  assert!(launched[0].program.ends_with("ppsspp.exe"));
  assert!(launched[0].args[0].ends_with("EBOOT.PBP"));
}
