//! Shared fixtures for pipeline tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use kiln_lib::collab::{AssetCooker, BuildHost, CookOptions};
use kiln_lib::config::{Config, ContainerConfig, ToolchainConfig};
use kiln_lib::events::BuildEvent;
use kiln_lib::layout::EngineLayout;
use kiln_lib::process::RecordingRunner;
use kiln_lib::Orchestrator;
use tempfile::TempDir;
use tokio::sync::broadcast;

pub fn touch(path: &Path) {
  fs::create_dir_all(path.parent().unwrap()).unwrap();
  fs::write(path, "").unwrap();
}

/// Cooker producing the files a real cook leaves behind.
#[derive(Default)]
pub struct StubCooker {
  pub calls: Mutex<Vec<CookOptions>>,
}

impl StubCooker {
  pub fn calls(&self) -> Vec<CookOptions> {
    self.calls.lock().unwrap().clone()
  }
}

impl AssetCooker for StubCooker {
  fn cook(&self, options: &CookOptions) -> bool {
    self.calls.lock().unwrap().push(options.clone());
    let out = &options.export_dir;
    touch(&out.join("assets/level.json"));
    touch(&out.join("public_engine_assets/font.ttf"));
    touch(&out.join("db.bin"));
    touch(&out.join("data.bin"));
    true
  }
}

/// Host recording every side effect.
#[derive(Default)]
pub struct SpyHost {
  pub calls: Mutex<Vec<String>>,
}

impl SpyHost {
  pub fn calls(&self) -> Vec<String> {
    self.calls.lock().unwrap().clone()
  }
}

impl BuildHost for SpyHost {
  fn set_work_limiter(&self, enabled: bool) {
    self.calls.lock().unwrap().push(format!("limiter:{enabled}"));
  }

  fn open_container_settings(&self) {
    self.calls.lock().unwrap().push("container-settings".to_string());
  }

  fn reveal_folder(&self, _path: &Path) {
    self.calls.lock().unwrap().push("reveal".to_string());
  }
}

/// Isolated engine install, toolchain and project.
pub struct TestEnv {
  pub temp: TempDir,
  pub cooker: Arc<StubCooker>,
  pub host: Arc<SpyHost>,
}

impl TestEnv {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let root = temp.path();

    let engine = root.join("engine");
    for file in [
      "engine.lib",
      "engine.dll",
      "engine_editor.lib",
      "engine_editor.dll",
      "SDL3.dll",
      "freetype.dll",
      "main.cpp",
      "logo.ico",
      "res.rc",
      "CMakeLists.txt",
      "Makefile.PS3",
      "Source/engine.h",
      "Source/engine_editor.h",
      "Source/engine/core.h",
      "include/glm/glm.hpp",
    ] {
      touch(&engine.join(file));
    }
    fs::write(engine.join("compile_shaders.sh"), "#!/bin/bash\r\necho shaders\r\n").unwrap();

    for file in ["vcvars64.bat", "vcvars32.bat"] {
      touch(&root.join("vc").join(file));
    }

    touch(&root.join("proj/assets/player.cpp"));
    touch(&root.join("proj/assets/ai/enemy.h"));
    touch(&root.join("proj/assets/level.json"));

    Self {
      temp,
      cooker: Arc::new(StubCooker::default()),
      host: Arc::new(SpyHost::default()),
    }
  }

  pub fn root(&self) -> PathBuf {
    dunce::canonicalize(self.temp.path()).unwrap()
  }

  pub fn project_dir(&self) -> PathBuf {
    self.root().join("proj")
  }

  pub fn export_dir(&self) -> PathBuf {
    self.root().join("out")
  }

  pub fn config(&self) -> Config {
    let root = self.root();
    Config {
      engine_dir: Some(root.join("engine")),
      toolchain: ToolchainConfig {
        install_dir: root.join("vc"),
      },
      container: ContainerConfig {
        start_poll_attempts: 2,
        start_poll_interval_ms: 0,
        start_grace_ms: 0,
        ..ContainerConfig::default()
      },
      emulator_path: root.join("ppsspp.exe"),
      cache_dir: Some(root.join("cache")),
      cook_command: Vec::new(),
    }
  }

  pub fn orchestrator(&self, runner: RecordingRunner) -> Orchestrator<RecordingRunner> {
    let layout = EngineLayout::detect(&self.root().join("engine"));
    Orchestrator::new(Arc::new(runner), self.config(), layout)
      .with_cooker(self.cooker.clone())
      .with_host(self.host.clone())
  }
}

/// Drain every event published so far.
pub fn drain(events: &mut broadcast::Receiver<BuildEvent>) -> Vec<BuildEvent> {
  let mut out = Vec::new();
  while let Ok(event) = events.try_recv() {
    out.push(event);
  }
  out
}
