//! Engine and project path resolution.
//!
//! The engine runs either from an installed layout, where headers, sources
//! and compiled libraries all live in the install directory, or from a
//! source checkout, where the sources live in a sibling project folder.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::config::Config;

/// Sibling folder holding the engine project in a source checkout.
const SOURCE_CHECKOUT_DIR: &str = "engine";

/// File identifying [`SOURCE_CHECKOUT_DIR`] as an engine project.
const SOURCE_CHECKOUT_MARKER: &str = "engine.vcxproj";

/// Resolved engine locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineLayout {
  /// Where the compiled engine libraries, entry file and build descriptors live.
  pub install_dir: PathBuf,
  /// Where `Source/` and `include/` live.
  pub project_dir: PathBuf,
  pub source_checkout: bool,
}

impl EngineLayout {
  /// Resolve from the configured engine dir, or the current directory.
  pub fn resolve(config: &Config) -> io::Result<Self> {
    let root = std::env::current_dir()?;
    let install_dir = match &config.engine_dir {
      Some(dir) => make_absolute(dir, &root),
      None => root,
    };
    Ok(Self::detect(&install_dir))
  }

  /// Detect the layout around an install directory.
  pub fn detect(install_dir: &Path) -> Self {
    let install_dir = normalize(&dunce::canonicalize(install_dir).unwrap_or_else(|_| install_dir.to_path_buf()));

    let checkout = install_dir
      .parent()
      .map(|parent| parent.join(SOURCE_CHECKOUT_DIR))
      .filter(|dir| dir.join(SOURCE_CHECKOUT_MARKER).exists());

    let layout = match checkout {
      Some(project_dir) => Self {
        install_dir,
        project_dir,
        source_checkout: true,
      },
      None => Self {
        project_dir: install_dir.clone(),
        install_dir,
        source_checkout: false,
      },
    };

    debug!(
      install = %layout.install_dir.display(),
      project = %layout.project_dir.display(),
      source_checkout = layout.source_checkout,
      "resolved engine layout"
    );
    layout
  }

  pub fn source_dir(&self) -> PathBuf {
    self.project_dir.join("Source")
  }

  pub fn include_dir(&self) -> PathBuf {
    self.project_dir.join("include")
  }
}

/// Make `path` absolute relative to `root`.
pub fn make_absolute(path: &Path, root: &Path) -> PathBuf {
  if path.is_absolute() {
    path.to_path_buf()
  } else {
    root.join(path)
  }
}

/// Convert Windows separators to forward slashes.
pub fn normalize(path: &Path) -> PathBuf {
  PathBuf::from(path.to_string_lossy().replace('\\', "/"))
}

/// Whether `a` and `b` name the same folder once made absolute against `root`.
pub fn same_dir(a: &Path, b: &Path, root: &Path) -> bool {
  let resolve = |p: &Path| {
    let abs = make_absolute(p, root);
    normalize(&dunce::canonicalize(&abs).unwrap_or(abs))
  };
  resolve(a).components().eq(resolve(b).components())
}
