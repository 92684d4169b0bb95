//! Export folder maintenance.

use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, warn};

use crate::consts::{
  ASSETS_DIR, COOKED_ASSETS_DIR, COOKED_DATA_FILE, COOKED_DB_FILE, ENGINE_RUNTIME_LIB, PROJECT_SETTINGS_FILE,
  PUBLIC_ENGINE_ASSETS_DIR, RUNTIME_DEPENDENCIES,
};
use crate::copy::CopyBatch;
use crate::request::BuildRequest;

/// Files a previous build may have left in the export folder.
pub fn stale_files(request: &BuildRequest) -> Vec<String> {
  let mut files: Vec<String> = RUNTIME_DEPENDENCIES.iter().map(|f| f.to_string()).collect();
  files.push(request.dynamic_library_name());
  files.push(format!("{ENGINE_RUNTIME_LIB}.dll"));
  files.push(COOKED_DATA_FILE.to_string());
  files.push(COOKED_DB_FILE.to_string());
  files.push(PROJECT_SETTINGS_FILE.to_string());
  files
}

/// Remove stale build outputs from the export folder. Absent files are fine.
pub fn clean_export_dir(request: &BuildRequest) {
  for name in stale_files(request) {
    let path = request.export_path.join(&name);
    match fs::remove_file(&path) {
      Ok(()) => debug!(path = %path.display(), "removed stale file"),
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(e) => warn!(path = %path.display(), error = %e, "failed to remove stale file"),
    }
  }
}

/// Copy the cooked project files of a build from `temp` into `export`.
pub fn export_project_files(temp: &Path, export: &Path) -> bool {
  let cooked = temp.join(COOKED_ASSETS_DIR);
  let mut batch = CopyBatch::new();
  batch
    .add_entry(true, cooked.join(ASSETS_DIR), export.join(ASSETS_DIR))
    .add_entry(false, cooked.join(COOKED_DB_FILE), export.join(COOKED_DB_FILE))
    .add_entry(false, cooked.join(COOKED_DATA_FILE), export.join(COOKED_DATA_FILE))
    .add_entry(
      true,
      cooked.join(PUBLIC_ENGINE_ASSETS_DIR),
      export.join(PUBLIC_ENGINE_ASSETS_DIR),
    )
    .add_entry(
      false,
      temp.join(PROJECT_SETTINGS_FILE),
      export.join(PROJECT_SETTINGS_FILE),
    );
  batch.execute_all()
}
