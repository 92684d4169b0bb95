//! Batched file copies.
//!
//! Entries are queued and applied together. Each entry is attempted even if
//! an earlier one failed; the batch reports a single success flag.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::consts::SOURCE_EXTENSIONS;

#[derive(Debug, Clone, PartialEq, Eq)]
struct CopyEntry {
  recursive: bool,
  src: PathBuf,
  dst: PathBuf,
}

/// Queue of copy operations applied by [`CopyBatch::execute_all`].
#[derive(Debug, Default)]
pub struct CopyBatch {
  entries: Vec<CopyEntry>,
}

impl CopyBatch {
  pub fn new() -> Self {
    Self::default()
  }

  /// Queue a copy. `recursive` copies a directory tree into `dst`.
  pub fn add_entry(&mut self, recursive: bool, src: impl Into<PathBuf>, dst: impl Into<PathBuf>) -> &mut Self {
    self.entries.push(CopyEntry {
      recursive,
      src: src.into(),
      dst: dst.into(),
    });
    self
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Apply and drain every queued entry. Returns `false` if any entry failed.
  pub fn execute_all(&mut self) -> bool {
    let mut ok = true;
    for entry in self.entries.drain(..) {
      let result = if entry.recursive {
        copy_dir_all(&entry.src, &entry.dst)
      } else {
        copy_file(&entry.src, &entry.dst)
      };
      match result {
        Ok(()) => debug!(src = %entry.src.display(), dst = %entry.dst.display(), "copied"),
        Err(e) => {
          warn!(src = %entry.src.display(), dst = %entry.dst.display(), error = %e, "copy failed");
          ok = false;
        }
      }
    }
    ok
  }
}

fn copy_file(src: &Path, dst: &Path) -> io::Result<()> {
  if let Some(parent) = dst.parent() {
    fs::create_dir_all(parent)?;
  }
  fs::copy(src, dst).map(drop)
}

/// Copy the contents of `src` into `dst`, creating directories as needed.
pub fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<()> {
  if !src.is_dir() {
    return Err(io::Error::new(
      io::ErrorKind::NotFound,
      format!("not a directory: {}", src.display()),
    ));
  }

  for entry in WalkDir::new(src) {
    let entry = entry.map_err(io::Error::other)?;
    let relative = entry.path().strip_prefix(src).map_err(io::Error::other)?;
    let target = dst.join(relative);
    if entry.file_type().is_dir() {
      fs::create_dir_all(&target)?;
    } else {
      copy_file(entry.path(), &target)?;
    }
  }
  Ok(())
}

/// Mirror the game's source files into `dest_root`.
///
/// Only header and implementation files are copied; the relative folder
/// structure is preserved. Returns the distinct destination folders that
/// received at least one file, in sorted order, so callers can pass one
/// source glob per folder to toolchains that do not recurse.
pub fn copy_game_source(source_root: &Path, dest_root: &Path) -> io::Result<Vec<PathBuf>> {
  fs::create_dir_all(dest_root)?;

  let mut folders = BTreeSet::new();
  for entry in WalkDir::new(source_root) {
    let entry = entry.map_err(io::Error::other)?;
    if !entry.file_type().is_file() || !is_source_file(entry.path()) {
      continue;
    }

    let relative = entry.path().strip_prefix(source_root).map_err(io::Error::other)?;
    let target = dest_root.join(relative);
    let folder = target.parent().unwrap_or(dest_root).to_path_buf();
    fs::create_dir_all(&folder)?;
    fs::copy(entry.path(), &target)?;
    folders.insert(folder);
  }

  debug!(count = folders.len(), dest = %dest_root.display(), "copied game source");
  Ok(folders.into_iter().collect())
}

fn is_source_file(path: &Path) -> bool {
  path
    .extension()
    .and_then(|e| e.to_str())
    .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}
