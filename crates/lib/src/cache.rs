//! Persistent per-platform build caches.
//!
//! Layout:
//!
//! ```text
//! {cache_root}/
//! ├── psp/build/      # intermediate build tree of the last psp build
//! ├── psvita/build/
//! └── ps3/build/
//! ```
//!
//! A cache is replaced wholesale after each successful compile. Callers must
//! not update the same platform's cache from two builds at once; the build
//! lock takes care of that for orchestrated builds.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::copy::copy_dir_all;
use crate::platform::Platform;

/// Directory name of the build tree inside a platform cache.
pub const CACHE_BUILD_DIR: &str = "build";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheManager {
  root: PathBuf,
}

impl CacheManager {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Cache directory of a platform.
  pub fn path(&self, platform: Platform) -> PathBuf {
    self.root.join(platform.as_str())
  }

  /// Cached build tree of a platform.
  pub fn build_dir(&self, platform: Platform) -> PathBuf {
    self.path(platform).join(CACHE_BUILD_DIR)
  }

  pub fn exists(&self, platform: Platform) -> bool {
    self.build_dir(platform).is_dir()
  }

  /// Replace the platform's cache with a freshly staged directory.
  ///
  /// `staged` holds the new cache content (a `build/` tree). The previous
  /// cache is removed first; nothing is merged.
  pub fn update(&self, staged: &Path, platform: Platform) -> io::Result<()> {
    let target = self.path(platform);
    remove_if_exists(&target)?;
    fs::create_dir_all(&self.root)?;

    if fs::rename(staged, &target).is_err() {
      debug!(staged = %staged.display(), "rename failed, copying cache");
      copy_dir_all(staged, &target)?;
    }

    info!(platform = %platform, path = %target.display(), "build cache updated");
    Ok(())
  }

  /// Remove a platform's cache.
  pub fn clear(&self, platform: Platform) -> io::Result<bool> {
    let target = self.path(platform);
    let existed = target.exists();
    remove_if_exists(&target)?;
    Ok(existed)
  }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
  match fs::remove_dir_all(path) {
    Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
    _ => Ok(()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn stage(dir: &Path, file: &str) -> PathBuf {
    let staged = dir.join("staged");
    fs::create_dir_all(staged.join(CACHE_BUILD_DIR)).unwrap();
    fs::write(staged.join(CACHE_BUILD_DIR).join(file), file).unwrap();
    staged
  }

  #[test]
  fn cache_is_per_platform() {
    let cache = CacheManager::new("/cache");
    assert_eq!(cache.path(Platform::Psp), PathBuf::from("/cache/psp"));
    assert_eq!(cache.build_dir(Platform::Ps3), PathBuf::from("/cache/ps3/build"));
  }

  #[test]
  fn update_creates_cache() {
    let temp = TempDir::new().unwrap();
    let cache = CacheManager::new(temp.path().join("cache"));
    assert!(!cache.exists(Platform::Psp));

    let staged = stage(temp.path(), "main.o");
    cache.update(&staged, Platform::Psp).unwrap();

    assert!(cache.exists(Platform::Psp));
    assert!(cache.build_dir(Platform::Psp).join("main.o").exists());
    assert!(!cache.exists(Platform::PsVita));
  }

  #[test]
  fn update_replaces_instead_of_merging() {
    let temp = TempDir::new().unwrap();
    let cache = CacheManager::new(temp.path().join("cache"));

    let first = stage(&temp.path().join("one"), "old.o");
    cache.update(&first, Platform::Ps3).unwrap();
    let second = stage(&temp.path().join("two"), "new.o");
    cache.update(&second, Platform::Ps3).unwrap();

    assert!(cache.build_dir(Platform::Ps3).join("new.o").exists());
    assert!(!cache.build_dir(Platform::Ps3).join("old.o").exists());
  }

  #[test]
  fn clear_reports_whether_cache_existed() {
    let temp = TempDir::new().unwrap();
    let cache = CacheManager::new(temp.path());
    assert!(!cache.clear(Platform::Psp).unwrap());

    let staged = stage(temp.path(), "x.o");
    cache.update(&staged, Platform::Psp).unwrap();
    assert!(cache.clear(Platform::Psp).unwrap());
    assert!(!cache.exists(Platform::Psp));
  }
}
