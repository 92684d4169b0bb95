//! Implementation of the `kiln cache` commands.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use walkdir::WalkDir;

use kiln_lib::cache::CacheManager;
use kiln_lib::config::Config;
use kiln_lib::platform::Platform;

use crate::output::{OutputFormat, format_age, format_bytes, print_info, print_json, print_stat, print_success};

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
  /// Show where the build caches live
  Path {
    /// Only this platform's cache
    #[arg(short, long)]
    platform: Option<Platform>,
  },

  /// Remove build caches
  Clear {
    /// Platform whose cache to remove
    #[arg(short, long, required_unless_present = "all")]
    platform: Option<Platform>,

    /// Remove every platform's cache
    #[arg(long)]
    all: bool,
  },
}

fn dir_size(path: &Path) -> u64 {
  WalkDir::new(path)
    .into_iter()
    .filter_map(|e| e.ok())
    .filter(|e| e.file_type().is_file())
    .filter_map(|e| e.metadata().ok())
    .map(|m| m.len())
    .sum()
}

fn age(path: &Path) -> Option<String> {
  let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
  let elapsed = SystemTime::now().duration_since(modified).ok()?;
  Some(format_age(elapsed))
}

pub fn cmd_cache(command: CacheCommand, config: Config, output: OutputFormat) -> Result<()> {
  let cache = CacheManager::new(config.cache_root());

  match command {
    CacheCommand::Path { platform } => {
      let platforms: Vec<Platform> = match platform {
        Some(p) => vec![p],
        None => Platform::ALL.into_iter().filter(|p| p.is_containerized()).collect(),
      };

      if output.is_json() {
        let entries: Vec<_> = platforms
          .iter()
          .map(|p| {
            let path = cache.path(*p);
            serde_json::json!({
              "platform": p,
              "path": path,
              "exists": cache.exists(*p),
              "size_bytes": dir_size(&path),
            })
          })
          .collect();
        print_json(&serde_json::json!({ "root": cache.root(), "caches": entries }))?;
      } else {
        print_info(&format!("Cache root: {}", cache.root().display()));
        for p in platforms {
          let path = cache.path(p);
          if !cache.exists(p) {
            print_stat(p.as_str(), "empty");
            continue;
          }
          let mut line = format!("{} ({})", path.display(), format_bytes(dir_size(&path)));
          if let Some(age) = age(&path) {
            line.push_str(&format!(", updated {} ago", age));
          }
          print_stat(p.as_str(), &line);
        }
      }
    }
    CacheCommand::Clear { platform, all } => {
      let platforms: Vec<Platform> = match (platform, all) {
        (_, true) => Platform::ALL.into_iter().filter(|p| p.is_containerized()).collect(),
        (Some(p), false) => vec![p],
        (None, false) => bail!("Pass --platform or --all"),
      };

      let mut cleared = Vec::new();
      for p in platforms {
        if cache
          .clear(p)
          .with_context(|| format!("Failed to clear the {} cache", p))?
        {
          cleared.push(p);
        }
      }

      if output.is_json() {
        print_json(&serde_json::json!({ "cleared": cleared }))?;
      } else if cleared.is_empty() {
        print_info("Nothing to clear");
      } else {
        for p in cleared {
          print_success(&format!("Cleared the {} cache", p));
        }
      }
    }
  }
  Ok(())
}
