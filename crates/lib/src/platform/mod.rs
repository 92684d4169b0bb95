//! Build targets and their settings.

pub mod paths;
pub mod settings;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use settings::{CommonSettings, PlatformSettings, Ps3Settings, PsVitaSettings, PspSettings, SettingsError, WindowsSettings};

/// Target hardware/OS of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
  Windows,
  Psp,
  PsVita,
  Ps3,
}

impl Platform {
  pub const ALL: [Platform; 4] = [Platform::Windows, Platform::Psp, Platform::PsVita, Platform::Ps3];

  /// Returns the lowercase identifier used in paths, container names and CLI arguments
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Windows => "windows",
      Self::Psp => "psp",
      Self::PsVita => "psvita",
      Self::Ps3 => "ps3",
    }
  }

  /// Whether this platform is compiled inside the build container
  pub fn is_containerized(&self) -> bool {
    !matches!(self, Self::Windows)
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Platform {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Platform::ALL
      .into_iter()
      .find(|p| p.as_str().eq_ignore_ascii_case(s))
      .ok_or_else(|| format!("unknown platform '{}'", s))
  }
}
