//! Per-platform build settings.
//!
//! Each target carries its own payload; the orchestrator matches on the
//! variant once and hands the typed payload to the strategy that needs it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Platform;

/// Length of a PsVita title id (e.g. `KILN00001`).
const TITLE_ID_LEN: usize = 9;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettingsError {
  #[error("title id must be exactly {TITLE_ID_LEN} characters, got {0}")]
  TitleIdLength(usize),

  #[error("title id may only contain A-Z and 0-9: {0}")]
  TitleIdCharacters(String),
}

/// Settings shared by every platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonSettings {
  pub debug: bool,
  pub profiler: bool,
  pub use_build_cache: bool,
}

impl Default for CommonSettings {
  fn default() -> Self {
    Self {
      debug: false,
      profiler: false,
      use_build_cache: true,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowsSettings {
  #[serde(flatten)]
  pub common: CommonSettings,
  /// Custom `.ico` file; the engine default is used when unset.
  pub icon: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PspSettings {
  #[serde(flatten)]
  pub common: CommonSettings,
  pub icon_image: Option<PathBuf>,
  pub background_image: Option<PathBuf>,
  pub preview_image: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PsVitaSettings {
  #[serde(flatten)]
  pub common: CommonSettings,
  pub icon_image: Option<PathBuf>,
  pub background_image: Option<PathBuf>,
  pub startup_image: Option<PathBuf>,
  pub title_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ps3Settings {
  #[serde(flatten)]
  pub common: CommonSettings,
}

/// Settings payload of a build, one variant per [`Platform`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "lowercase")]
pub enum PlatformSettings {
  Windows(WindowsSettings),
  Psp(PspSettings),
  PsVita(PsVitaSettings),
  Ps3(Ps3Settings),
}

impl PlatformSettings {
  /// Default settings for a platform.
  pub fn for_platform(platform: Platform) -> Self {
    match platform {
      Platform::Windows => Self::Windows(WindowsSettings::default()),
      Platform::Psp => Self::Psp(PspSettings::default()),
      Platform::PsVita => Self::PsVita(PsVitaSettings::default()),
      Platform::Ps3 => Self::Ps3(Ps3Settings::default()),
    }
  }

  pub fn platform(&self) -> Platform {
    match self {
      Self::Windows(_) => Platform::Windows,
      Self::Psp(_) => Platform::Psp,
      Self::PsVita(_) => Platform::PsVita,
      Self::Ps3(_) => Platform::Ps3,
    }
  }

  pub fn common(&self) -> &CommonSettings {
    match self {
      Self::Windows(s) => &s.common,
      Self::Psp(s) => &s.common,
      Self::PsVita(s) => &s.common,
      Self::Ps3(s) => &s.common,
    }
  }

  pub fn common_mut(&mut self) -> &mut CommonSettings {
    match self {
      Self::Windows(s) => &mut s.common,
      Self::Psp(s) => &mut s.common,
      Self::PsVita(s) => &mut s.common,
      Self::Ps3(s) => &mut s.common,
    }
  }

  /// Checks the fields the toolchains cannot recover from.
  pub fn validate(&self) -> Result<(), SettingsError> {
    match self {
      Self::PsVita(s) => validate_title_id(&s.title_id),
      Self::Windows(_) | Self::Psp(_) | Self::Ps3(_) => Ok(()),
    }
  }

  /// Custom images injected into the container, as `(source, file name in the image folder)`.
  pub fn custom_images(&self) -> Vec<(&Path, &'static str)> {
    let images: Vec<(Option<&PathBuf>, &'static str)> = match self {
      Self::Psp(s) => vec![
        (s.background_image.as_ref(), "BG.PNG"),
        (s.icon_image.as_ref(), "ICON.PNG"),
        (s.preview_image.as_ref(), "PREVIEW.PNG"),
      ],
      Self::PsVita(s) => vec![
        (s.background_image.as_ref(), "bg.png"),
        (s.icon_image.as_ref(), "icon0.png"),
        (s.startup_image.as_ref(), "startup.png"),
      ],
      Self::Windows(_) | Self::Ps3(_) => Vec::new(),
    };

    images
      .into_iter()
      .filter_map(|(path, name)| path.map(|p| (p.as_path(), name)))
      .collect()
  }
}

fn validate_title_id(title_id: &str) -> Result<(), SettingsError> {
  if title_id.len() != TITLE_ID_LEN {
    return Err(SettingsError::TitleIdLength(title_id.len()));
  }
  if !title_id.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
    return Err(SettingsError::TitleIdCharacters(title_id.to_string()));
  }
  Ok(())
}
