//! Well-known names shared across the build pipeline.

pub const APP_NAME: &str = "kiln";

/// Engine runtime library, linked by packaged games.
pub const ENGINE_RUNTIME_LIB: &str = "engine";

/// Engine editor library, linked by hot-reloaded game code.
pub const ENGINE_EDITOR_LIB: &str = "engine_editor";

/// Extension of dynamic libraries produced by the local toolchain.
pub const DYLIB_EXT: &str = "dll";

/// Runtime dependencies shipped next to a packaged Windows game.
pub const RUNTIME_DEPENDENCIES: [&str; 2] = ["SDL3.dll", "freetype.dll"];

pub const PROJECT_SETTINGS_FILE: &str = "project_settings.json";
pub const COOKED_DB_FILE: &str = "db.bin";
pub const COOKED_DATA_FILE: &str = "data.bin";
pub const ASSETS_DIR: &str = "assets";
pub const PUBLIC_ENGINE_ASSETS_DIR: &str = "public_engine_assets";
pub const ENGINE_ASSETS_DIR: &str = "engine_assets";

/// Sub-folder of the temp directory receiving cooked assets.
pub const COOKED_ASSETS_DIR: &str = "cooked_assets";

/// Sub-folder of the temp directory receiving the filtered game source tree.
pub const GAME_SOURCE_DIR: &str = "source";

/// Folder produced by the shader pass and consumed by the container build.
pub const SHADERS_TO_COMPILE_DIR: &str = "shaders_to_compile";

/// Game source file extensions picked up by the toolchains.
pub const SOURCE_EXTENSIONS: [&str; 2] = ["h", "cpp"];

/// Version stamped into the project settings of every build.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Public engine header included by game code.
pub const ENGINE_HEADER: &str = "engine.h";

/// Header hot-reloaded game code includes in place of the runtime entry.
pub const ENGINE_EDITOR_HEADER: &str = "engine_editor.h";

/// Engine headers folder inside `Source/`.
pub const ENGINE_HEADERS_DIR: &str = "engine";

/// Entry point compiled into every packaged game.
pub const ENTRY_FILE: &str = "main.cpp";

pub const DEFAULT_ICON: &str = "logo.ico";
pub const RESOURCE_FILE: &str = "res.rc";
