//! kiln-lib: build and release orchestration for engine projects
//!
//! This crate turns a project's sources and cooked assets into a package for
//! a target platform:
//! - `Orchestrator`: the build pipeline, from request validation to the
//!   "build ended" event
//! - `LocalToolchainStrategy`: host builds with the native toolchain
//! - `ContainerOrchestrator`: cross-compilation inside a build container
//! - `BuildContext`: per-build cancellation flag, strategy and phase timings

pub mod availability;
pub mod build_lock;
pub mod cache;
pub mod collab;
pub mod config;
pub mod consts;
pub mod container;
pub mod context;
pub mod copy;
pub mod events;
pub mod export;
pub mod layout;
pub mod orchestrator;
pub mod outcome;
pub mod platform;
pub mod process;
pub mod request;
pub mod telemetry;
pub mod toolchain;

pub use orchestrator::{BuildHandle, Orchestrator};
pub use outcome::{BuildError, BuildOutcome};
pub use request::{BuildKind, BuildRequest, GameBuild};
