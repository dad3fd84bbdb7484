//! d2w Runtime - container image to WSL distribution conversion.
//!
//! This crate drives the image engine (build, pull, export), registers the
//! exported filesystem with the host, and applies post-import configuration.

#![allow(clippy::result_large_err)]

pub mod configure;
pub mod engine;
pub mod export;
pub mod host;
pub mod import;
pub mod pipeline;
pub mod reference;
pub mod shortcut;
pub mod source;

#[cfg(test)]
mod testing;

// Re-export common types
pub use configure::{Configurator, PostImportTask, TaskOutcome};
pub use engine::{DockerEngine, EngineEndpoint, ImageEngine};
pub use export::{export_image, ExportArchive};
pub use host::{CommandOutput, DistributionHost, WslHost};
pub use import::{registration_key, storage_dir_name, ImportMethod, Importer};
pub use pipeline::{ConversionReport, ConversionRequest, Pipeline};
pub use reference::ImageReference;
pub use shortcut::{LnkWriter, Shortcut, ShortcutWriter};
pub use source::{resolve_image, ImageSource};

/// d2w runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
