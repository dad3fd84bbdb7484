//! d2w Core - Foundational Types
//!
//! Errors, configuration and the validated names shared by the conversion
//! runtime and the command-line front end.

pub mod config;
pub mod error;
pub mod name;
pub mod run;

// Re-export commonly used types
pub use config::ConvertConfig;
pub use error::{ConvertError, PipelineStage, Result, StageContext};
pub use name::DistributionName;
pub use run::RunId;

/// d2w version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
