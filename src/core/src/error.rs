use std::fmt;

use thiserror::Error;

/// Pipeline stage an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Building or pulling the container image
    ResolveImage,
    /// Flattening the image filesystem into an archive
    ExportImage,
    /// Registering the archive as a distribution
    ImportDistribution,
    /// Marking the distribution as the host default
    SetDefault,
    /// Writing the Start Menu shortcut
    CreateShortcut,
    /// Starting an interactive session
    LaunchDistribution,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineStage::ResolveImage => "resolve image",
            PipelineStage::ExportImage => "export image",
            PipelineStage::ImportDistribution => "import distribution",
            PipelineStage::SetDefault => "set default distribution",
            PipelineStage::CreateShortcut => "create Start Menu shortcut",
            PipelineStage::LaunchDistribution => "launch distribution",
        };
        f.write_str(s)
    }
}

/// d2w error types
#[derive(Error, Debug)]
pub enum ConvertError {
    /// The image engine endpoint could not be reached
    #[error("Image engine unavailable at {endpoint}: {message}")]
    EngineUnavailable { endpoint: String, message: String },

    /// The image engine answered with a non-success status
    #[error("Image engine error: {status} - {message}")]
    EngineApi { status: u16, message: String },

    /// Image build reported an error
    #[error("Build error: {0}")]
    BuildError(String),

    /// Image pull reported an error
    #[error("Pull error: {0}")]
    PullError(String),

    /// Throwaway container could not be created
    #[error("Failed to create container: {0}")]
    ContainerCreateError(String),

    /// Container filesystem export failed
    #[error("Failed to export container: {0}")]
    ExportError(String),

    /// Throwaway container could not be removed
    #[error("Failed to remove container {container}: {message}")]
    ContainerRemoveError { container: String, message: String },

    /// Export archive could not be written
    #[error("Archive error: {path} - {message}")]
    ArchiveError { path: String, message: String },

    /// Host import command failed
    #[error("Import error: {0}")]
    ImportError(String),

    /// Fallback registration primitive failed
    #[error("Registration of '{name}' failed: {message}")]
    RegisterError { name: String, message: String },

    /// No distribution is registered under this name
    #[error("Distribution not found: {0}")]
    DistributionNotFound(String),

    /// Host command (set-default, unregister) failed
    #[error("Host command failed: {command} - {message}")]
    HostCommandError { command: String, message: String },

    /// Shortcut could not be written
    #[error("Shortcut error: {0}")]
    ShortcutError(String),

    /// Interactive session failed to start
    #[error("Launch error: {0}")]
    LaunchError(String),

    /// Image reference could not be parsed
    #[error("Invalid image reference: {0}")]
    InvalidReference(String),

    /// Distribution name is not usable as a key and directory segment
    #[error("Invalid distribution name '{name}': {reason}")]
    InvalidDistributionName { name: String, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Operation not available on this host
    #[error("Unsupported on this host: {0}")]
    Unsupported(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An error annotated with the pipeline stage it came from
    #[error("failed to {stage}: {source}")]
    Stage {
        stage: PipelineStage,
        #[source]
        source: Box<ConvertError>,
    },
}

impl ConvertError {
    /// Strip stage annotations and return the underlying error.
    pub fn root_cause(&self) -> &ConvertError {
        match self {
            ConvertError::Stage { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// The outermost stage annotation, if any.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            ConvertError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConvertError {
    fn from(err: serde_json::Error) -> Self {
        ConvertError::SerializationError(err.to_string())
    }
}

/// Result type alias for d2w operations
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Attach a [`PipelineStage`] to an error result.
pub trait StageContext<T> {
    fn stage(self, stage: PipelineStage) -> Result<T>;
}

impl<T> StageContext<T> for Result<T> {
    fn stage(self, stage: PipelineStage) -> Result<T> {
        self.map_err(|source| ConvertError::Stage {
            stage,
            source: Box::new(source),
        })
    }
}
