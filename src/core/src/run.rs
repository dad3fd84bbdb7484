//! Per-run identifiers.
//!
//! Every conversion derives its archive path, throwaway container name and
//! build tag from one `RunId`, so two runs on the same machine never collide
//! on those resources.

use std::fmt;
use std::path::{Path, PathBuf};

/// Prefix shared by per-run resource names.
const RUN_PREFIX: &str = "d2w";

/// Short random identifier for a single conversion run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(String);

impl RunId {
    /// Generate a fresh identifier (first 12 hex chars of a v4 UUID).
    pub fn generate() -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        Self(id.chars().take(12).collect())
    }

    /// Use a caller-chosen identifier.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of this run's export archive inside `work_dir`.
    pub fn archive_path(&self, work_dir: &Path) -> PathBuf {
        work_dir.join(format!("{RUN_PREFIX}-{}.tar", self.0))
    }

    /// Name of this run's throwaway container.
    pub fn container_name(&self) -> String {
        format!("{RUN_PREFIX}-{}", self.0)
    }

    /// Tag for an image built during this run.
    pub fn build_tag(&self, repository: &str) -> String {
        format!("{repository}:{}", self.0)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
