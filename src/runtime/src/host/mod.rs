//! Host virtualization subsystem access.
//!
//! [`DistributionHost`] covers the two host surfaces the conversion uses:
//! the `wsl.exe` command line (fast import, set-default) and the native
//! registration primitive (register, unregister, interactive launch).

mod native;
pub mod wsl;

use std::path::Path;

use async_trait::async_trait;

use d2w_core::error::Result;

pub use wsl::WslHost;

/// Captured result of a host command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was terminated by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// One-line description for logs and error messages.
    pub fn summary(&self) -> String {
        let status = match self.status {
            Some(code) => format!("exit code {code}"),
            None => "terminated".to_string(),
        };
        let detail = [self.stderr.trim(), self.stdout.trim()]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(|s| s.lines().collect::<Vec<_>>().join(" "));
        match detail {
            Some(detail) => format!("{status}: {detail}"),
            None => status,
        }
    }
}

/// Operations the importer and configurator need from the host.
#[async_trait]
pub trait DistributionHost: Send + Sync {
    /// Unregister `name`, deleting its storage.
    ///
    /// Returns `DistributionNotFound` when nothing is registered under it.
    async fn unregister(&self, name: &str) -> Result<()>;

    /// Register `name` from an archive through the native primitive.
    async fn register(&self, name: &str, archive: &Path) -> Result<()>;

    /// Run the native fast import, capturing its output.
    async fn fast_import(
        &self,
        name: &str,
        install_dir: &Path,
        archive: &Path,
        version: u8,
    ) -> Result<CommandOutput>;

    /// Mark `name` as the default distribution.
    async fn set_default(&self, name: &str) -> Result<()>;

    /// Open an interactive session, blocking until it ends.
    async fn launch_interactive(&self, name: &str) -> Result<()>;
}
