//! WSL host backend.
//!
//! Command-line operations go through `wsl.exe`; registration and
//! interactive launch use the native API on the blocking pool.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;

use d2w_core::error::{ConvertError, Result};

use super::{native, CommandOutput, DistributionHost};

/// Default launcher executable.
pub const WSL_EXE: &str = "wsl.exe";

/// Host backed by the Windows Subsystem for Linux.
#[derive(Debug, Clone)]
pub struct WslHost {
    program: PathBuf,
}

impl Default for WslHost {
    fn default() -> Self {
        Self::new(WSL_EXE)
    }
}

impl WslHost {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: &[&OsStr]) -> std::io::Result<CommandOutput> {
        tracing::debug!(program = %self.program.display(), ?args, "Running host command");
        let output = Command::new(&self.program).args(args).output().await?;
        Ok(capture(output))
    }

    async fn blocking<T, F>(call: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        tokio::task::spawn_blocking(f)
            .await
            .map_err(|e| ConvertError::HostCommandError {
                command: call.to_string(),
                message: e.to_string(),
            })?
    }
}

fn capture(output: Output) -> CommandOutput {
    CommandOutput {
        status: output.status.code(),
        stdout: decode_output(&output.stdout),
        stderr: decode_output(&output.stderr),
    }
}

/// Decode `wsl.exe` output, which is UTF-16LE for most messages.
pub fn decode_output(bytes: &[u8]) -> String {
    let looks_utf16 = bytes.len() >= 2
        && bytes.len() % 2 == 0
        && bytes.iter().skip(1).step_by(2).filter(|&&b| b == 0).count() * 2 >= bytes.len() / 2;

    let text = if looks_utf16 {
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    };

    text.trim_start_matches('\u{feff}').trim().to_string()
}

#[async_trait]
impl DistributionHost for WslHost {
    async fn unregister(&self, name: &str) -> Result<()> {
        let name = name.to_string();
        Self::blocking("WslUnregisterDistribution", move || native::unregister(&name)).await
    }

    async fn register(&self, name: &str, archive: &Path) -> Result<()> {
        let name = name.to_string();
        let archive = archive.to_path_buf();
        Self::blocking("WslRegisterDistribution", move || {
            native::register(&name, &archive)
        })
        .await
    }

    async fn fast_import(
        &self,
        name: &str,
        install_dir: &Path,
        archive: &Path,
        version: u8,
    ) -> Result<CommandOutput> {
        let version = version.to_string();
        let args: [&OsStr; 6] = [
            OsStr::new("--import"),
            OsStr::new(name),
            install_dir.as_os_str(),
            archive.as_os_str(),
            OsStr::new("--version"),
            OsStr::new(&version),
        ];
        self.run(&args)
            .await
            .map_err(|e| ConvertError::ImportError(format!("failed to run {}: {e}", self.program.display())))
    }

    async fn set_default(&self, name: &str) -> Result<()> {
        let command = format!("{} --set-default {name}", self.program.display());
        let output = self
            .run(&[OsStr::new("--set-default"), OsStr::new(name)])
            .await
            .map_err(|e| ConvertError::HostCommandError {
                command: command.clone(),
                message: e.to_string(),
            })?;

        if !output.success() {
            return Err(ConvertError::HostCommandError {
                command,
                message: output.summary(),
            });
        }
        Ok(())
    }

    async fn launch_interactive(&self, name: &str) -> Result<()> {
        let owned = name.to_string();
        let exit_code =
            Self::blocking("WslLaunchInteractive", move || native::launch_interactive(&owned)).await?;
        tracing::debug!(distribution = %name, exit_code, "Interactive session ended");
        Ok(())
    }
}
