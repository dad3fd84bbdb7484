//! In-memory engine, host and shortcut writer for tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use hyper::body::Bytes;
use parking_lot::Mutex;

use d2w_core::error::{ConvertError, Result};

use crate::engine::{ByteStream, ImageEngine};
use crate::host::{CommandOutput, DistributionHost};
use crate::reference::ImageReference;
use crate::shortcut::{Shortcut, ShortcutWriter};

const DEFAULT_EXPORT: &[u8] = b"mock-rootfs";

fn stream(chunks: Vec<Result<Bytes>>) -> ByteStream {
    futures::stream::iter(chunks).boxed()
}

fn log_stream(lines: &[String]) -> ByteStream {
    stream(
        lines
            .iter()
            .map(|line| Ok(Bytes::from(format!("{line}\r\n"))))
            .collect(),
    )
}

/// Engine call as recorded by [`MockEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Ping,
    Build { dockerfile: String, tag: String },
    Pull { reference: String },
    Create { image: String, name: String },
    Export { id: String },
    Remove { id: String },
}

#[derive(Default)]
pub struct MockEngine {
    calls: Mutex<Vec<EngineCall>>,
    build_log: Vec<String>,
    pull_log: Vec<String>,
    export_bytes: Option<Vec<u8>>,
    unreachable: bool,
    fail_create: bool,
    fail_export: bool,
    fail_remove: bool,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_build_log(mut self, lines: &[&str]) -> Self {
        self.build_log = lines.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_pull_log(mut self, lines: &[&str]) -> Self {
        self.pull_log = lines.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_export_bytes(mut self, bytes: &[u8]) -> Self {
        self.export_bytes = Some(bytes.to_vec());
        self
    }

    /// Every call fails as if the endpoint were down.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    /// The export stream breaks after its first chunk.
    pub fn failing_export(mut self) -> Self {
        self.fail_export = true;
        self
    }

    pub fn failing_remove(mut self) -> Self {
        self.fail_remove = true;
        self
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    fn record(&self, call: EngineCall) -> Result<()> {
        self.calls.lock().push(call);
        if self.unreachable {
            return Err(ConvertError::EngineUnavailable {
                endpoint: "mock".to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ImageEngine for MockEngine {
    async fn ping(&self) -> Result<()> {
        self.record(EngineCall::Ping)
    }

    async fn build_image(&self, _context: Vec<u8>, dockerfile: &str, tag: &str) -> Result<ByteStream> {
        self.record(EngineCall::Build {
            dockerfile: dockerfile.to_string(),
            tag: tag.to_string(),
        })?;
        Ok(log_stream(&self.build_log))
    }

    async fn pull_image(&self, reference: &ImageReference) -> Result<ByteStream> {
        self.record(EngineCall::Pull {
            reference: reference.full_reference(),
        })?;
        Ok(log_stream(&self.pull_log))
    }

    async fn create_container(&self, image: &str, name: &str) -> Result<String> {
        self.record(EngineCall::Create {
            image: image.to_string(),
            name: name.to_string(),
        })?;
        if self.fail_create {
            return Err(ConvertError::EngineApi {
                status: 404,
                message: format!("No such image: {image}"),
            });
        }
        Ok(format!("id-{name}"))
    }

    async fn export_container(&self, id: &str) -> Result<ByteStream> {
        self.record(EngineCall::Export { id: id.to_string() })?;
        let bytes = self
            .export_bytes
            .clone()
            .unwrap_or_else(|| DEFAULT_EXPORT.to_vec());

        if self.fail_export {
            return Ok(stream(vec![
                Ok(Bytes::from(bytes)),
                Err(ConvertError::ExportError("connection reset".to_string())),
            ]));
        }
        Ok(stream(vec![Ok(Bytes::from(bytes))]))
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        self.record(EngineCall::Remove { id: id.to_string() })?;
        if self.fail_remove {
            return Err(ConvertError::EngineApi {
                status: 500,
                message: "removal of container is already in progress".to_string(),
            });
        }
        Ok(())
    }
}

/// Host call as recorded by [`MockHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Unregister(String),
    Register {
        name: String,
        archive: PathBuf,
    },
    FastImport {
        name: String,
        install_dir: PathBuf,
        archive: PathBuf,
        version: u8,
    },
    SetDefault(String),
    Launch(String),
}

#[derive(Default)]
struct HostState {
    calls: Vec<HostCall>,
    /// Registered name to the archive it was imported from
    registered: HashMap<String, PathBuf>,
    default: Option<String>,
    /// Size of the archive on disk at each import, if it existed
    seen_archive_sizes: Vec<Option<u64>>,
}

#[derive(Default)]
pub struct MockHost {
    state: Mutex<HostState>,
    fail_unregister: bool,
    fail_fast_import: bool,
    error_fast_import: bool,
    fail_register: bool,
    fail_set_default: bool,
    fail_launch: bool,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registered(self, name: &str) -> Self {
        self.state
            .lock()
            .registered
            .insert(name.to_string(), PathBuf::from("preexisting.tar"));
        self
    }

    pub fn failing_unregister(mut self) -> Self {
        self.fail_unregister = true;
        self
    }

    /// Fast import exits non-zero.
    pub fn failing_fast_import(mut self) -> Self {
        self.fail_fast_import = true;
        self
    }

    /// Fast import cannot be started at all.
    pub fn erroring_fast_import(mut self) -> Self {
        self.error_fast_import = true;
        self
    }

    pub fn failing_register(mut self) -> Self {
        self.fail_register = true;
        self
    }

    pub fn failing_set_default(mut self) -> Self {
        self.fail_set_default = true;
        self
    }

    pub fn failing_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.state.lock().calls.clone()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.state.lock().registered.contains_key(name)
    }

    pub fn registered_archive(&self, name: &str) -> Option<PathBuf> {
        self.state.lock().registered.get(name).cloned()
    }

    pub fn default_distribution(&self) -> Option<String> {
        self.state.lock().default.clone()
    }

    pub fn seen_archive_sizes(&self) -> Vec<Option<u64>> {
        self.state.lock().seen_archive_sizes.clone()
    }

    fn observe_archive(state: &mut HostState, archive: &Path) {
        let size = std::fs::metadata(archive).ok().map(|m| m.len());
        state.seen_archive_sizes.push(size);
    }
}

#[async_trait]
impl DistributionHost for MockHost {
    async fn unregister(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(HostCall::Unregister(name.to_string()));
        if self.fail_unregister {
            return Err(ConvertError::HostCommandError {
                command: "WslUnregisterDistribution".to_string(),
                message: "HRESULT 0x80070005".to_string(),
            });
        }
        match state.registered.remove(name) {
            Some(_) => Ok(()),
            None => Err(ConvertError::DistributionNotFound(name.to_string())),
        }
    }

    async fn register(&self, name: &str, archive: &Path) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(HostCall::Register {
            name: name.to_string(),
            archive: archive.to_path_buf(),
        });
        Self::observe_archive(&mut state, archive);
        if self.fail_register {
            return Err(ConvertError::RegisterError {
                name: name.to_string(),
                message: "HRESULT 0x80070002".to_string(),
            });
        }
        state
            .registered
            .insert(name.to_string(), archive.to_path_buf());
        Ok(())
    }

    async fn fast_import(
        &self,
        name: &str,
        install_dir: &Path,
        archive: &Path,
        version: u8,
    ) -> Result<CommandOutput> {
        let mut state = self.state.lock();
        state.calls.push(HostCall::FastImport {
            name: name.to_string(),
            install_dir: install_dir.to_path_buf(),
            archive: archive.to_path_buf(),
            version,
        });
        Self::observe_archive(&mut state, archive);
        if self.error_fast_import {
            return Err(ConvertError::ImportError(
                "failed to run wsl.exe: program not found".to_string(),
            ));
        }
        if self.fail_fast_import {
            return Ok(CommandOutput {
                status: Some(-1),
                stdout: String::new(),
                stderr: "Invalid command line argument: --import".to_string(),
            });
        }
        state
            .registered
            .insert(name.to_string(), archive.to_path_buf());
        Ok(CommandOutput {
            status: Some(0),
            stdout: "The operation completed successfully.".to_string(),
            stderr: String::new(),
        })
    }

    async fn set_default(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(HostCall::SetDefault(name.to_string()));
        if self.fail_set_default || !state.registered.contains_key(name) {
            return Err(ConvertError::HostCommandError {
                command: format!("wsl.exe --set-default {name}"),
                message: "exit code 1: There is no distribution with the supplied name.".to_string(),
            });
        }
        state.default = Some(name.to_string());
        Ok(())
    }

    async fn launch_interactive(&self, name: &str) -> Result<()> {
        self.state
            .lock()
            .calls
            .push(HostCall::Launch(name.to_string()));
        if self.fail_launch {
            return Err(ConvertError::LaunchError(format!(
                "WslLaunchInteractive failed for '{name}': HRESULT 0x8007019E"
            )));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MockShortcuts {
    written: Mutex<Vec<Shortcut>>,
    fail: bool,
}

impl MockShortcuts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn written(&self) -> Vec<Shortcut> {
        self.written.lock().clone()
    }
}

impl ShortcutWriter for MockShortcuts {
    fn write(&self, shortcut: &Shortcut) -> Result<()> {
        if self.fail {
            return Err(ConvertError::ShortcutError(format!(
                "failed to write {}: access denied",
                shortcut.path.display()
            )));
        }
        self.written.lock().push(shortcut.clone());
        Ok(())
    }
}
