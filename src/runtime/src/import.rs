//! Distribution import.
//!
//! Replaces whatever is registered under the target name with the exported
//! archive. The replacement is two separate host operations (unregister,
//! then import) and is not atomic: if the process dies between them the
//! name is left unregistered.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use d2w_core::error::{ConvertError, Result};
use d2w_core::DistributionName;

use crate::host::DistributionHost;

/// A tilde followed by letters, digits or ASCII whitespace. The host expands
/// such tokens in paths, so they cannot appear in a storage directory name.
/// Other Unicode whitespace (e.g. U+3000) does not extend a token.
const EXPANSION_TOKEN: &str = r"~[\p{L}0-9\t\n\x0C\r ]+";

fn expansion_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(EXPANSION_TOKEN).expect("expansion token pattern is valid"))
}

/// Storage directory name for a distribution.
///
/// Every run of a host path-expansion token is replaced by a single hyphen.
/// This is not general path escaping.
pub fn storage_dir_name(name: &DistributionName) -> String {
    expansion_token()
        .replace_all(name.as_str(), "-")
        .into_owned()
}

/// Key the distribution is registered under with the host.
///
/// Deliberately separate from [`storage_dir_name`]: the registration key is
/// the operator's name, byte for byte.
pub fn registration_key(name: &DistributionName) -> &str {
    name.as_str()
}

/// How the archive ended up registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMethod {
    /// The host's single-command import succeeded
    FastImport,
    /// Fast import failed and the native registration primitive was used
    FallbackRegistration,
}

impl std::fmt::Display for ImportMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportMethod::FastImport => write!(f, "fast import"),
            ImportMethod::FallbackRegistration => write!(f, "fallback registration"),
        }
    }
}

/// Registers export archives as distributions.
pub struct Importer<'a> {
    host: &'a dyn DistributionHost,
    install_root: PathBuf,
    version: u8,
}

impl<'a> Importer<'a> {
    pub fn new(host: &'a dyn DistributionHost, install_root: impl Into<PathBuf>, version: u8) -> Self {
        Self {
            host,
            install_root: install_root.into(),
            version,
        }
    }

    /// Storage directory the fast import writes `name` into.
    pub fn install_dir(&self, name: &DistributionName) -> PathBuf {
        self.install_root.join(storage_dir_name(name))
    }

    /// Unregister any existing distribution named `name`.
    ///
    /// A missing distribution is not an error.
    pub async fn remove_existing(&self, name: &DistributionName) -> Result<()> {
        match self.host.unregister(registration_key(name)).await {
            Ok(()) => {
                tracing::info!(distribution = %name, "Unregistered existing distribution");
                Ok(())
            }
            Err(ConvertError::DistributionNotFound(_)) => {
                tracing::debug!(distribution = %name, "No existing distribution to unregister");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Replace `name` with the contents of `archive`.
    pub async fn import(&self, name: &DistributionName, archive: &Path) -> Result<ImportMethod> {
        self.remove_existing(name).await?;

        let install_dir = self.install_dir(name);
        tracing::info!(
            distribution = %name,
            install_dir = %install_dir.display(),
            archive = %archive.display(),
            version = self.version,
            "Importing distribution"
        );

        let failure = match self
            .host
            .fast_import(registration_key(name), &install_dir, archive, self.version)
            .await
        {
            Ok(output) if output.success() => return Ok(ImportMethod::FastImport),
            Ok(output) => output.summary(),
            Err(e) => e.to_string(),
        };

        tracing::warn!(
            distribution = %name,
            reason = %failure,
            "Fast import failed, falling back to native registration"
        );

        let archive = absolute_path(archive)?;
        self.host
            .register(registration_key(name), &archive)
            .await
            .map_err(|e| match e {
                ConvertError::RegisterError { .. } => e,
                other => ConvertError::RegisterError {
                    name: name.to_string(),
                    message: other.to_string(),
                },
            })?;

        Ok(ImportMethod::FallbackRegistration)
    }
}

fn absolute_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
