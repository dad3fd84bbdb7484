//! Image export.
//!
//! Materialises an image's filesystem as a single tar archive by creating a
//! throwaway container, streaming its export to disk, and removing the
//! container again whatever the export outcome was.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use d2w_core::error::{ConvertError, Result};

use crate::engine::ImageEngine;

/// Flattened filesystem archive on disk.
///
/// The file is removed when the value is dropped, so a run never leaves its
/// archive behind, whether it succeeded or failed.
#[derive(Debug)]
pub struct ExportArchive {
    path: PathBuf,
    size: u64,
}

impl ExportArchive {
    fn new(path: PathBuf) -> Self {
        Self { path, size: 0 }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Archive size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for ExportArchive {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed export archive"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove export archive"
            ),
        }
    }
}

/// Keep connectivity failures as-is, wrap everything else with `wrap`.
fn classify(err: ConvertError, wrap: impl FnOnce(String) -> ConvertError) -> ConvertError {
    match err {
        ConvertError::EngineUnavailable { .. } => err,
        other => wrap(other.to_string()),
    }
}

/// Export `image` to `archive_path` through a throwaway container.
///
/// The container is removed even when the export fails. An export failure
/// takes priority over a removal failure; a removal failure after a
/// successful export is still reported so containers are never leaked
/// silently.
pub async fn export_image(
    engine: &dyn ImageEngine,
    image: &str,
    container_name: &str,
    archive_path: &Path,
) -> Result<ExportArchive> {
    let container_id = engine
        .create_container(image, container_name)
        .await
        .map_err(|e| classify(e, ConvertError::ContainerCreateError))?;

    tracing::info!(
        image = %image,
        container = %container_id,
        archive = %archive_path.display(),
        "Exporting container filesystem"
    );

    let mut archive = ExportArchive::new(archive_path.to_path_buf());
    let exported = write_archive(engine, &container_id, &archive.path).await;

    let removed = engine.remove_container(&container_id).await;

    match (exported, removed) {
        (Ok(size), Ok(())) => {
            archive.size = size;
            tracing::info!(container = %container_id, size, "Export complete");
            Ok(archive)
        }
        (Err(export_err), Ok(())) => Err(export_err),
        (Err(export_err), Err(remove_err)) => {
            tracing::warn!(
                container = %container_id,
                error = %remove_err,
                "Failed to remove throwaway container after failed export"
            );
            Err(export_err)
        }
        (Ok(_), Err(remove_err)) => Err(ConvertError::ContainerRemoveError {
            container: container_id,
            message: remove_err.to_string(),
        }),
    }
}

/// Stream the container export into `path`, truncating any prior content.
async fn write_archive(engine: &dyn ImageEngine, container_id: &str, path: &Path) -> Result<u64> {
    let archive_err = |e: std::io::Error| ConvertError::ArchiveError {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    let mut stream = engine
        .export_container(container_id)
        .await
        .map_err(|e| classify(e, ConvertError::ExportError))?;

    let mut file = tokio::fs::File::create(path).await.map_err(archive_err)?;
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ConvertError::ExportError(e.to_string()))?;
        file.write_all(&chunk).await.map_err(archive_err)?;
        written += chunk.len() as u64;
    }

    file.flush().await.map_err(archive_err)?;
    file.sync_all().await.map_err(archive_err)?;
    Ok(written)
}
