//! Image engine access.
//!
//! The conversion only needs a handful of engine operations: build, pull,
//! and the create/export/remove lifecycle of a throwaway container. They are
//! expressed as the [`ImageEngine`] trait so the pipeline can run against the
//! Docker Engine API or an in-memory engine in tests.

pub mod docker;
pub mod endpoint;
pub mod progress;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use hyper::body::Bytes;

use d2w_core::error::Result;

use crate::reference::ImageReference;

pub use docker::DockerEngine;
pub use endpoint::EngineEndpoint;
pub use progress::{BuildMessage, JsonLines, PullMessage};

/// Streamed response body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Operations the conversion pipeline needs from an image engine.
#[async_trait]
pub trait ImageEngine: Send + Sync {
    /// Check that the engine endpoint is reachable.
    async fn ping(&self) -> Result<()>;

    /// Build an image from an uncompressed tar build context.
    ///
    /// Returns the engine's newline-delimited JSON build log.
    async fn build_image(&self, context: Vec<u8>, dockerfile: &str, tag: &str) -> Result<ByteStream>;

    /// Pull an image from its registry.
    ///
    /// Returns the engine's newline-delimited JSON pull progress.
    async fn pull_image(&self, reference: &ImageReference) -> Result<ByteStream>;

    /// Create (but do not start) a container, returning its ID.
    async fn create_container(&self, image: &str, name: &str) -> Result<String>;

    /// Stream the container's root filesystem as an uncompressed tar.
    async fn export_container(&self, id: &str) -> Result<ByteStream>;

    /// Force-remove a container together with its anonymous volumes.
    async fn remove_container(&self, id: &str) -> Result<()>;
}
