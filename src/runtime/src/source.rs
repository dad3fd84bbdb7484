//! Image source resolution.
//!
//! An operator-supplied identifier either names a build recipe on disk or an
//! image in a registry. Build mode packages the recipe's directory as the
//! build context and builds it under a per-run tag; pull mode fetches the
//! reference from its registry. Both end with a local image the exporter can
//! instantiate.

use std::path::{Path, PathBuf};

use d2w_core::error::{ConvertError, Result};

use crate::engine::progress::{self, BuildMessage, PullMessage};
use crate::engine::ImageEngine;
use crate::reference::ImageReference;

/// Where the image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// A build recipe (Dockerfile) on the local filesystem
    Recipe(PathBuf),
    /// A registry reference to pull
    Registry(String),
}

impl ImageSource {
    /// Build mode when `identifier` is an existing file, pull mode otherwise.
    pub fn detect(identifier: &str) -> Self {
        let path = Path::new(identifier);
        if path.is_file() {
            ImageSource::Recipe(path.to_path_buf())
        } else {
            ImageSource::Registry(identifier.to_string())
        }
    }
}

/// Build context derived from a recipe path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    /// Absolute directory containing the recipe
    pub dir: PathBuf,
    /// Recipe file name, relative to `dir`
    pub dockerfile: String,
}

impl BuildContext {
    /// Resolve the context directory and recipe name for `recipe`.
    ///
    /// The directory is absolute, so the result does not depend on the
    /// working directory the identifier was given relative to.
    pub fn for_recipe(recipe: &Path) -> Result<Self> {
        let absolute = recipe.canonicalize().map_err(|e| {
            ConvertError::BuildError(format!(
                "Invalid recipe path '{}': {}",
                recipe.display(),
                e
            ))
        })?;

        let dir = absolute
            .parent()
            .ok_or_else(|| {
                ConvertError::BuildError(format!(
                    "Recipe '{}' has no parent directory",
                    absolute.display()
                ))
            })?
            .to_path_buf();
        let dockerfile = absolute
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                ConvertError::BuildError(format!(
                    "Recipe '{}' has no file name",
                    absolute.display()
                ))
            })?;

        Ok(Self { dir, dockerfile })
    }

    /// Package the context directory as an uncompressed tar.
    pub fn package(&self) -> Result<Vec<u8>> {
        let archive_err = |e: std::io::Error| {
            ConvertError::BuildError(format!(
                "Failed to archive build context {}: {}",
                self.dir.display(),
                e
            ))
        };

        let mut builder = tar::Builder::new(Vec::new());
        builder.follow_symlinks(false);
        builder.append_dir_all(".", &self.dir).map_err(archive_err)?;
        builder.into_inner().map_err(archive_err)
    }
}

/// Options shared by build and pull.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Tag applied to a freshly built image
    pub build_tag: String,
    /// Suppress progress output
    pub quiet: bool,
}

/// Produce a local image for `source`, returning its reference.
pub async fn resolve_image(
    engine: &dyn ImageEngine,
    source: &ImageSource,
    options: &ResolveOptions,
) -> Result<String> {
    match source {
        ImageSource::Recipe(recipe) => {
            if !options.quiet {
                println!("Building image from {}...", recipe.display());
            }
            build_image(engine, recipe, options).await
        }
        ImageSource::Registry(reference) => {
            if !options.quiet {
                println!("Pulling image {reference}...");
            }
            pull_image(engine, reference, options).await
        }
    }
}

/// Build `recipe` and tag the result with `options.build_tag`.
pub async fn build_image(
    engine: &dyn ImageEngine,
    recipe: &Path,
    options: &ResolveOptions,
) -> Result<String> {
    let context = BuildContext::for_recipe(recipe)?;
    let archive = context.package()?;

    tracing::info!(
        context = %context.dir.display(),
        dockerfile = %context.dockerfile,
        tag = %options.build_tag,
        size = archive.len(),
        "Submitting image build"
    );

    let log = engine
        .build_image(archive, &context.dockerfile, &options.build_tag)
        .await?;

    let quiet = options.quiet;
    progress::drain::<BuildMessage, _, _>(
        log,
        |message| {
            if let Some(text) = &message.stream {
                if !quiet {
                    print!("> {text}");
                }
            }
        },
        ConvertError::BuildError,
    )
    .await?;

    tracing::info!(tag = %options.build_tag, "Image build complete");
    Ok(options.build_tag.clone())
}

/// Pull `reference`, returning it unchanged once the pull completes.
pub async fn pull_image(
    engine: &dyn ImageEngine,
    reference: &str,
    options: &ResolveOptions,
) -> Result<String> {
    let parsed = ImageReference::parse(reference)?;
    tracing::info!(reference = %parsed, "Pulling image");

    let log = engine.pull_image(&parsed).await?;

    let quiet = options.quiet;
    progress::drain::<PullMessage, _, _>(
        log,
        |message| {
            if let Some(line) = message.render() {
                if !quiet {
                    println!("{line}");
                }
            }
        },
        ConvertError::PullError,
    )
    .await?;

    tracing::info!(reference = %parsed, "Image pull complete");
    Ok(reference.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EngineCall, MockEngine};
    use tempfile::TempDir;

    fn options() -> ResolveOptions {
        ResolveOptions {
            build_tag: "tmp-image:run1".to_string(),
            quiet: true,
        }
    }

    #[test]
    fn test_detect_existing_file_is_recipe() {
        let tmp = TempDir::new().unwrap();
        let recipe = tmp.path().join("Dockerfile");
        std::fs::write(&recipe, "FROM alpine\n").unwrap();

        let source = ImageSource::detect(recipe.to_str().unwrap());
        assert_eq!(source, ImageSource::Recipe(recipe));
    }

    #[test]
    fn test_detect_missing_file_is_registry() {
        let source = ImageSource::detect("alpine:3.19");
        assert_eq!(source, ImageSource::Registry("alpine:3.19".to_string()));
    }

    #[test]
    fn test_detect_directory_is_registry() {
        let tmp = TempDir::new().unwrap();
        let source = ImageSource::detect(tmp.path().to_str().unwrap());
        assert!(matches!(source, ImageSource::Registry(_)));
    }

    #[test]
    fn test_context_is_recipe_parent() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("images").join("dev");
        std::fs::create_dir_all(&nested).unwrap();
        let recipe = nested.join("Dockerfile.dev");
        std::fs::write(&recipe, "FROM alpine\n").unwrap();

        let context = BuildContext::for_recipe(&recipe).unwrap();
        assert_eq!(context.dir, nested.canonicalize().unwrap());
        assert_eq!(context.dockerfile, "Dockerfile.dev");
        assert!(context.dir.is_absolute());
    }

    #[test]
    fn test_context_independent_of_relative_spelling() {
        let tmp = TempDir::new().unwrap();
        let sub = tmp.path().join("sub");
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(tmp.path().join("Dockerfile"), "FROM alpine\n").unwrap();

        let direct = BuildContext::for_recipe(&tmp.path().join("Dockerfile")).unwrap();
        let roundabout =
            BuildContext::for_recipe(&sub.join("..").join("Dockerfile")).unwrap();
        assert_eq!(direct, roundabout);
    }

    #[test]
    fn test_context_missing_recipe() {
        let tmp = TempDir::new().unwrap();
        let err = BuildContext::for_recipe(&tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, ConvertError::BuildError(_)));
    }

    #[test]
    fn test_package_contains_context_files() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("Dockerfile"), "FROM alpine\n").unwrap();
        std::fs::create_dir(tmp.path().join("conf")).unwrap();
        std::fs::write(tmp.path().join("conf").join("app.toml"), "x = 1\n").unwrap();

        let context = BuildContext::for_recipe(&tmp.path().join("Dockerfile")).unwrap();
        let bytes = context.package().unwrap();

        let mut archive = tar::Archive::new(bytes.as_slice());
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().any(|n| n.ends_with("Dockerfile")));
        assert!(names.iter().any(|n| n.ends_with("conf/app.toml")));
    }

    #[tokio::test]
    async fn test_build_returns_tag() {
        let tmp = TempDir::new().unwrap();
        let recipe = tmp.path().join("Dockerfile");
        std::fs::write(&recipe, "FROM alpine\n").unwrap();

        let engine = MockEngine::new().with_build_log(&[
            "{\"stream\":\"Step 1/1 : FROM alpine\\n\"}",
            "this line is not json",
            "{\"stream\":\"Successfully tagged tmp-image:run1\\n\"}",
        ]);

        let image = build_image(&engine, &recipe, &options()).await.unwrap();
        assert_eq!(image, "tmp-image:run1");
        assert!(engine.calls().iter().any(|c| matches!(
            c,
            EngineCall::Build { dockerfile, tag } if dockerfile == "Dockerfile" && tag == "tmp-image:run1"
        )));
    }

    #[tokio::test]
    async fn test_build_error_payload_aborts() {
        let tmp = TempDir::new().unwrap();
        let recipe = tmp.path().join("Dockerfile");
        std::fs::write(&recipe, "FORM alpine\n").unwrap();

        let engine = MockEngine::new().with_build_log(&[
            "{\"errorDetail\":{\"message\":\"unknown instruction: FORM\"},\"error\":\"unknown instruction: FORM\"}",
        ]);

        let err = build_image(&engine, &recipe, &options()).await.unwrap_err();
        assert!(matches!(err, ConvertError::BuildError(ref m) if m == "unknown instruction: FORM"));
    }

    #[tokio::test]
    async fn test_pull_returns_original_identifier() {
        let engine = MockEngine::new().with_pull_log(&[
            "{\"status\":\"Pulling from library/alpine\",\"id\":\"3.19\"}",
            "{\"status\":\"Download complete\",\"id\":\"4abcf2066143\"}",
        ]);

        let image = pull_image(&engine, "alpine:3.19", &options()).await.unwrap();
        assert_eq!(image, "alpine:3.19");
        assert!(engine.calls().iter().any(|c| matches!(
            c,
            EngineCall::Pull { reference } if reference == "docker.io/library/alpine:3.19"
        )));
    }

    #[tokio::test]
    async fn test_pull_error_payload_aborts() {
        let engine = MockEngine::new().with_pull_log(&[
            "{\"errorDetail\":{\"message\":\"pull access denied for nope\"}}",
        ]);

        let err = pull_image(&engine, "nope", &options()).await.unwrap_err();
        assert!(matches!(err, ConvertError::PullError(_)));
    }

    #[tokio::test]
    async fn test_resolve_dispatches_on_source() {
        let engine = MockEngine::new();
        let source = ImageSource::Registry("alpine".to_string());
        let image = resolve_image(&engine, &source, &options()).await.unwrap();
        assert_eq!(image, "alpine");
    }
}
