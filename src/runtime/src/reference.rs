//! Registry image reference parsing.
//!
//! Splits references like `ghcr.io/org/image:tag` into registry, repository,
//! tag and digest so a pull can be addressed to the engine.

use d2w_core::error::{ConvertError, Result};

/// Default registry when none is specified.
const DEFAULT_REGISTRY: &str = "docker.io";

/// Default tag when none is specified.
const DEFAULT_TAG: &str = "latest";

/// Parsed registry image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry hostname (e.g., "ghcr.io", "docker.io")
    pub registry: String,
    /// Repository path (e.g., "library/alpine", "org/image")
    pub repository: String,
    /// Tag (e.g., "latest", "3.19")
    pub tag: Option<String>,
    /// Digest (e.g., "sha256:abc123...")
    pub digest: Option<String>,
}

impl ImageReference {
    /// Parse an image reference string.
    ///
    /// - `alpine` → docker.io/library/alpine:latest
    /// - `alpine:3.19` → docker.io/library/alpine:3.19
    /// - `ghcr.io/org/image@sha256:abc...` → digest, no tag
    /// - `localhost:5000/image` → registry with port, default tag
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(ConvertError::InvalidReference(
                "empty image reference".to_string(),
            ));
        }

        let (name_tag, digest) = match reference.rsplit_once('@') {
            Some((name_tag, digest)) => {
                if !digest.contains(':') {
                    return Err(ConvertError::InvalidReference(format!(
                        "invalid digest in '{reference}': expected algorithm:hex"
                    )));
                }
                (name_tag, Some(digest.to_string()))
            }
            None => (reference, None),
        };

        let (name, tag) = split_tag(name_tag);
        let (registry, repository) = split_registry(name, reference)?;

        let tag = match (tag, &digest) {
            (None, None) => Some(DEFAULT_TAG.to_string()),
            (tag, _) => tag.map(str::to_string),
        };

        Ok(ImageReference {
            registry,
            repository,
            tag,
            digest,
        })
    }

    /// Full reference string, registry included.
    pub fn full_reference(&self) -> String {
        let mut s = format!("{}/{}", self.registry, self.repository);
        if let Some(tag) = &self.tag {
            s.push(':');
            s.push_str(tag);
        }
        if let Some(digest) = &self.digest {
            s.push('@');
            s.push_str(digest);
        }
        s
    }

    /// `fromImage` and `tag` query values for an engine pull.
    ///
    /// A digest takes the place of the tag when present.
    pub fn pull_params(&self) -> (String, String) {
        let from_image = format!("{}/{}", self.registry, self.repository);
        let tag = self
            .digest
            .clone()
            .or_else(|| self.tag.clone())
            .unwrap_or_else(|| DEFAULT_TAG.to_string());
        (from_image, tag)
    }
}

/// Split `name[:tag]`, only looking for the tag after the last `/`.
fn split_tag(name_tag: &str) -> (&str, Option<&str>) {
    let last_segment_start = name_tag.rfind('/').map(|p| p + 1).unwrap_or(0);
    let Some(colon) = name_tag[last_segment_start..].rfind(':') else {
        return (name_tag, None);
    };
    let colon = last_segment_start + colon;
    let tag = &name_tag[colon + 1..];

    // `host:5000` with no repository looks like a tag but is a port
    if last_segment_start == 0 && !tag.is_empty() && tag.chars().all(|c| c.is_ascii_digit()) {
        return (name_tag, None);
    }
    (&name_tag[..colon], Some(tag))
}

/// Split a name into registry and repository components.
fn split_registry(name: &str, reference: &str) -> Result<(String, String)> {
    if let Some((first, rest)) = name.split_once('/') {
        if first.contains('.') || first.contains(':') || first == "localhost" {
            if rest.is_empty() {
                return Err(ConvertError::InvalidReference(format!(
                    "empty repository in '{reference}'"
                )));
            }
            return Ok((first.to_string(), rest.to_string()));
        }
    }

    if name.is_empty() {
        return Err(ConvertError::InvalidReference(format!(
            "empty repository in '{reference}'"
        )));
    }

    let repository = if name.contains('/') {
        name.to_string()
    } else {
        format!("library/{name}")
    };
    Ok((DEFAULT_REGISTRY.to_string(), repository))
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_reference())
    }
}
