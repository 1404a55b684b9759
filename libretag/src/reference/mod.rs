//! OCI image reference parsing and the source/destination pair.
//!
//! This module provides a wrapper around `oci_spec::distribution::Reference`
//! and the [`resolve`] function that turns the two command-line inputs into
//! the references a retag operates on. Nothing here touches the network.

use crate::digest::Digest;
use crate::error::{Result, RetagError};
use oci_spec::distribution::Reference as OciReference;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;


/// Tag used when a reference names neither a tag nor a digest.
pub const DEFAULT_TAG: &str = "latest";

/// Maximum length of a tag allowed by the distribution spec.
const MAX_TAG_LEN: usize = 128;

/// Represents an OCI image reference, wrapping `oci_spec::distribution::Reference`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference(OciReference);

impl FromStr for Reference {
    type Err = RetagError;

    fn from_str(s: &str) -> Result<Self> {
        let oci_reference = OciReference::from_str(s.trim())
            .map_err(|e| RetagError::invalid_reference(s, e.to_string()))?;
        Ok(Reference(oci_reference))
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Serialize for Reference {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl Reference {
    /// Returns the registry part of the reference.
    pub fn registry(&self) -> &str {
        self.0.registry()
    }

    /// Returns the repository part of the reference.
    pub fn repository(&self) -> &str {
        self.0.repository()
    }

    /// Returns the tag part of the reference, if present.
    pub fn tag(&self) -> Option<&str> {
        self.0.tag()
    }

    /// Returns the digest part of the reference, if present.
    pub fn digest(&self) -> Option<&str> {
        self.0.digest()
    }

    /// Returns what goes after `/manifests/` in a registry request.
    ///
    /// A digest wins over a tag, and a reference with neither resolves
    /// to [`DEFAULT_TAG`].
    pub fn manifest_reference(&self) -> &str {
        self.digest().or(self.tag()).unwrap_or(DEFAULT_TAG)
    }

    /// Returns a reference to the same repository with a different tag.
    pub fn with_tag(&self, tag: &str) -> Result<Self> {
        validate_tag(tag)?;
        Ok(Reference(OciReference::with_tag(
            self.registry().to_string(),
            self.repository().to_string(),
            tag.to_string(),
        )))
    }

    /// Returns a reference to the same repository pinned to `digest`.
    pub fn with_digest(&self, digest: &Digest) -> Self {
        Reference(OciReference::with_digest(
            self.registry().to_string(),
            self.repository().to_string(),
            digest.to_string(),
        ))
    }
}

/// Parses the source image and derives the destination reference.
///
/// The destination shares the source's registry and repository and differs
/// only in its tag. Fails with [`RetagError::InvalidReference`] when either
/// input is malformed.
///
/// # Examples
///
/// ```
/// use libretag::reference::resolve;
///
/// let (source, destination) = resolve("ghcr.io/acme/api:build-123", "production").unwrap();
/// assert_eq!(source.tag(), Some("build-123"));
/// assert_eq!(destination.to_string(), "ghcr.io/acme/api:production");
/// ```
pub fn resolve(source: &str, new_tag: &str) -> Result<(Reference, Reference)> {
    let source = Reference::from_str(source)?;
    let destination = source.with_tag(new_tag)?;
    Ok((source, destination))
}

/// Checks a bare tag against `[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}`.
fn validate_tag(tag: &str) -> Result<()> {
    let mut chars = tag.chars();
    let valid_first = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));

    if tag.is_empty() {
        return Err(RetagError::invalid_reference(tag, "tag cannot be empty"));
    }
    if tag.len() > MAX_TAG_LEN {
        return Err(RetagError::invalid_reference(
            tag,
            format!("tag is longer than {} characters", MAX_TAG_LEN),
        ));
    }
    if !valid_first || !valid_rest {
        return Err(RetagError::invalid_reference(
            tag,
            "tag must match [A-Za-z0-9_][A-Za-z0-9_.-]*",
        ));
    }
    Ok(())
}
