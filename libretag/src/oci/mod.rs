//! OCI manifest and index handling.
//!
//! Only what a retag needs to find an image's config blob: telling manifests
//! from indexes, picking a platform child and reading the config digest.

pub use oci_spec::image::{Descriptor, ImageIndex, ImageManifest};

use crate::digest::Digest;
use crate::error::{Result, RetagError};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::str::FromStr;


/// `Accept` value covering OCI and Docker manifests and indexes.
pub const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.manifest.v1+json, \
     application/vnd.oci.image.index.v1+json, \
     application/vnd.docker.distribution.manifest.v2+json, \
     application/vnd.docker.distribution.manifest.list.v2+json";

/// Content type assumed for a manifest that declares none.
pub const DEFAULT_MANIFEST_MEDIA_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";

/// Either a single-platform image manifest or a multi-platform image index.
#[derive(Debug, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum ManifestOrIndex {
    Manifest(ImageManifest),
    Index(ImageIndex),
}

impl ManifestOrIndex {
    /// Parses manifest bytes, detecting whether they hold a manifest or an
    /// index from `mediaType`, or from the document's shape when absent.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| RetagError::validation_with_source("Failed to parse manifest JSON", e))?;

        let media_type = value
            .get("mediaType")
            .and_then(|v| v.as_str())
            .unwrap_or("");

        let is_index = if media_type.contains("index") || media_type.contains("list") {
            true
        } else if media_type.contains("manifest") {
            false
        } else if value.get("manifests").is_some() {
            true
        } else if value.get("config").is_some() {
            false
        } else {
            return Err(RetagError::validation(
                "Unable to determine if content is a manifest or index",
            ));
        };

        if is_index {
            serde_json::from_value(value)
                .map(ManifestOrIndex::Index)
                .map_err(|e| RetagError::validation_with_source("Failed to parse image index", e))
        } else {
            serde_json::from_value(value)
                .map(ManifestOrIndex::Manifest)
                .map_err(|e| {
                    RetagError::validation_with_source("Failed to parse image manifest", e)
                })
        }
    }

    /// Returns the `mediaType` the document declares, if any.
    pub fn media_type(&self) -> Option<String> {
        match self {
            ManifestOrIndex::Manifest(m) => m.media_type().as_ref().map(|t| t.to_string()),
            ManifestOrIndex::Index(i) => i.media_type().as_ref().map(|t| t.to_string()),
        }
    }

    /// Returns the config blob digest of a single-platform manifest.
    pub fn config_digest(&self) -> Result<Option<Digest>> {
        match self {
            ManifestOrIndex::Manifest(m) => {
                Digest::from_str(&m.config().digest().to_string()).map(Some)
            }
            ManifestOrIndex::Index(_) => Ok(None),
        }
    }

    /// Picks the index child for `platform` (`os/arch`, optional variant
    /// ignored), falling back to the first child.
    pub fn select_child(&self, platform: &str) -> Option<&Descriptor> {
        let ManifestOrIndex::Index(index) = self else {
            return None;
        };

        let mut parts = platform.split('/');
        let os = parts.next().unwrap_or_default();
        let arch = parts.next().unwrap_or_default();

        index
            .manifests()
            .iter()
            .find(|desc| {
                desc.platform().as_ref().is_some_and(|p| {
                    p.os().to_string() == os && p.architecture().to_string() == arch
                })
            })
            .or_else(|| index.manifests().first())
    }
}

/// The one field of an image config blob a retag reads.
#[derive(Debug, Default, Deserialize)]
struct ConfigCreated {
    #[serde(default)]
    created: Option<String>,
}

/// Reads the `created` timestamp from an image config blob.
///
/// A missing or unparseable timestamp is `None`. A blob that is not JSON
/// at all is an error.
///
/// # Examples
///
/// ```
/// use libretag::oci::created_from_config;
///
/// let created = created_from_config(br#"{"created": "2026-10-16T09:00:00Z"}"#).unwrap();
/// assert_eq!(created.unwrap().to_rfc3339(), "2026-10-16T09:00:00+00:00");
/// ```
pub fn created_from_config(bytes: &[u8]) -> Result<Option<DateTime<Utc>>> {
    let config: ConfigCreated = serde_json::from_slice(bytes)
        .map_err(|e| RetagError::validation_with_source("Failed to parse image config", e))?;

    Ok(config.created.and_then(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .inspect_err(|e| tracing::debug!(created = %raw, error = %e, "ignoring created"))
            .ok()
    }))
}
