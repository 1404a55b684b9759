//! Registry metadata and tag-writing operations.
//!
//! The network lives behind [`RegistryTransport`], so the retag logic can be
//! exercised against in-memory fakes. [`Registry`] adds the part that
//! matters to callers: turning raw transport results into a [`FetchOutcome`]
//! where "not found" is a normal answer, not an error.

use crate::digest::Digest;
use crate::error::{FailureKind, Result, RetagError};
use crate::reference::Reference;
use crate::retry::Retryable;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

#[cfg(test)]
mod tests;

/// Manifest digest and creation time of an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageMetadata {
    /// Digest of the manifest (or index) the reference points at.
    pub digest: Digest,
    /// Creation time from the image config, when the config records one.
    pub created: Option<DateTime<Utc>>,
}

impl ImageMetadata {
    pub fn new(digest: Digest, created: Option<DateTime<Utc>>) -> Self {
        Self { digest, created }
    }
}

/// Result of looking a reference up on the registry.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The reference resolved to a manifest.
    Found(ImageMetadata),
    /// The registry reported that the reference does not exist.
    NotFound,
    /// A failure that may go away on retry (timeouts, 5xx, rate limits).
    TransientFailure(RetagError),
    /// A failure that will not go away on retry (auth, malformed responses).
    PermanentFailure(RetagError),
}

impl FetchOutcome {
    /// Classifies a raw transport result.
    ///
    /// # Examples
    ///
    /// ```
    /// use libretag::error::RetagError;
    /// use libretag::registry::FetchOutcome;
    ///
    /// let outcome = FetchOutcome::from_result(Err(RetagError::not_found("manifest", "app:prod")));
    /// assert!(matches!(outcome, FetchOutcome::NotFound));
    /// ```
    pub fn from_result(result: Result<ImageMetadata>) -> Self {
        match result {
            Ok(metadata) => Self::Found(metadata),
            Err(e) => match e.kind() {
                FailureKind::NotFound => Self::NotFound,
                FailureKind::Transient => Self::TransientFailure(e),
                FailureKind::Permanent => Self::PermanentFailure(e),
            },
        }
    }
}

impl Retryable for FetchOutcome {
    fn is_transient(&self) -> bool {
        matches!(self, Self::TransientFailure(_))
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::TransientFailure(e) => e.retry_after(),
            _ => None,
        }
    }

    fn cancelled() -> Self {
        Self::PermanentFailure(RetagError::Cancelled)
    }
}

/// Network operations a retag needs from a registry.
///
/// Implementations report a missing manifest as [`RetagError::NotFound`] and
/// classify every other failure through the variants of [`RetagError`].
#[async_trait]
pub trait RegistryTransport: Send + Sync {
    /// Resolves a reference to its manifest digest and creation time without
    /// downloading any layer.
    async fn fetch_metadata(&self, reference: &Reference) -> Result<ImageMetadata>;

    /// Points `destination`'s tag at the manifest identified by `source`,
    /// creating or overwriting it.
    async fn put_tag(&self, source: &Reference, destination: &Reference) -> Result<()>;
}

#[async_trait]
impl<T: RegistryTransport + ?Sized> RegistryTransport for std::sync::Arc<T> {
    async fn fetch_metadata(&self, reference: &Reference) -> Result<ImageMetadata> {
        (**self).fetch_metadata(reference).await
    }

    async fn put_tag(&self, source: &Reference, destination: &Reference) -> Result<()> {
        (**self).put_tag(source, destination).await
    }
}

/// Metadata client and tag writer over a [`RegistryTransport`].
#[derive(Debug, Clone)]
pub struct Registry<T> {
    transport: T,
}

impl<T: RegistryTransport> Registry<T> {
    /// Creates a new `Registry` over `transport`.
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Looks up `reference`, performing one logical round trip.
    pub async fn fetch(&self, reference: &Reference) -> FetchOutcome {
        tracing::debug!(reference = %reference, "fetching image metadata");
        let outcome = FetchOutcome::from_result(self.transport.fetch_metadata(reference).await);

        match &outcome {
            FetchOutcome::Found(metadata) => {
                tracing::debug!(reference = %reference, digest = %metadata.digest, "resolved")
            }
            FetchOutcome::NotFound => tracing::debug!(reference = %reference, "not found"),
            FetchOutcome::TransientFailure(e) | FetchOutcome::PermanentFailure(e) => {
                tracing::debug!(reference = %reference, error = %e, "lookup failed")
            }
        }
        outcome
    }

    /// Points `destination` at the manifest of `source`.
    pub async fn write(&self, source: &Reference, destination: &Reference) -> Result<()> {
        tracing::info!(source = %source, destination = %destination, "writing tag");
        self.transport.put_tag(source, destination).await
    }
}
