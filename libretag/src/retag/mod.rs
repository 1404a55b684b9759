//! The retag operation from start to finish.
//!
//! A run resolves both references, reads the source and the destination,
//! decides whether a write is needed and, unless it is a dry run or a no-op,
//! points the destination tag at the source digest. Every registry call goes
//! through the retry policy.
//!
//! # Examples
//!
//! ```no_run
//! use libretag::{RetagRequest, Retagger};
//! use libretag::auth::DockerConfigProvider;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let retagger = Retagger::builder()
//!         .with_credentials(DockerConfigProvider::from_environment()?)
//!         .build()?;
//!
//!     let request = RetagRequest::new("ghcr.io/acme/api:build-123", "production");
//!     let outcome = retagger.retag(&request, &CancellationToken::new()).await?;
//!     println!("{:?}", outcome.decision);
//!     Ok(())
//! }
//! ```

use crate::auth::{AnonymousProvider, CredentialProvider};
use crate::client::{Client, ClientConfig};
use crate::config::Config;
use crate::decision::{DestinationState, RetagDecision, decide};
use crate::error::{Result, RetagError};
use crate::reference::{Reference, resolve};
use crate::registry::{FetchOutcome, ImageMetadata, Registry, RegistryTransport};
use crate::retry::RetryPolicy;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;


/// The two inputs of a retag and the dry-run switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetagRequest {
    /// Full source image reference, e.g. `ghcr.io/acme/api:build-123`.
    pub source: String,
    /// Bare tag to point at the source image.
    pub new_tag: String,
    pub dry_run: bool,
}

impl RetagRequest {
    pub fn new(source: impl Into<String>, new_tag: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            new_tag: new_tag.into(),
            dry_run: false,
        }
    }

    /// Enables or disables dry-run mode.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Everything a reporter needs about a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetagOutcome {
    pub source: Reference,
    pub destination: Reference,
    pub source_metadata: ImageMetadata,
    pub decision: RetagDecision,
}

/// Steps of a run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ResolvingReferences,
    FetchingSource,
    FetchingDestination,
    Deciding,
    Writing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ResolvingReferences => "resolving references",
            Stage::FetchingSource => "fetching source",
            Stage::FetchingDestination => "fetching destination",
            Stage::Deciding => "deciding",
            Stage::Writing => "writing",
        };
        f.write_str(name)
    }
}

/// Runs retags against a registry transport.
#[derive(Debug, Clone)]
pub struct Retagger<T> {
    registry: Registry<T>,
    retry: RetryPolicy,
}

impl Retagger<Client> {
    /// Creates a builder for a retagger over the HTTP client.
    pub fn builder() -> RetaggerBuilder {
        RetaggerBuilder::new()
    }
}

impl<T: RegistryTransport> Retagger<T> {
    pub fn new(transport: T, retry: RetryPolicy) -> Self {
        Self {
            registry: Registry::new(transport),
            retry,
        }
    }

    pub fn registry(&self) -> &Registry<T> {
        &self.registry
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Points `request.new_tag` at the image named by `request.source`.
    ///
    /// Returns the decision that was carried out. A failed write is reported
    /// as [`RetagError::WriteFailed`]: the tag may or may not have moved.
    pub async fn retag(
        &self,
        request: &RetagRequest,
        cancel: &CancellationToken,
    ) -> Result<RetagOutcome> {
        enter(Stage::ResolvingReferences);
        let (source, destination) = resolve(&request.source, &request.new_tag)?;

        enter(Stage::FetchingSource);
        let source_metadata = match self.fetch(&source, "fetch source", cancel).await {
            FetchOutcome::Found(metadata) => metadata,
            FetchOutcome::NotFound => {
                return Err(RetagError::SourceNotFound {
                    reference: source.to_string(),
                });
            }
            FetchOutcome::TransientFailure(e) | FetchOutcome::PermanentFailure(e) => {
                return Err(unless_cancelled(e, |e| RetagError::SourceUnavailable {
                    reference: source.to_string(),
                    source: Box::new(e),
                }));
            }
        };

        enter(Stage::FetchingDestination);
        let destination_state = match self.fetch(&destination, "fetch destination", cancel).await
        {
            FetchOutcome::Found(metadata) => DestinationState::Existing(metadata),
            FetchOutcome::NotFound => DestinationState::Absent,
            FetchOutcome::TransientFailure(e) | FetchOutcome::PermanentFailure(e) => {
                return Err(unless_cancelled(e, |e| {
                    RetagError::DestinationUnavailable {
                        reference: destination.to_string(),
                        source: Box::new(e),
                    }
                }));
            }
        };

        enter(Stage::Deciding);
        let decision = decide(&source_metadata, &destination_state, request.dry_run);
        tracing::debug!(?decision, "decided");

        if decision.requires_write() {
            if cancel.is_cancelled() {
                return Err(RetagError::Cancelled);
            }

            enter(Stage::Writing);
            // Pin to the digest read above so a source tag moving mid-run
            // cannot be promoted.
            let pinned = source.with_digest(&source_metadata.digest);
            self.retry
                .run("write tag", cancel, |_| self.registry.write(&pinned, &destination))
                .await
                .map_err(|e| RetagError::WriteFailed {
                    reference: destination.to_string(),
                    digest: source_metadata.digest.to_string(),
                    source: Box::new(e),
                })?;
        }

        tracing::info!(
            source = %source,
            destination = %destination,
            digest = %source_metadata.digest,
            written = decision.requires_write(),
            "retag finished"
        );

        Ok(RetagOutcome {
            source,
            destination,
            source_metadata,
            decision,
        })
    }

    async fn fetch(
        &self,
        reference: &Reference,
        operation: &str,
        cancel: &CancellationToken,
    ) -> FetchOutcome {
        self.retry
            .run(operation, cancel, |_| self.registry.fetch(reference))
            .await
    }
}

fn enter(stage: Stage) {
    tracing::debug!(%stage, "retag stage");
}

fn unless_cancelled(error: RetagError, wrap: impl FnOnce(RetagError) -> RetagError) -> RetagError {
    if error.is_cancelled() {
        error
    } else {
        wrap(error)
    }
}

/// Builds a [`Retagger`] over the HTTP client.
pub struct RetaggerBuilder {
    config: Option<Config>,
    credentials: Option<Arc<dyn CredentialProvider>>,
}

impl RetaggerBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            credentials: None,
        }
    }

    /// Set configuration directly.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the credential provider. Defaults to anonymous access.
    pub fn with_credentials(mut self, provider: impl CredentialProvider + 'static) -> Self {
        self.credentials = Some(Arc::new(provider));
        self
    }

    pub fn build(self) -> Result<Retagger<Client>> {
        let config = self.config.unwrap_or_default();
        let credentials = self
            .credentials
            .unwrap_or_else(|| Arc::new(AnonymousProvider));

        let client = Client::new(ClientConfig::from(&config), credentials)?;
        Ok(Retagger::new(client, config.retry_policy()))
    }
}

impl Default for RetaggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
