//! Retag - point a registry tag at an existing image
//!
//! libretag moves a tag in a remote OCI registry so that it points at the
//! manifest of another image in the same repository, without pulling or
//! pushing any layer. Runs are idempotent: a tag that already points at the
//! source digest is left alone.
//!
//! # Quick Start
//!
//! ```no_run
//! use libretag::{RetagRequest, Retagger, report};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let retagger = Retagger::builder().build()?;
//!
//!     let request = RetagRequest::new("registry.example.com/team/app:build-42", "production");
//!     let outcome = retagger.retag(&request, &CancellationToken::new()).await?;
//!
//!     println!("{}", report::render(&outcome, &Default::default()));
//!     Ok(())
//! }
//! ```
//!
//! # Main Types
//!
//! - [`Retagger`] - Runs retags against a registry
//! - [`RetaggerBuilder`] - Builds a retagger from [`Config`] and credentials
//! - [`RetagRequest`] / [`RetagOutcome`] - Input and result of a run
//! - [`Reference`] - Image reference parsing
//! - [`Digest`] - Content digest validation and handling
//!
//! Registry access sits behind [`registry::RegistryTransport`], so the whole
//! flow can run against an in-memory registry.

#![warn(clippy::all)]

/// Returns the libretag crate version.
///
/// # Examples
///
/// ```
/// let version = libretag::version();
/// assert!(!version.is_empty());
/// ```
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

mod retag;
pub use retag::{RetagOutcome, RetagRequest, Retagger, RetaggerBuilder, Stage};

pub use auth::Credentials;
pub use config::Config;
pub use decision::RetagDecision;
pub use digest::Digest;
pub use error::{Result, RetagError};
pub use reference::Reference;

pub mod auth;
pub mod client;
pub mod config;
pub mod decision;
pub mod digest;
pub mod error;
pub mod format;
pub mod oci;
pub mod reference;
pub mod registry;
pub mod report;
pub mod retry;

#[cfg(test)]
mod testing;
