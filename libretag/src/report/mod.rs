//! Rendering of retag outcomes.
//!
//! Everything here is pure: a [`RetagOutcome`] goes in and text comes out.
//! Whether the process succeeded is decided by the caller, not here.

use crate::config::TimestampStyle;
use crate::decision::RetagDecision;
use crate::digest::DEFAULT_SHORT_LEN;
use crate::error::RetagError;
use crate::format::format_created;
use crate::reference::{DEFAULT_TAG, Reference};
use crate::registry::ImageMetadata;
use crate::retag::RetagOutcome;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;


/// Prefix of every failure line.
pub const FAILURE_MARKER: &str = "[FAIL]";

/// Presentation settings for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    /// Hex characters kept when printing digests.
    pub digest_length: usize,
    pub timestamps: TimestampStyle,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            digest_length: DEFAULT_SHORT_LEN,
            timestamps: TimestampStyle::default(),
        }
    }
}

/// Whether a report describes a change (or no-op) or a preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportStatus {
    Ok,
    DryRun,
}

impl ReportStatus {
    /// The marker printed at the start of the line.
    pub fn marker(&self) -> &'static str {
        match self {
            Self::Ok => "[OK]",
            Self::DryRun => "[DRY-RUN]",
        }
    }
}

/// A single rendered report line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub status: ReportStatus,
    pub message: String,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status.marker(), self.message)
    }
}

/// Machine-readable form of an outcome, for JSON and YAML output.
#[derive(Debug, Clone, Serialize)]
pub struct RetagSummary {
    pub status: ReportStatus,
    pub source: Reference,
    pub destination: Reference,
    pub digest: String,
    pub created: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub decision: RetagDecision,
    /// True when a tag write was issued.
    pub written: bool,
    pub message: String,
}

/// Renders `outcome` with relative times computed against the current time.
pub fn render(outcome: &RetagOutcome, options: &ReportOptions) -> Report {
    render_at(outcome, options, &Utc::now())
}

/// Renders `outcome` with relative times computed against `now`.
pub fn render_at(outcome: &RetagOutcome, options: &ReportOptions, now: &DateTime<Utc>) -> Report {
    let tag = outcome.destination.tag().unwrap_or(DEFAULT_TAG);
    let image = |m: &ImageMetadata| {
        (
            m.digest.short(options.digest_length),
            format_created(m.created.as_ref(), options.timestamps, now),
        )
    };
    let (digest, created) = image(&outcome.source_metadata);

    let (status, message) = match &outcome.decision {
        RetagDecision::NoOpAlreadyCorrect => (
            ReportStatus::Ok,
            format!(
                "Tag '{}' already points to the correct image (digest {}, created {}). No action needed.",
                tag, digest, created
            ),
        ),
        RetagDecision::WouldCreate => (
            ReportStatus::DryRun,
            format!(
                "Would create tag '{}' pointing to {} (created {}). No changes made.",
                tag, digest, created
            ),
        ),
        RetagDecision::WouldOverwrite { previous } => {
            let (previous_digest, previous_created) = image(previous);
            (
                ReportStatus::DryRun,
                format!(
                    "Would point tag '{}' to {} (created {}), replacing {} (created {}). No changes made.",
                    tag, digest, created, previous_digest, previous_created
                ),
            )
        }
        RetagDecision::Create => (
            ReportStatus::Ok,
            format!(
                "Successfully pointed tag '{}' to {} (created {}).",
                tag, digest, created
            ),
        ),
        RetagDecision::Overwrite { previous } => {
            let (previous_digest, previous_created) = image(previous);
            (
                ReportStatus::Ok,
                format!(
                    "Successfully pointed tag '{}' to {} (created {}) (was {}, created {}).",
                    tag, digest, created, previous_digest, previous_created
                ),
            )
        }
    };

    Report { status, message }
}

/// Builds the structured summary of `outcome`.
pub fn summarize(outcome: &RetagOutcome, options: &ReportOptions) -> RetagSummary {
    let report = render(outcome, options);
    RetagSummary {
        status: report.status,
        source: outcome.source.clone(),
        destination: outcome.destination.clone(),
        digest: outcome.source_metadata.digest.to_string(),
        created: outcome.source_metadata.created,
        decision: outcome.decision.clone(),
        written: outcome.decision.requires_write(),
        message: report.message,
    }
}

/// Renders the diagnostic line for a failed retag.
///
/// # Examples
///
/// ```
/// use libretag::error::RetagError;
/// use libretag::report::render_failure;
///
/// let err = RetagError::SourceNotFound { reference: "app:build-7".to_string() };
/// assert_eq!(render_failure(&err), "[FAIL] Error: Source image 'app:build-7' not found");
/// ```
pub fn render_failure(error: &RetagError) -> String {
    format!("{} Error: {}", FAILURE_MARKER, error)
}
