//! The idempotency check.
//!
//! [`decide`] compares the source's manifest digest with whatever the
//! destination tag currently points at. Only digests are compared. Tag names
//! and creation times never influence the decision.

use crate::registry::ImageMetadata;
use serde::Serialize;

#[cfg(test)]
mod tests;

/// What the destination tag looks like before the write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationState {
    /// The tag exists and points at this image.
    Existing(ImageMetadata),
    /// The tag does not exist yet.
    Absent,
}

/// What a retag does, or would do in dry-run mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RetagDecision {
    /// The tag already points at the source digest.
    NoOpAlreadyCorrect,
    /// Dry run: the tag would be created.
    WouldCreate,
    /// Dry run: the tag would be moved away from `previous`.
    WouldOverwrite { previous: ImageMetadata },
    /// The tag is created.
    Create,
    /// The tag is moved away from `previous`.
    Overwrite { previous: ImageMetadata },
}

impl RetagDecision {
    /// True only for the decisions that call the tag writer.
    pub fn requires_write(&self) -> bool {
        matches!(self, Self::Create | Self::Overwrite { .. })
    }

    /// The image the tag pointed at before, when it pointed elsewhere.
    pub fn previous(&self) -> Option<&ImageMetadata> {
        match self {
            Self::WouldOverwrite { previous } | Self::Overwrite { previous } => Some(previous),
            Self::NoOpAlreadyCorrect | Self::WouldCreate | Self::Create => None,
        }
    }
}

/// Decides whether the destination tag must be written.
///
/// # Examples
///
/// ```
/// use libretag::decision::{decide, DestinationState, RetagDecision};
/// use libretag::registry::ImageMetadata;
///
/// let digest = "sha256:aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
///     .parse()
///     .unwrap();
/// let source = ImageMetadata::new(digest, None);
///
/// assert_eq!(decide(&source, &DestinationState::Absent, false), RetagDecision::Create);
/// assert_eq!(decide(&source, &DestinationState::Absent, true), RetagDecision::WouldCreate);
/// ```
pub fn decide(
    source: &ImageMetadata,
    destination: &DestinationState,
    dry_run: bool,
) -> RetagDecision {
    match destination {
        DestinationState::Existing(current) if current.digest == source.digest => {
            RetagDecision::NoOpAlreadyCorrect
        }
        DestinationState::Existing(current) if dry_run => RetagDecision::WouldOverwrite {
            previous: current.clone(),
        },
        DestinationState::Existing(current) => RetagDecision::Overwrite {
            previous: current.clone(),
        },
        DestinationState::Absent if dry_run => RetagDecision::WouldCreate,
        DestinationState::Absent => RetagDecision::Create,
    }
}
